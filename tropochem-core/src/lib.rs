pub mod config;
pub mod errors;
pub mod ivp;
pub mod timeseries;

pub mod tropospheric;

pub use tropospheric::{ForcingParameters, KineticModel, RateConstants, TimeSpan};

pub mod components;
pub mod constants;
pub mod phase;
pub mod scenario;
pub mod solver;
pub mod species;

pub use components::KineticModel;
pub use phase::PhaseTrajectory;
pub use scenario::ScenarioConfig;
pub use solver::{SolveResult, Solver};
pub use species::Species;

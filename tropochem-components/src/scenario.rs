//! Scenario configuration
//!
//! A scenario collects everything needed for one run: forcings, time span,
//! initial concentrations, spin-up, solver options and the species to plot.
//! Every field has a default, so a TOML file only lists what it changes:
//!
//! ```toml
//! spin_up = 0.25
//!
//! [forcing]
//! no = 1.0e5
//!
//! [plot]
//! x = "NO2"
//! y = "O3"
//! ```

use crate::components::tropospheric::{ForcingParameters, KineticModel, StateVector, TimeSpan};
use crate::phase::PhaseTrajectory;
use crate::solver::{SolveResult, Solver};
use crate::species::Species;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tropochem_core::config;
use tropochem_core::errors::ChemResult;
use tropochem_core::ivp::SolverOptions;
use tropochem_core::timeseries::FloatValue;

/// Initial concentrations
/// unit: molec/cm^3
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConcentrations {
    pub co: FloatValue,
    pub no: FloatValue,
    pub o3: FloatValue,
    pub no2: FloatValue,
    pub oh: FloatValue,
    pub ho2: FloatValue,
}

impl Default for InitialConcentrations {
    fn default() -> Self {
        Self {
            co: 5e11,
            no: 5e9,
            o3: 3e11,
            no2: 5e9,
            oh: 5e6,
            ho2: 2.5e8,
        }
    }
}

impl InitialConcentrations {
    pub fn to_state(&self) -> StateVector {
        [self.co, self.no, self.o3, self.no2, self.oh, self.ho2]
    }
}

/// Species shown on the phase plot axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotAxes {
    pub x: Species,
    pub y: Species,
}

impl Default for PlotAxes {
    fn default() -> Self {
        Self {
            x: Species::CO,
            y: Species::OH,
        }
    }
}

/// A complete model run
///
/// The defaults reproduce the reference scenario: a remote troposphere with
/// CO, NO and O3 sources, integrated for 1e8 s with the first half of the
/// trajectory discarded as spin-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Fraction of leading samples discarded as spin-up
    /// default: 0.5
    pub spin_up: FloatValue,
    pub forcing: ForcingParameters,
    pub time: TimeSpan,
    pub initial: InitialConcentrations,
    pub solver: SolverOptions,
    pub plot: PlotAxes,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            spin_up: 0.5,
            forcing: ForcingParameters::default(),
            time: TimeSpan::default(),
            initial: InitialConcentrations::default(),
            solver: SolverOptions::default(),
            plot: PlotAxes::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn from_toml_str(content: &str) -> ChemResult<Self> {
        config::from_toml_str(content)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ChemResult<Self> {
        config::from_toml_file(path)
    }

    pub fn to_toml_string(&self) -> ChemResult<String> {
        config::to_toml_string(self)
    }

    pub fn build_model(&self) -> ChemResult<KineticModel> {
        KineticModel::from_parts(self.forcing, self.time, self.initial.to_state())
    }

    pub fn solver(&self) -> ChemResult<Solver> {
        Ok(Solver::new(&self.build_model()?).with_options(self.solver.clone()))
    }

    /// Solve the scenario and trim its spin-up
    pub fn run(&self) -> ChemResult<SolveResult> {
        self.solver()?.solve(self.spin_up)
    }

    pub fn phase_trajectory(&self, result: &SolveResult) -> PhaseTrajectory {
        PhaseTrajectory::from_result(result, self.plot.x, self.plot.y)
    }
}

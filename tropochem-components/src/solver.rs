//! Solving a [`KineticModel`] over its time span
//!
//! The raw integration is post-processed in two steps:
//!
//! 1. time is converted from seconds to days;
//! 2. the leading `spin_up_fraction` of the samples is discarded as the
//!    transient before the system settles into its characteristic regime.

use crate::components::tropospheric::{KineticModel, N_SPECIES};
use crate::species::Species;
use log::info;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::sync::Arc;
use tropochem_core::errors::{ChemError, ChemResult};
use tropochem_core::ivp::{IVPBuilder, IntegrationOutput, SolverOptions, State};
use tropochem_core::timeseries::{seconds_to_days, FloatValue, Time};

/// Trimmed trajectory of a solved model
///
/// Every species sequence and the time axis have the same length, and index
/// `i` refers to the same instant in all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// unit: days
    time: Array1<Time>,
    /// One row per sample, one column per species in [`Species::ALL`] order
    concentrations: Array2<FloatValue>,
}

impl SolveResult {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Sample times in days, strictly increasing
    pub fn time(&self) -> ArrayView1<'_, Time> {
        self.time.view()
    }

    /// Concentration of a single species at each sample
    pub fn species(&self, species: Species) -> ArrayView1<'_, FloatValue> {
        self.concentrations.column(species.index())
    }

    /// All concentrations, one row per sample
    pub fn concentrations(&self) -> ArrayView2<'_, FloatValue> {
        self.concentrations.view()
    }

    /// Split into six species sequences (in [`Species::ALL`] order) and the time axis
    pub fn into_sequences(self) -> ([Vec<FloatValue>; N_SPECIES], Vec<Time>) {
        let sequences = Species::ALL.map(|species| self.species(species).to_vec());
        (sequences, self.time.to_vec())
    }
}

/// Number of leading samples discarded for a given spin-up fraction
///
/// Halves round to even.
pub fn spin_up_index(total_samples: usize, spin_up_fraction: FloatValue) -> usize {
    (total_samples as FloatValue * spin_up_fraction).round_ties_even() as usize
}

fn validate_spin_up(spin_up_fraction: FloatValue) -> ChemResult<()> {
    if !spin_up_fraction.is_finite() || !(0.0..1.0).contains(&spin_up_fraction) {
        return Err(ChemError::InvalidParameter(format!(
            "spin-up fraction must be in [0, 1), got {}",
            spin_up_fraction
        )));
    }
    Ok(())
}

/// Integrates a [`KineticModel`] and post-processes the trajectory
#[derive(Debug, Clone)]
pub struct Solver {
    model: Arc<KineticModel>,
    options: SolverOptions,
}

impl Solver {
    pub fn new(model: &KineticModel) -> Self {
        Self {
            model: Arc::new(model.clone()),
            options: SolverOptions::default(),
        }
    }

    /// Set custom solver options
    pub fn with_options(self, options: SolverOptions) -> Self {
        Self {
            model: self.model,
            options,
        }
    }

    pub fn model(&self) -> &KineticModel {
        &self.model
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Integrate the model over its time span without any post-processing
    ///
    /// Times are in seconds and include the initial time.
    pub fn integrate(&self) -> ChemResult<IntegrationOutput<N_SPECIES>> {
        let span = self.model.time_span();
        let y0 = State::<N_SPECIES>::from_column_slice(self.model.initial_state());

        IVPBuilder::new(Arc::clone(&self.model), y0).integrate(span.start, span.end, &self.options)
    }

    /// Integrate the model, convert time to days and drop the spin-up samples
    pub fn solve(&self, spin_up_fraction: FloatValue) -> ChemResult<SolveResult> {
        validate_spin_up(spin_up_fraction)?;

        let output = self.integrate()?;
        let total = output.len();
        let idx = spin_up_index(total, spin_up_fraction);
        if idx >= total {
            return Err(ChemError::InvalidParameter(format!(
                "spin-up fraction {} discards all {} samples",
                spin_up_fraction, total
            )));
        }

        let time = output.times[idx..]
            .iter()
            .map(|t| seconds_to_days(*t))
            .collect::<Array1<Time>>();
        let retained = &output.states[idx..];
        let concentrations =
            Array2::from_shape_fn((retained.len(), N_SPECIES), |(i, j)| retained[i][j]);

        info!(
            "Solved {} samples ({} discarded as spin-up, stiff from {:?})",
            total - idx,
            idx,
            output.stiff_from
        );

        Ok(SolveResult {
            time,
            concentrations,
        })
    }
}

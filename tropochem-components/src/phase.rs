//! Phase-plane view of a solution for the visualization collaborator
//!
//! A renderer plots one species against another and animates the curve by
//! drawing the first `i` points in frame `i`. This module prepares that data
//! (axis bounds and frame prefixes) without rendering anything.

use crate::solver::SolveResult;
use crate::species::Species;
use tropochem_core::timeseries::{FloatValue, Time};

/// Closed interval spanned by a sequence
pub type Bounds = (FloatValue, FloatValue);

/// Trajectory of `y_species` against `x_species`
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTrajectory {
    pub x_species: Species,
    pub y_species: Species,
    x: Vec<FloatValue>,
    y: Vec<FloatValue>,
    /// unit: days
    time: Vec<Time>,
}

impl PhaseTrajectory {
    pub fn from_result(result: &SolveResult, x_species: Species, y_species: Species) -> Self {
        Self {
            x_species,
            y_species,
            x: result.species(x_species).to_vec(),
            y: result.species(y_species).to_vec(),
            time: result.time().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[FloatValue] {
        &self.x
    }

    pub fn y(&self) -> &[FloatValue] {
        &self.y
    }

    pub fn time(&self) -> &[Time] {
        &self.time
    }

    /// Axis limits `((x_min, x_max), (y_min, y_max))`, or `None` for an empty trajectory
    pub fn bounds(&self) -> Option<(Bounds, Bounds)> {
        Some((bounds(&self.x)?, bounds(&self.y)?))
    }

    /// The first `i` points of the trajectory, clamped to its length
    pub fn frame(&self, i: usize) -> (&[FloatValue], &[FloatValue]) {
        let end = i.min(self.len());
        (&self.x[..end], &self.y[..end])
    }

    /// Every animation frame, from the empty frame up to all but the last point
    pub fn frames(&self) -> impl Iterator<Item = (&[FloatValue], &[FloatValue])> + '_ {
        (0..self.len()).map(move |i| self.frame(i))
    }
}

fn bounds(values: &[FloatValue]) -> Option<Bounds> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().fold(
        (FloatValue::INFINITY, FloatValue::NEG_INFINITY),
        |(min, max), v| (min.min(*v), max.max(*v)),
    ))
}

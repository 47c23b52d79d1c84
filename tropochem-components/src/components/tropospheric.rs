//! Tropospheric photochemistry component
//!
//! A box model of the coupled CO, NOx, O3 and HOx chemistry of the background
//! troposphere, driven by constant emissions of CO and NO and a constant
//! O3 source (e.g. stratospheric intrusion).
//!
//! # State
//!
//! Concentrations in molec/cm^3, ordered as [`Species::ALL`]:
//! `[CO, NO, O3, NO2, OH, HO2]`.
//!
//! # Reactions
//!
//! | Rate  | Reaction                     |
//! |-------|------------------------------|
//! | $k_4$ | O3 + hv (+ H2O) → 2 OH       |
//! | $k_5$ | CO + OH (+ O2) → CO2 + HO2   |
//! | $k_6$ | HO2 + O3 → OH + 2 O2         |
//! | $k_7$ | NO + O3 → NO2 + O2           |
//! | $k_8$ | NO2 + hv (+ O2) → NO + O3    |
//! | $k_9$ | HO2 + NO → OH + NO2          |
//! | $k_{10}$ | OH + NO2 → HNO3           |

use crate::constants::{K10, K4, K5, K6, K7, K8, K9};
use crate::species::Species;
use serde::{Deserialize, Serialize};
use tropochem_core::errors::{ChemError, ChemResult};
use tropochem_core::ivp::{Jacobian, State, IVP};
use tropochem_core::timeseries::{FloatValue, Time};

/// Number of species in the state vector
pub const N_SPECIES: usize = Species::COUNT;

/// Concentrations ordered as [`Species::ALL`]
pub type StateVector = [FloatValue; N_SPECIES];

type ModelState = State<N_SPECIES>;

/// Rate constants of the reaction network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConstants {
    pub k4: FloatValue,
    pub k5: FloatValue,
    pub k6: FloatValue,
    pub k7: FloatValue,
    pub k8: FloatValue,
    pub k9: FloatValue,
    pub k10: FloatValue,
}

/// The fixed rate constants shared by every model instance
pub const RATE_CONSTANTS: RateConstants = RateConstants {
    k4: K4,
    k5: K5,
    k6: K6,
    k7: K7,
    k8: K8,
    k9: K9,
    k10: K10,
};

impl Default for RateConstants {
    fn default() -> Self {
        RATE_CONSTANTS
    }
}

/// Constant production terms
///
/// Defaults to the reference scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcingParameters {
    /// CO emissions
    /// unit: molec / (cm^3 s)
    pub co: FloatValue,
    /// NO emissions
    /// unit: molec / (cm^3 s)
    pub no: FloatValue,
    /// O3 production
    /// unit: molec / (cm^3 s)
    pub o3: FloatValue,
}

impl Default for ForcingParameters {
    fn default() -> Self {
        Self {
            co: 5e5,
            no: 6.3e4,
            o3: 6e4,
        }
    }
}

/// Integration interval in seconds
///
/// Defaults to the reference scenario of roughly three years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSpan {
    /// unit: s
    pub start: Time,
    /// unit: s
    pub end: Time,
}

impl Default for TimeSpan {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 1e8,
        }
    }
}

impl TimeSpan {
    pub fn new(start: Time, end: Time) -> ChemResult<Self> {
        let span = Self { start, end };
        span.validate()?;
        Ok(span)
    }

    pub fn validate(&self) -> ChemResult<()> {
        if !self.start.is_finite() || !self.end.is_finite() || self.start >= self.end {
            return Err(ChemError::InvalidParameter(format!(
                "time span must satisfy t0 < tf, got ({}, {})",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Time {
        self.end - self.start
    }
}

/// Tropospheric CO/NOx/O3/HOx kinetics
///
/// The governing equations are:
///
/// $$ \frac{d[CO]}{dt} = F_{CO} - k_5 [CO][OH] $$
/// $$ \frac{d[NO]}{dt} = F_{NO} + k_8 [NO_2] - k_7 [NO][O_3] - k_9 [HO_2][NO] $$
/// $$ \frac{d[O_3]}{dt} = F_{O_3} + k_8 [NO_2] - k_4 [O_3] - k_6 [HO_2][O_3] - k_7 [NO][O_3] $$
/// $$ \frac{d[NO_2]}{dt} = k_7 [NO][O_3] + k_9 [HO_2][NO] - k_8 [NO_2] - k_{10} [OH][NO_2] $$
/// $$ \frac{d[OH]}{dt} = 2 k_4 [O_3] + k_6 [HO_2][O_3] + k_9 [HO_2][NO] - k_5 [OH][CO] - k_{10} [OH][NO_2] $$
/// $$ \frac{d[HO_2]}{dt} = k_5 [OH][CO] - k_6 [HO_2][O_3] - k_9 [HO_2][NO] $$
#[derive(Debug, Clone, PartialEq)]
pub struct KineticModel {
    rate_constants: RateConstants,
    forcing: ForcingParameters,
    time_span: TimeSpan,
    initial_state: StateVector,
}

impl KineticModel {
    /// Create a model from its forcings, time bounds (s) and initial concentrations
    ///
    /// Fails if `t0 >= tf`, or if `x0` is not six finite, non-negative values.
    pub fn new(
        fco: FloatValue,
        fno: FloatValue,
        fo3: FloatValue,
        t0: Time,
        tf: Time,
        x0: &[FloatValue],
    ) -> ChemResult<Self> {
        let initial_state: StateVector = x0.try_into().map_err(|_| {
            ChemError::InvalidParameter(format!(
                "initial state must have {} entries, got {}",
                N_SPECIES,
                x0.len()
            ))
        })?;

        Self::from_parts(
            ForcingParameters {
                co: fco,
                no: fno,
                o3: fo3,
            },
            TimeSpan { start: t0, end: tf },
            initial_state,
        )
    }

    pub fn from_parts(
        forcing: ForcingParameters,
        time_span: TimeSpan,
        initial_state: StateVector,
    ) -> ChemResult<Self> {
        time_span.validate()?;

        if [forcing.co, forcing.no, forcing.o3]
            .iter()
            .any(|f| !f.is_finite())
        {
            return Err(ChemError::InvalidParameter(format!(
                "forcings must be finite, got {:?}",
                forcing
            )));
        }

        if let Some(species) = Species::ALL.into_iter().find(|s| {
            let value = initial_state[s.index()];
            !value.is_finite() || value < 0.0
        }) {
            return Err(ChemError::InvalidParameter(format!(
                "initial {} concentration must be finite and non-negative, got {}",
                species,
                initial_state[species.index()]
            )));
        }

        Ok(Self {
            rate_constants: RATE_CONSTANTS,
            forcing,
            time_span,
            initial_state,
        })
    }

    pub fn rate_constants(&self) -> &RateConstants {
        &self.rate_constants
    }

    pub fn forcing(&self) -> &ForcingParameters {
        &self.forcing
    }

    pub fn time_span(&self) -> &TimeSpan {
        &self.time_span
    }

    pub fn initial_state(&self) -> &StateVector {
        &self.initial_state
    }

    /// Time derivative of the concentrations
    ///
    /// The dynamics are autonomous; `t` is accepted for the integrator's
    /// calling convention only.
    pub fn derivative(&self, _t: Time, x: &StateVector) -> StateVector {
        let [co, no, o3, no2, oh, ho2] = *x;
        let RateConstants {
            k4,
            k5,
            k6,
            k7,
            k8,
            k9,
            k10,
        } = self.rate_constants;
        let f = &self.forcing;

        let d_co = f.co - k5 * co * oh;
        let d_no = f.no + k8 * no2 - k7 * no * o3 - k9 * ho2 * no;
        let d_o3 = f.o3 + k8 * no2 - k4 * o3 - k6 * ho2 * o3 - k7 * no * o3;
        let d_no2 = k7 * no * o3 + k9 * ho2 * no - k8 * no2 - k10 * oh * no2;
        let d_oh = 2.0 * k4 * o3 + k6 * ho2 * o3 + k9 * ho2 * no - k5 * oh * co - k10 * oh * no2;
        let d_ho2 = k5 * oh * co - k6 * ho2 * o3 - k9 * ho2 * no;

        [d_co, d_no, d_o3, d_no2, d_oh, d_ho2]
    }

    /// Analytic Jacobian of [`KineticModel::derivative`]
    ///
    /// Row `i`, column `j` is the derivative of equation `i` with respect to species `j`.
    pub fn jacobian(&self, _t: Time, x: &StateVector) -> [StateVector; N_SPECIES] {
        let [co, no, o3, no2, oh, ho2] = *x;
        let RateConstants {
            k4,
            k5,
            k6,
            k7,
            k8,
            k9,
            k10,
        } = self.rate_constants;

        [
            // CO
            [-k5 * oh, 0.0, 0.0, 0.0, -k5 * co, 0.0],
            // NO
            [0.0, -k7 * o3 - k9 * ho2, -k7 * no, k8, 0.0, -k9 * no],
            // O3
            [0.0, -k7 * o3, -k4 - k6 * ho2 - k7 * no, k8, 0.0, -k6 * o3],
            // NO2
            [0.0, k7 * o3 + k9 * ho2, k7 * no, -k8 - k10 * oh, -k10 * no2, k9 * no],
            // OH
            [
                -k5 * oh,
                k9 * ho2,
                2.0 * k4 + k6 * ho2,
                -k10 * oh,
                -k5 * co - k10 * no2,
                k6 * o3 + k9 * no,
            ],
            // HO2
            [k5 * oh, -k9 * ho2, -k6 * ho2, 0.0, k5 * co, -k6 * o3 - k9 * no],
        ]
    }
}

impl IVP<N_SPECIES> for KineticModel {
    fn calculate_dy_dt(&self, t: Time, y: &ModelState, dy_dt: &mut ModelState) {
        let x: StateVector = (*y).into();
        dy_dt.copy_from_slice(&self.derivative(t, &x));
    }

    fn calculate_jacobian(&self, t: Time, y: &ModelState) -> Jacobian<N_SPECIES> {
        let x: StateVector = (*y).into();
        let jacobian = self.jacobian(t, &x);
        Jacobian::<N_SPECIES>::from_fn(|i, j| jacobian[i][j])
    }
}

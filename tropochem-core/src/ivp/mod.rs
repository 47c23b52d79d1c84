//! Initial value problems and their integration
//!
//! Models describe their dynamics by implementing [`IVP`]. An [`IVPBuilder`]
//! wraps a model and an initial state and hands it to an integrator.
//!
//! [`IVPBuilder::integrate`] is the integrator models should normally use. It
//! switches automatically between a non-stiff and a stiff method:
//!
//! 1. The explicit Dormand–Prince 5(4) pair from `ode_solvers` runs first, with
//!    its stiffness test evaluated on every accepted step.
//! 2. If stiffness is detected, or the non-stiff step budget runs out, the
//!    integration resumes from the last accepted point with [`Rodas4`], a
//!    fourth order L-stable Rosenbrock method.
//!
//! Chemical kinetics with rate constants spanning many orders of magnitude
//! typically start with fast transients (explicit steps are efficient) and
//! then settle onto slow dynamics where the fast modes limit an explicit
//! method's step size (implicit steps are required).

use crate::errors::{ChemError, ChemResult};
use crate::timeseries::{FloatValue, Time};
use log::{debug, warn};
use nalgebra::{SMatrix, SVector};
use ode_solvers::dop_shared::{IntegrationError, OutputType};
use ode_solvers::{Dopri5, System};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod rosenbrock;

pub use rosenbrock::Rodas4;

/// State vector of an `N`-dimensional problem
pub type State<const N: usize> = SVector<FloatValue, N>;
/// Jacobian matrix $\partial f / \partial y$ of an `N`-dimensional problem
pub type Jacobian<const N: usize> = SMatrix<FloatValue, N, N>;

/// Right hand side of a system of ODEs $\frac{dy}{dt} = f(t, y)$
pub trait IVP<const N: usize> {
    fn calculate_dy_dt(&self, t: Time, y: &State<N>, dy_dt: &mut State<N>);

    /// Jacobian of [`IVP::calculate_dy_dt`] with respect to `y`
    ///
    /// Defaults to central finite differences.
    /// Override with an analytic Jacobian where one is available.
    fn calculate_jacobian(&self, t: Time, y: &State<N>) -> Jacobian<N> {
        finite_difference_jacobian(self, t, y)
    }
}

/// Approximate the Jacobian of `ivp` at `(t, y)` using central differences
pub fn finite_difference_jacobian<C, const N: usize>(ivp: &C, t: Time, y: &State<N>) -> Jacobian<N>
where
    C: IVP<N> + ?Sized,
{
    let eps = FloatValue::EPSILON.cbrt();
    let mut jacobian = Jacobian::<N>::zeros();
    let mut y_perturbed = *y;
    let mut f_plus = State::<N>::zeros();
    let mut f_minus = State::<N>::zeros();

    for j in 0..N {
        let original = y[j];
        let delta = eps * original.abs().max(1.0);

        y_perturbed[j] = original + delta;
        ivp.calculate_dy_dt(t, &y_perturbed, &mut f_plus);
        y_perturbed[j] = original - delta;
        ivp.calculate_dy_dt(t, &y_perturbed, &mut f_minus);
        y_perturbed[j] = original;

        jacobian.set_column(j, &((f_plus - f_minus) / (2.0 * delta)));
    }
    jacobian
}

/// Relative distance from the end time within which an integration counts as complete
const END_TIME_TOLERANCE: FloatValue = 1e-12;

/// Tolerances and limits used by the integrators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Relative tolerance
    pub rtol: FloatValue,
    /// Absolute tolerance, in the units of the state
    pub atol: FloatValue,
    /// Maximum number of steps (accepted and rejected) of the stiff method
    pub max_steps: usize,
    /// Steps the non-stiff method may take before handing over to the stiff method
    pub nonstiff_max_steps: u32,
    /// Smallest step the stiff method may take before giving up
    pub min_step: FloatValue,
    /// Clip negative components to zero after each stiff step
    pub non_negative: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-4,
            atol: 1e-3,
            max_steps: 500_000,
            nonstiff_max_steps: 50_000,
            min_step: 1e-10,
            non_negative: true,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> ChemResult<()> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(ChemError::InvalidParameter(format!(
                "rtol must be finite and positive, got {}",
                self.rtol
            )));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(ChemError::InvalidParameter(format!(
                "atol must be finite and positive, got {}",
                self.atol
            )));
        }
        if self.max_steps == 0 || self.nonstiff_max_steps == 0 {
            return Err(ChemError::InvalidParameter(
                "step limits must be greater than zero".to_string(),
            ));
        }
        if !self.min_step.is_finite() || self.min_step <= 0.0 {
            return Err(ChemError::InvalidParameter(format!(
                "min_step must be finite and positive, got {}",
                self.min_step
            )));
        }
        Ok(())
    }
}

/// Accepted steps of an integration
#[derive(Debug, Clone)]
pub struct IntegrationOutput<const N: usize> {
    /// Time of each sample, strictly increasing and starting at the initial time
    pub times: Vec<Time>,
    /// State at each time in `times`
    pub states: Vec<State<N>>,
    /// Time at which integration switched to the stiff method, if it did
    pub stiff_from: Option<Time>,
    /// Accepted steps of the non-stiff method
    pub nonstiff_steps: usize,
    /// Accepted steps of the stiff method
    pub stiff_steps: usize,
    /// Rejected steps of the stiff method
    pub rejected_steps: usize,
}

impl<const N: usize> IntegrationOutput<N> {
    fn new(t0: Time, y0: State<N>) -> Self {
        Self {
            times: vec![t0],
            states: vec![y0],
            stiff_from: None,
            nonstiff_steps: 0,
            stiff_steps: 0,
            rejected_steps: 0,
        }
    }

    /// Append a sample, ignoring samples that do not advance in time
    ///
    /// Returns true if the sample was stored.
    pub(crate) fn push(&mut self, t: Time, y: State<N>) -> bool {
        match self.times.last() {
            Some(&last) if t <= last => false,
            _ => {
                self.times.push(t);
                self.states.push(y);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The final time and state
    pub fn last_step(&self) -> Option<(Time, &State<N>)> {
        self.times.last().copied().zip(self.states.last())
    }
}

/// Binds a model to an initial state so that it can be handed to an integrator
pub struct IVPBuilder<C, const N: usize> {
    component: Arc<C>,
    y0: State<N>,
}

impl<C, const N: usize> System<Time, State<N>> for IVPBuilder<C, N>
where
    C: IVP<N>,
{
    fn system(&self, t: Time, y: &State<N>, dy: &mut State<N>) {
        self.component.calculate_dy_dt(t, y, dy)
    }
}

impl<C, const N: usize> IVPBuilder<C, N>
where
    C: IVP<N>,
{
    pub fn new(component: Arc<C>, y0: State<N>) -> Self {
        Self { component, y0 }
    }

    /// Explicit Dormand–Prince 5(4) stepper with stiffness detection on every step
    ///
    /// Every accepted step is recorded in the stepper's results.
    pub fn to_dopri5(
        self,
        t0: Time,
        t1: Time,
        options: &SolverOptions,
    ) -> Dopri5<Time, State<N>, Self> {
        let y0 = self.y0;
        Dopri5::from_param(
            self,
            t0,
            t1,
            0.0,
            y0,
            options.rtol,
            options.atol,
            0.9,
            0.04,
            0.2,
            10.0,
            t1 - t0,
            0.0,
            options.nonstiff_max_steps,
            1,
            OutputType::Sparse,
        )
    }

    /// Fourth order Rosenbrock stepper for stiff problems
    pub fn to_rodas4(self, t0: Time, t1: Time, options: &SolverOptions) -> Rodas4<C, N> {
        Rodas4::new(self.component, t0, t1, self.y0, options.clone())
    }

    /// Integrate from `t0` to `t1`, switching to the stiff method when needed
    ///
    /// Any non-success status of either method is reported as
    /// [`ChemError::IntegrationFailure`]; no partial output is returned.
    pub fn integrate(
        self,
        t0: Time,
        t1: Time,
        options: &SolverOptions,
    ) -> ChemResult<IntegrationOutput<N>> {
        options.validate()?;
        if !t0.is_finite() || !t1.is_finite() || t0 >= t1 {
            return Err(ChemError::InvalidParameter(format!(
                "integration span must satisfy t0 < t1, got ({t0}, {t1})"
            )));
        }

        let component = Arc::clone(&self.component);
        let mut output = IntegrationOutput::new(t0, self.y0);

        let mut stepper = self.to_dopri5(t0, t1, options);
        let status = stepper.integrate();

        let (times, states) = stepper.results().get();
        for (t, y) in times.iter().zip(states.iter()) {
            if output.push(*t, *y) {
                output.nonstiff_steps += 1;
            }
        }
        let (t_last, y_last) = match output.last_step() {
            Some((t, y)) => (t, *y),
            None => (t0, output.states[0]),
        };
        if y_last.iter().any(|v| !v.is_finite()) {
            return Err(ChemError::integration(
                t_last,
                "non-finite state in the non-stiff phase",
            ));
        }

        match status {
            Ok(stats) => {
                debug!("Non-stiff integration completed: {}", stats);
                if t1 - t_last > END_TIME_TOLERANCE * (t1 - t0) {
                    return Err(ChemError::integration(
                        t_last,
                        format!("non-stiff method stopped before reaching t={t1:e}"),
                    ));
                }
                // The final step may fall short of t1 by rounding
                if let Some(last) = output.times.last_mut() {
                    *last = t1;
                }
                return Ok(output);
            }
            Err(IntegrationError::StiffnessDetected { .. }) => {
                debug!("Stiffness detected at t={t_last:e}, switching to RODAS4");
            }
            Err(IntegrationError::MaxNumStepReached { .. }) => {
                warn!(
                    "Non-stiff budget of {} steps exhausted at t={t_last:e}, switching to RODAS4",
                    options.nonstiff_max_steps
                );
            }
            Err(IntegrationError::StepSizeUnderflow { .. }) => {
                return Err(ChemError::integration(
                    t_last,
                    "step size underflow in the non-stiff phase",
                ));
            }
        }

        output.stiff_from = Some(t_last);
        let mut stiff = Rodas4::new(component, t_last, t1, y_last, options.clone());
        stiff.integrate_into(&mut output)?;
        debug!(
            "Stiff integration completed: {} accepted, {} rejected steps",
            output.stiff_steps, output.rejected_steps
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    struct ExponentialDecay {
        k: FloatValue,
    }

    impl IVP<1> for ExponentialDecay {
        fn calculate_dy_dt(&self, _t: Time, y: &State<1>, dy_dt: &mut State<1>) {
            dy_dt[0] = -self.k * y[0];
        }
    }

    /// Robertson's chemical kinetics problem, a classic stiff benchmark
    struct Robertson;

    impl IVP<3> for Robertson {
        fn calculate_dy_dt(&self, _t: Time, y: &State<3>, dy_dt: &mut State<3>) {
            dy_dt[0] = -0.04 * y[0] + 1.0e4 * y[1] * y[2];
            dy_dt[1] = 0.04 * y[0] - 1.0e4 * y[1] * y[2] - 3.0e7 * y[1] * y[1];
            dy_dt[2] = 3.0e7 * y[1] * y[1];
        }
    }

    struct Linear;

    impl IVP<2> for Linear {
        fn calculate_dy_dt(&self, _t: Time, y: &State<2>, dy_dt: &mut State<2>) {
            dy_dt[0] = 2.0 * y[0] - 3.0 * y[1];
            dy_dt[1] = 0.5 * y[0];
        }
    }

    struct Forced;

    impl IVP<1> for Forced {
        fn calculate_dy_dt(&self, t: Time, _y: &State<1>, dy_dt: &mut State<1>) {
            dy_dt[0] = t.cos();
        }
    }

    struct Blowup;

    impl IVP<1> for Blowup {
        fn calculate_dy_dt(&self, _t: Time, y: &State<1>, dy_dt: &mut State<1>) {
            dy_dt[0] = y[0] * y[0];
        }
    }

    struct NotANumber;

    impl IVP<1> for NotANumber {
        fn calculate_dy_dt(&self, _t: Time, _y: &State<1>, dy_dt: &mut State<1>) {
            dy_dt[0] = FloatValue::NAN;
        }
    }

    fn tight_options() -> SolverOptions {
        SolverOptions {
            rtol: 1e-8,
            atol: 1e-10,
            ..SolverOptions::default()
        }
    }

    #[test]
    fn test_finite_difference_jacobian_linear() {
        let jacobian = finite_difference_jacobian(&Linear, 0.0, &State::<2>::new(1.5, -2.0));

        assert!(is_close!(jacobian[(0, 0)], 2.0, rel_tol = 1e-8));
        assert!(is_close!(jacobian[(0, 1)], -3.0, rel_tol = 1e-8));
        assert!(is_close!(jacobian[(1, 0)], 0.5, rel_tol = 1e-8));
        assert!(jacobian[(1, 1)].abs() < 1e-8);
    }

    #[test]
    fn test_exponential_decay() {
        let model = Arc::new(ExponentialDecay { k: 0.5 });
        let output = IVPBuilder::new(model, State::<1>::new(2.0))
            .integrate(0.0, 4.0, &tight_options())
            .unwrap();

        let (t, y) = output.last_step().unwrap();
        assert_eq!(t, 4.0);
        assert!(
            is_close!(y[0], 2.0 * (-2.0_f64).exp(), rel_tol = 1e-6),
            "Expected {}, got {}",
            2.0 * (-2.0_f64).exp(),
            y[0]
        );
        assert_eq!(output.times[0], 0.0);
        assert_eq!(output.times.len(), output.states.len());
        assert!(output.stiff_from.is_none());
    }

    #[test]
    fn test_times_strictly_increasing() {
        let model = Arc::new(ExponentialDecay { k: 0.5 });
        let output = IVPBuilder::new(model, State::<1>::new(2.0))
            .integrate(0.0, 10.0, &SolverOptions::default())
            .unwrap();

        assert!(output.len() > 2);
        assert!(crate::timeseries::is_strictly_increasing(&output.times));
    }

    #[test]
    fn test_rodas4_exponential_decay() {
        let model = Arc::new(ExponentialDecay { k: 0.5 });
        let mut stepper =
            IVPBuilder::new(model, State::<1>::new(2.0)).to_rodas4(0.0, 4.0, &tight_options());
        let mut output = IntegrationOutput::new(0.0, State::<1>::new(2.0));
        stepper.integrate_into(&mut output).unwrap();

        let (t, y) = output.last_step().unwrap();
        assert_eq!(t, 4.0);
        assert!(is_close!(y[0], 2.0 * (-2.0_f64).exp(), rel_tol = 1e-6));
        assert!(output.stiff_steps > 0);
    }

    #[test]
    fn test_rodas4_non_autonomous() {
        // dy/dt = cos(t), so y(t) = sin(t)
        let mut stepper = IVPBuilder::new(Arc::new(Forced), State::<1>::new(0.0)).to_rodas4(
            0.0,
            3.0,
            &tight_options(),
        );
        let mut output = IntegrationOutput::new(0.0, State::<1>::new(0.0));
        stepper.integrate_into(&mut output).unwrap();

        let (_, y) = output.last_step().unwrap();
        assert!(is_close!(y[0], 3.0_f64.sin(), rel_tol = 1e-6), "y = {}", y[0]);
    }

    #[test]
    fn test_rodas4_min_step_is_integration_failure() {
        // Growth over a span that needs far smaller steps than min_step allows
        let options = SolverOptions {
            min_step: 5.0,
            ..tight_options()
        };
        let growth = Arc::new(ExponentialDecay { k: -1.0 });
        let mut stepper =
            IVPBuilder::new(growth, State::<1>::new(1.0)).to_rodas4(0.0, 20.0, &options);
        let mut output = IntegrationOutput::new(0.0, State::<1>::new(1.0));
        let result = stepper.integrate_into(&mut output);

        match result {
            Err(ChemError::IntegrationFailure { reason, .. }) => {
                assert!(reason.contains("min_step"), "{}", reason)
            }
            other => panic!("Expected an integration failure, got {:?}", other),
        }
        assert!(output.rejected_steps > 0);
    }

    #[test]
    fn test_nonstiff_underflow_is_integration_failure() {
        // y = 1 / (1 - t) blows up at t = 1
        let result = IVPBuilder::new(Arc::new(Blowup), State::<1>::new(1.0)).integrate(
            0.0,
            2.0,
            &SolverOptions::default(),
        );

        assert!(
            matches!(result, Err(ChemError::IntegrationFailure { t, .. }) if t < 1.0),
            "Expected an integration failure before t=1, got {:?}",
            result.map(|o| o.last_step().map(|(t, _)| t))
        );
    }

    #[test]
    fn test_robertson_switches_to_stiff() {
        let y0 = State::<3>::new(1.0, 0.0, 0.0);
        let options = SolverOptions {
            rtol: 1e-6,
            atol: 1e-10,
            nonstiff_max_steps: 20_000,
            ..SolverOptions::default()
        };
        let output = IVPBuilder::new(Arc::new(Robertson), y0)
            .integrate(0.0, 40.0, &options)
            .unwrap();

        assert!(output.stiff_from.is_some());
        let (t, y) = output.last_step().unwrap();
        assert_eq!(t, 40.0);
        // Reference solution from Hairer & Wanner
        assert!(is_close!(y[0], 0.7158, rel_tol = 1e-3), "y0 = {}", y[0]);
        assert!(is_close!(y[2], 0.2842, rel_tol = 2e-3), "y2 = {}", y[2]);
        // Mass is conserved
        assert!(is_close!(y.sum(), 1.0, rel_tol = 1e-6));
    }

    #[test]
    fn test_step_budget_is_integration_failure() {
        let options = SolverOptions {
            nonstiff_max_steps: 10,
            max_steps: 1,
            ..SolverOptions::default()
        };
        let result = IVPBuilder::new(Arc::new(Robertson), State::<3>::new(1.0, 0.0, 0.0))
            .integrate(0.0, 40.0, &options);

        assert!(
            matches!(result, Err(ChemError::IntegrationFailure { .. })),
            "Expected an integration failure, got {:?}",
            result.map(|o| o.len())
        );
    }

    #[test]
    fn test_rodas4_non_finite_derivative_fails() {
        let mut stepper = IVPBuilder::new(Arc::new(NotANumber), State::<1>::new(1.0)).to_rodas4(
            0.0,
            1.0,
            &SolverOptions::default(),
        );
        let mut output = IntegrationOutput::new(0.0, State::<1>::new(1.0));
        let result = stepper.integrate_into(&mut output);

        assert!(matches!(result, Err(ChemError::IntegrationFailure { .. })));
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_invalid_span() {
        let model = Arc::new(ExponentialDecay { k: 0.5 });
        let result = IVPBuilder::new(model, State::<1>::new(2.0)).integrate(
            1.0,
            1.0,
            &SolverOptions::default(),
        );
        assert!(matches!(result, Err(ChemError::InvalidParameter(_))));
    }

    #[test]
    fn test_options_validation() {
        let options = SolverOptions {
            rtol: 0.0,
            ..SolverOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ChemError::InvalidParameter(_))
        ));

        let options = SolverOptions {
            max_steps: 0,
            ..SolverOptions::default()
        };
        assert!(options.validate().is_err());
        assert!(SolverOptions::default().validate().is_ok());
    }

    #[test]
    fn test_options_defaults_from_partial_json() {
        let options: SolverOptions = serde_json::from_str(r#"{"rtol": 1e-3}"#).unwrap();

        assert_eq!(options.rtol, 1e-3);
        assert_eq!(options.atol, SolverOptions::default().atol);
        assert!(options.non_negative);
    }
}

//! Fourth order Rosenbrock method for stiff problems
//!
//! RODAS4 (Hairer & Wanner, Solving Ordinary Differential Equations II,
//! section VI.4) is a six stage, L-stable and stiffly accurate Rosenbrock
//! method with an embedded third order solution. It is the workhorse of
//! atmospheric chemistry solvers such as KPP. Every stage solves a linear
//! system with the same matrix $W = \frac{1}{\gamma h} I - J$:
//!
//! $$ W K_i = f\left(t + \alpha_i h,\ y_n + \sum_{j<i} a_{ij} K_j\right)
//!     + \sum_{j<i} \frac{c_{ij}}{h} K_j + \gamma_i h \frac{\partial f}{\partial t} $$
//!
//! The new state is $y_{n+1} = y_n + \sum_i m_i K_i$ and the last stage
//! $K_6$ is the local error estimate.

use super::{IntegrationOutput, Jacobian, SolverOptions, State, IVP};
use crate::errors::{ChemError, ChemResult};
use crate::timeseries::{FloatValue, Time};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

const STAGES: usize = 6;
const GAMMA: FloatValue = 0.25;
const ALPHA: [FloatValue; STAGES] = [0.0, 0.386, 0.21, 0.63, 1.0, 1.0];
/// Coefficients of $\partial f / \partial t$ in each stage
const GAMMA_I: [FloatValue; STAGES] = [0.25, -0.1043, 0.1035, -0.0362, 0.0, 0.0];
const A_IJ: [[FloatValue; STAGES]; STAGES] = [
    [0.0; STAGES],
    [1.544, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.9466785280815826, 0.2557011698983284, 0.0, 0.0, 0.0, 0.0],
    [3.314825187068521, 2.896124015972201, 0.9986419139977817, 0.0, 0.0, 0.0],
    [1.221224509226641, 6.019134481288629, 12.53708332932087, -0.6878860361058950, 0.0, 0.0],
    [1.221224509226641, 6.019134481288629, 12.53708332932087, -0.6878860361058950, 1.0, 0.0],
];
const C_IJ: [[FloatValue; STAGES]; STAGES] = [
    [0.0; STAGES],
    [-5.6688, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-2.430093356833875, -0.2063599157091915, 0.0, 0.0, 0.0, 0.0],
    [-0.1073529058151375, -9.594562251023355, -20.47028614809616, 0.0, 0.0, 0.0],
    [7.496443313967647, -10.24680431464352, -33.99990352819905, 11.70890893206160, 0.0, 0.0],
    [
        8.083246795921522,
        -7.981132988064893,
        -31.52159432874371,
        16.31930543123136,
        -6.058818238834054,
        0.0,
    ],
];
const M_I: [FloatValue; STAGES] = [
    1.221224509226641,
    6.019134481288629,
    12.53708332932087,
    -0.6878860361058950,
    1.0,
    1.0,
];
/// Order of the embedded solution plus one
const ERROR_EXPONENT: FloatValue = 1.0 / 4.0;

const SAFETY: FloatValue = 0.9;
const MIN_FACTOR: FloatValue = 0.2;
const MAX_FACTOR: FloatValue = 6.0;
/// Step reduction after a step that produced non-finite values
const NON_FINITE_FACTOR: FloatValue = 0.25;

/// Adaptive RODAS4 stepper
pub struct Rodas4<C, const N: usize> {
    component: Arc<C>,
    t: Time,
    t_end: Time,
    y: State<N>,
    h: FloatValue,
    options: SolverOptions,
}

impl<C, const N: usize> Rodas4<C, N>
where
    C: IVP<N>,
{
    pub fn new(
        component: Arc<C>,
        t0: Time,
        t_end: Time,
        y0: State<N>,
        options: SolverOptions,
    ) -> Self {
        let mut stepper = Self {
            component,
            t: t0,
            t_end,
            y: y0,
            h: 0.0,
            options,
        };
        stepper.h = stepper.initial_step();
        stepper
    }

    /// Integrate to the end time, appending every accepted step to `output`
    pub fn integrate_into(&mut self, output: &mut IntegrationOutput<N>) -> ChemResult<()> {
        let mut f0 = State::<N>::zeros();
        let mut rejected_last = false;
        let mut n_steps = 0;

        while self.t < self.t_end {
            if n_steps >= self.options.max_steps {
                return Err(ChemError::integration(
                    self.t,
                    format!("exceeded max_steps={}", self.options.max_steps),
                ));
            }
            n_steps += 1;

            let remaining = self.t_end - self.t;
            let last_step = self.h >= remaining;
            let h = if last_step { remaining } else { self.h };
            if h < self.options.min_step && !last_step {
                return Err(ChemError::integration(
                    self.t,
                    format!("step size {h:e} below min_step={:e}", self.options.min_step),
                ));
            }

            self.component.calculate_dy_dt(self.t, &self.y, &mut f0);
            let dfdt = self.time_derivative(&f0);
            let jacobian = self.component.calculate_jacobian(self.t, &self.y);
            let stages = self.stages(h, &f0, &dfdt, jacobian)?;

            let mut y_new = M_I
                .iter()
                .zip(stages.iter())
                .fold(self.y, |y, (m, k)| y + k * *m);
            let err_norm = self.error_norm(&stages[STAGES - 1], &y_new);

            if !err_norm.is_finite() || y_new.iter().any(|v| !v.is_finite()) {
                output.rejected_steps += 1;
                rejected_last = true;
                self.h = h * NON_FINITE_FACTOR;
                continue;
            }

            let factor = if err_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err_norm.powf(-ERROR_EXPONENT)).clamp(MIN_FACTOR, MAX_FACTOR)
            };

            if err_norm <= 1.0 {
                if self.options.non_negative {
                    y_new.iter_mut().for_each(|v| *v = (*v).max(0.0));
                }
                self.t = if last_step { self.t_end } else { self.t + h };
                self.y = y_new;
                if output.push(self.t, self.y) {
                    output.stiff_steps += 1;
                }
                // Do not grow the step straight after a rejection
                self.h = if rejected_last { h * factor.min(1.0) } else { h * factor };
                rejected_last = false;
            } else {
                output.rejected_steps += 1;
                rejected_last = true;
                self.h = h * factor.min(1.0);
            }
        }
        Ok(())
    }

    /// Solve for the six stage increments $K_i$ of a step of size `h`
    fn stages(
        &self,
        h: FloatValue,
        f0: &State<N>,
        dfdt: &State<N>,
        jacobian: Jacobian<N>,
    ) -> ChemResult<[State<N>; STAGES]> {
        let w = iteration_matrix(jacobian, GAMMA * h);
        let lu = DMatrix::from_column_slice(N, N, w.as_slice()).lu();
        let solve = |rhs: &State<N>| -> ChemResult<State<N>> {
            lu.solve(&DVector::from_column_slice(rhs.as_slice()))
                .map(|x| State::<N>::from_column_slice(x.as_slice()))
                .ok_or_else(|| singular(self.t))
        };

        let mut stages = [State::<N>::zeros(); STAGES];
        let mut f_stage = State::<N>::zeros();
        for i in 0..STAGES {
            let mut rhs = if i == 0 {
                *f0
            } else {
                let y_stage = stages[..i]
                    .iter()
                    .zip(A_IJ[i].iter())
                    .fold(self.y, |y, (k, a)| y + k * *a);
                self.component.calculate_dy_dt(self.t + ALPHA[i] * h, &y_stage, &mut f_stage);
                f_stage
            };
            for (k, c) in stages[..i].iter().zip(C_IJ[i].iter()) {
                rhs += k * (c / h);
            }
            if GAMMA_I[i] != 0.0 {
                rhs += dfdt * (GAMMA_I[i] * h);
            }
            stages[i] = solve(&rhs)?;
        }
        Ok(stages)
    }

    /// Forward difference approximation of $\partial f / \partial t$
    fn time_derivative(&self, f0: &State<N>) -> State<N> {
        let delta = FloatValue::EPSILON.sqrt() * self.t.abs().max(1e-5);
        let mut f1 = State::<N>::zeros();
        self.component.calculate_dy_dt(self.t + delta, &self.y, &mut f1);
        (f1 - f0) / delta
    }

    /// Root mean square of the error scaled by the mixed tolerance
    fn error_norm(&self, error: &State<N>, y_new: &State<N>) -> FloatValue {
        let sum: FloatValue = error
            .iter()
            .zip(self.y.iter().zip(y_new.iter()))
            .map(|(e, (y0, y1))| {
                let scale = self.options.atol + self.options.rtol * y0.abs().max(y1.abs());
                (e / scale).powi(2)
            })
            .sum();
        (sum / N as FloatValue).sqrt()
    }

    /// Starting step of Hairer & Wanner: a hundredth of the ratio of the
    /// weighted norms of the state and its derivative
    fn initial_step(&self) -> FloatValue {
        let span = self.t_end - self.t;
        let mut dy = State::<N>::zeros();
        self.component.calculate_dy_dt(self.t, &self.y, &mut dy);

        let weighted_norm = |v: &State<N>| -> FloatValue {
            let sum: FloatValue = v
                .iter()
                .zip(self.y.iter())
                .map(|(x, y)| (x / (self.options.atol + self.options.rtol * y.abs())).powi(2))
                .sum();
            (sum / N as FloatValue).sqrt()
        };
        let d0 = weighted_norm(&self.y);
        let d1 = weighted_norm(&dy);

        let h = if d0 < 1e-5 || d1 < 1e-5 || !d1.is_finite() {
            1e-6 * span
        } else {
            0.01 * d0 / d1
        };
        h.min(span).max(self.options.min_step)
    }
}

fn singular(t: Time) -> ChemError {
    ChemError::integration(t, "singular iteration matrix")
}

/// Iteration matrix $\frac{1}{\gamma h} I - J$
fn iteration_matrix<const N: usize>(jacobian: Jacobian<N>, gamma_h: FloatValue) -> Jacobian<N> {
    Jacobian::<N>::identity() / gamma_h - jacobian
}

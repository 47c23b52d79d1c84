//! Solve contract of the tropospheric model.
//!
//! These tests integrate the full model and check the post-processing:
//! - sample counts with and without spin-up
//! - conversion of the time axis to days
//! - rejection of spin-up fractions that discard everything
//! - the reference scenario end to end

use approx::assert_relative_eq;
use tropochem_components::solver::spin_up_index;
use tropochem_components::{KineticModel, ScenarioConfig, Solver, Species};
use tropochem_core::errors::ChemError;
use tropochem_core::timeseries::{is_strictly_increasing, SECONDS_PER_DAY};

const X0: [f64; 6] = [5e11, 5e9, 3e11, 5e9, 5e6, 2.5e8];

/// The reference model over a shorter window
fn short_model() -> KineticModel {
    KineticModel::new(5e5, 6.3e4, 6e4, 0.0, 1e7, &X0).unwrap()
}

mod spin_up {
    use super::*;

    #[test]
    fn test_zero_spin_up_keeps_every_sample() {
        let solver = Solver::new(&short_model());
        let raw = solver.integrate().unwrap();
        let result = solver.solve(0.0).unwrap();

        assert_eq!(result.len(), raw.len());
        assert_eq!(result.time()[0], 0.0);
        for species in Species::ALL {
            assert_eq!(result.species(species).len(), raw.len());
            assert_eq!(result.species(species)[0], X0[species.index()]);
        }
    }

    #[test]
    fn test_half_spin_up() {
        let solver = Solver::new(&short_model());
        let raw = solver.integrate().unwrap();
        let result = solver.solve(0.5).unwrap();

        let total = raw.len();
        let idx = spin_up_index(total, 0.5);
        assert_eq!(result.len(), total - idx);

        let last_discarded = raw.times[idx - 1] / SECONDS_PER_DAY;
        assert!(result.time()[0] >= last_discarded);
        assert_eq!(
            result.species(Species::NO2)[0],
            raw.states[idx][Species::NO2.index()]
        );
    }

    #[test]
    fn test_time_is_in_days() {
        let solver = Solver::new(&short_model());
        let raw = solver.integrate().unwrap();
        let result = solver.solve(0.25).unwrap();

        let idx = spin_up_index(raw.len(), 0.25);
        for (days, seconds) in result.time().iter().zip(&raw.times[idx..]) {
            assert_relative_eq!(*days, seconds / 86400.0, max_relative = 1e-9);
        }
        assert_relative_eq!(
            *result.time().last().unwrap(),
            1e7 / 86400.0,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_spin_up_discarding_everything_is_rejected() {
        let solver = Solver::new(&short_model());
        let total = solver.integrate().unwrap().len();

        // Rounds up to the full sample count while staying below one
        let fraction = 1.0 - 0.4 / total as f64;
        assert_eq!(spin_up_index(total, fraction), total);

        assert!(matches!(
            solver.solve(fraction),
            Err(ChemError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_out_of_range_spin_up_is_rejected() {
        let solver = Solver::new(&short_model());
        for fraction in [1.0, -0.5, f64::NAN] {
            assert!(matches!(
                solver.solve(fraction),
                Err(ChemError::InvalidParameter(_))
            ));
        }
    }
}

mod integration {
    use super::*;
    use tropochem_core::ivp::SolverOptions;

    #[test]
    fn test_step_limit_is_integration_failure() {
        let options = SolverOptions {
            nonstiff_max_steps: 10,
            max_steps: 3,
            ..SolverOptions::default()
        };
        let solver = Solver::new(&short_model()).with_options(options);

        match solver.solve(0.0) {
            Err(ChemError::IntegrationFailure { t, .. }) => assert!(t < 1e7),
            other => panic!("Expected IntegrationFailure, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_deterministic() {
        let solver = Solver::new(&short_model());
        assert_eq!(solver.solve(0.5).unwrap(), solver.solve(0.5).unwrap());
    }
}

mod reference_scenario {
    use super::*;

    #[test]
    fn test_reference_scenario() {
        let scenario = ScenarioConfig::default();
        let solver = scenario.solver().unwrap();
        let raw = solver.integrate().unwrap();
        assert!(
            raw.stiff_from.is_some(),
            "The reference scenario should need the stiff method"
        );
        // A few thousand samples: enough to animate, without one frame per tiny step
        assert!(
            raw.len() < 10_000,
            "Expected a few thousand samples, got {} ({} stiff steps, {} rejected)",
            raw.len(),
            raw.stiff_steps,
            raw.rejected_steps
        );

        let result = scenario.run().unwrap();

        assert!(!result.is_empty());
        assert_eq!(result.len(), raw.len() - spin_up_index(raw.len(), 0.5));

        let time = result.time().to_vec();
        assert!(is_strictly_increasing(&time));
        assert_relative_eq!(*time.last().unwrap(), 1e8 / 86400.0, max_relative = 1e-9);

        for species in Species::ALL {
            let values = result.species(species);
            assert_eq!(values.len(), time.len());
            assert!(
                values.iter().all(|v| v.is_finite() && *v >= 0.0),
                "{} has non-finite or negative values",
                species
            );
        }

        let trajectory = scenario.phase_trajectory(&result);
        assert_eq!(trajectory.x_species, Species::CO);
        assert_eq!(trajectory.y_species, Species::OH);
        assert_eq!(trajectory.len(), result.len());

        let ((co_min, co_max), (oh_min, oh_max)) = trajectory.bounds().unwrap();
        assert!(co_min <= co_max && oh_min <= oh_max);
        assert!(co_min > 0.0 && oh_min > 0.0);
    }
}

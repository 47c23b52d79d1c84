//! Tropospheric photochemistry driver
//!
//! Solves a scenario of the CO/NOx/O3/HOx box model and prints the phase
//! trajectory summary that a plotting tool needs: sample count, time range,
//! axis bounds and number of animation frames.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --config scenario.toml --x CO --y OH
//! ```
//!
//! Without `--config` the reference scenario is solved. Warnings from the
//! solver are written to stderr; `--verbose` adds debug output.

use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};
use std::path::PathBuf;
use std::process::ExitCode;
use tropochem_components::constants::CONCENTRATION_UNIT;
use tropochem_components::{ScenarioConfig, Species};
use tropochem_core::errors::ChemResult;
use tropochem_core::timeseries::FloatValue;

/// Tropospheric photochemistry box model
#[derive(Parser, Debug)]
#[command(name = "tropochem")]
#[command(about = "Solve a CO/NOx/O3/HOx box model scenario and summarise its phase trajectory")]
struct Args {
    /// TOML scenario file (defaults to the reference scenario)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fraction of leading samples to discard as spin-up
    #[arg(long)]
    spin_up: Option<FloatValue>,

    /// Species on the horizontal axis
    #[arg(long)]
    x: Option<Species>,

    /// Species on the vertical axis
    #[arg(long)]
    y: Option<Species>,

    /// Print the resolved scenario and debug logs from the solver
    #[arg(short, long)]
    verbose: bool,
}

/// Writes log records to stderr
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn load_scenario(args: &Args) -> ChemResult<ScenarioConfig> {
    let mut scenario = match &args.config {
        Some(path) => ScenarioConfig::from_file(path)?,
        None => ScenarioConfig::default(),
    };
    if let Some(spin_up) = args.spin_up {
        scenario.spin_up = spin_up;
    }
    if let Some(x) = args.x {
        scenario.plot.x = x;
    }
    if let Some(y) = args.y {
        scenario.plot.y = y;
    }
    Ok(scenario)
}

fn run(args: &Args) -> ChemResult<()> {
    let scenario = load_scenario(args)?;
    if args.verbose {
        println!("{}", scenario.to_toml_string()?);
    }

    let result = scenario.run()?;
    let trajectory = scenario.phase_trajectory(&result);

    println!("Samples: {}", result.len());
    if let (Some(first), Some(last)) = (result.time().first(), result.time().last()) {
        println!("Time: {:.3} to {:.3} days", first, last);
    }
    if let Some(((x_min, x_max), (y_min, y_max))) = trajectory.bounds() {
        println!(
            "[{}] {}: {:.4e} to {:.4e}",
            trajectory.x_species, CONCENTRATION_UNIT, x_min, x_max
        );
        println!(
            "[{}] {}: {:.4e} to {:.4e}",
            trajectory.y_species, CONCENTRATION_UNIT, y_min, y_max
        );
    }
    println!("Frames: {}", trajectory.frames().count());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_to_reference_scenario() {
        let args =
            Args::try_parse_from(["tropochem", "--spin-up", "0.25", "--x", "no2", "--y", "O3"])
                .unwrap();
        let scenario = load_scenario(&args).unwrap();

        assert_eq!(scenario.spin_up, 0.25);
        assert_eq!(scenario.plot.x, Species::NO2);
        assert_eq!(scenario.plot.y, Species::O3);
        assert_eq!(scenario.forcing, ScenarioConfig::default().forcing);
    }

    #[test]
    fn test_unknown_species_is_rejected() {
        assert!(Args::try_parse_from(["tropochem", "--x", "CH4"]).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::try_parse_from(["tropochem", "--config", "/nonexistent/scenario.toml"])
            .unwrap();
        assert!(load_scenario(&args).is_err());
    }
}

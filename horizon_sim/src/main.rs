// horizon_sim/src/main.rs

use clap::Parser;
use horizon_sim::cli::Cli;
use horizon_sim::simulation::config::load_scenario;
use horizon_sim::simulation::error::SimError;
use horizon_sim::simulation::runner::{self, SimulationReport};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // A good filter for focusing on our crates' logs; override with RUST_LOG.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,horizon_core=info,horizon_sim=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            println!("{}", report);
            if report.degraded {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("Simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<SimulationReport, SimError> {
    let mut config = load_scenario(&cli.scenario)?;
    cli.apply_overrides(&mut config);
    runner::run(&config)
}

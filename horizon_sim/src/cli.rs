// horizon_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

use crate::simulation::config::ScenarioConfig;

/// Horizon: drives a fixed-lag smoother with simulated sensors and scores its estimate.
///
/// Flags given here take precedence over the scenario file and the environment.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/default.toml")]
    pub scenario: PathBuf,

    /// Seed for the noise generators. Overrides `simulation.seed`.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulated duration in seconds. Overrides `simulation.duration_seconds`.
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Simulated seconds per wall-clock second. Overrides `simulation.realtime_factor`.
    #[arg(long)]
    pub realtime_factor: Option<f64>,
}

impl Cli {
    /// Applies the command-line overrides on top of a loaded scenario.
    pub fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
        if let Some(duration) = self.duration {
            config.simulation.duration_seconds = duration;
        }
        if let Some(factor) = self.realtime_factor {
            config.simulation.realtime_factor = factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_scenario_values() {
        let cli = Cli::parse_from(["horizon_sim", "--seed", "11", "-d", "2.5"]);
        assert_eq!(cli.scenario, PathBuf::from("assets/scenarios/default.toml"));
        let mut config = ScenarioConfig::default();
        config.simulation.realtime_factor = 4.0;
        cli.apply_overrides(&mut config);
        assert_eq!(config.simulation.seed, Some(11));
        assert_eq!(config.simulation.duration_seconds, 2.5);
        assert_eq!(config.simulation.realtime_factor, 4.0);
    }
}

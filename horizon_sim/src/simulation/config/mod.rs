// horizon_sim/src/simulation/config/mod.rs

//! Loading and validating scenario configuration.
//!
//! A scenario is read from a TOML file and can be overridden from the environment,
//! e.g. `HORIZON_SMOOTHER__LAG_DURATION=2.0` or `HORIZON_SIMULATION__SEED=7`.

pub mod structs;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

use crate::simulation::error::SimError;
pub use structs::{
    LandmarkConfig, OdometryConfig, PoseFixConfig, RobotConfig, ScenarioConfig, SensorConfig, Simulation,
};

const ENV_PREFIX: &str = "HORIZON_";

/// Loads a scenario file, applies environment overrides and validates the result.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, SimError> {
    if !path.is_file() {
        return Err(SimError::ScenarioNotFound(path.to_path_buf()));
    }
    info!("Loading scenario from: {}", path.display());

    let config: ScenarioConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    config.validate()?;
    info!(
        "Scenario loaded: {} sensor(s), {:.1} s at {}x real time.",
        config.sensors.len(),
        config.simulation.duration_seconds,
        config.simulation.realtime_factor
    );
    Ok(config)
}

impl ScenarioConfig {
    /// Parses and validates a scenario from TOML text, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, SimError> {
        let config: ScenarioConfig = Figment::from(Toml::string(toml)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |message: String| Err(SimError::InvalidScenario(message));

        if !(self.simulation.duration_seconds.is_finite() && self.simulation.duration_seconds > 0.0) {
            return invalid(format!(
                "simulation.duration_seconds must be positive, got {}",
                self.simulation.duration_seconds
            ));
        }
        if !(self.simulation.realtime_factor.is_finite() && self.simulation.realtime_factor > 0.0) {
            return invalid(format!(
                "simulation.realtime_factor must be positive, got {}",
                self.simulation.realtime_factor
            ));
        }
        if !(self.robot.speed.is_finite() && self.robot.yaw_rate.is_finite()) {
            return invalid("robot.speed and robot.yaw_rate must be finite".to_string());
        }

        let mut names = BTreeSet::new();
        for sensor in &self.sensors {
            if !names.insert(sensor.name()) {
                return invalid(format!("duplicate sensor name '{}'", sensor.name()));
            }
            let (rate, stddevs): (f64, Vec<f64>) = match sensor {
                SensorConfig::Odometry(c) => (c.rate, c.noise_stddev.to_vec()),
                SensorConfig::PoseFix(c) => {
                    if !(c.latency.is_finite() && c.latency >= 0.0) {
                        return invalid(format!("sensor '{}': latency must not be negative", c.name));
                    }
                    if c.huber_scale.is_some_and(|a| !(a.is_finite() && a > 0.0)) {
                        return invalid(format!("sensor '{}': huber_scale must be positive", c.name));
                    }
                    (c.rate, c.noise_stddev.to_vec())
                }
                SensorConfig::Landmarks(c) => {
                    if !(c.range.is_finite() && c.range > 0.0) {
                        return invalid(format!("sensor '{}': range must be positive", c.name));
                    }
                    (c.rate, vec![c.noise_stddev])
                }
            };
            if !(rate.is_finite() && rate > 0.0) {
                return invalid(format!("sensor '{}': rate must be positive, got {}", sensor.name(), rate));
            }
            if stddevs.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                return invalid(format!("sensor '{}': noise_stddev must be positive", sensor.name()));
            }
        }

        let has_odometry = self.sensors.iter().any(|s| matches!(s, SensorConfig::Odometry(_)));
        let has_fix = self.sensors.iter().any(|s| matches!(s, SensorConfig::PoseFix(_)));
        if has_odometry && !has_fix {
            warn!("Scenario has odometry but no pose fix; the trajectory is unanchored once the initial prior leaves the window.");
        }
        Ok(())
    }
}

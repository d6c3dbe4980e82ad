// horizon_sim/src/simulation/config/structs.rs

use horizon_core::params::SmootherParams;
use serde::Deserialize;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// The root of the data parsed from a `scenario.toml` file.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: Simulation,

    #[serde(default)]
    pub smoother: SmootherParams,

    #[serde(default)]
    pub robot: RobotConfig,

    // The TOML has `[[sensors]]`, which becomes a Vec of SensorConfig.
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Simulation {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Duration of the simulation in simulated seconds.
    pub duration_seconds: f64,
    /// How many simulated seconds pass per wall-clock second.
    #[serde(default = "default_realtime_factor")]
    pub realtime_factor: f64,
}

fn default_realtime_factor() -> f64 {
    10.0
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: None,
            duration_seconds: 30.0,
            realtime_factor: default_realtime_factor(),
        }
    }
}

/// A unicycle driving a circle at constant speed and yaw rate.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RobotConfig {
    pub name: String,
    /// Forward speed in m/s.
    pub speed: f64,
    /// Yaw rate in rad/s.
    pub yaw_rate: f64,
    /// Starting pose `[x, y, yaw]`.
    #[serde(default)]
    pub starting_pose: [f64; 3],
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            name: "rover".to_string(),
            speed: 1.0,
            yaw_rate: 0.1,
            starting_pose: [0.0; 3],
        }
    }
}

/// An enum representing any possible sensor configuration.
/// `serde` uses the `type` field in the TOML to pick the variant.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum SensorConfig {
    Odometry(OdometryConfig),
    PoseFix(PoseFixConfig),
    Landmarks(LandmarkConfig),
}

impl SensorConfig {
    pub fn name(&self) -> &str {
        match self {
            SensorConfig::Odometry(c) => &c.name,
            SensorConfig::PoseFix(c) => &c.name,
            SensorConfig::Landmarks(c) => &c.name,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OdometryConfig {
    pub name: String,
    /// Rate in Hz.
    pub rate: f64,
    /// Standard deviation of the `[translation (m), rotation (rad)]` increments.
    pub noise_stddev: [f64; 2],
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PoseFixConfig {
    pub name: String,
    pub rate: f64,
    /// Standard deviation of the `[position (m), heading (rad)]` fix.
    pub noise_stddev: [f64; 2],
    /// Simulated delivery delay in seconds.
    #[serde(default)]
    pub latency: f64,
    /// Scale of the Huber loss applied to the position fix. Omit for plain least squares.
    #[serde(default)]
    pub huber_scale: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LandmarkConfig {
    pub name: String,
    pub rate: f64,
    /// Maximum distance at which a landmark is sighted.
    pub range: f64,
    pub noise_stddev: f64,
    /// World positions `[x, y, z]` of the landmarks; ids are their indices.
    pub positions: Vec<[f64; 3]>,
}

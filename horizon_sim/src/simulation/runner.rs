// horizon_sim/src/simulation/runner.rs

//! Wires a scenario together: ground truth, producers on their own threads, a background
//! smoother, and a monitor that scores the published estimate against the truth.

use horizon_core::identity;
use horizon_core::prelude::*;
use horizon_core::variables::wrap_angle;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::simulation::config::{ScenarioConfig, SensorConfig};
use crate::simulation::core::clock::SimClock;
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::core::trajectory::{Pose2D, Trajectory};
use crate::simulation::error::SimError;
use crate::simulation::producers;

/// Wall-clock limit on waiting for the smoother to consume everything that was submitted.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// One comparison of the published estimate with the ground truth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingSample {
    pub stamp: Stamp,
    pub estimate: Pose2D,
    pub truth: Pose2D,
}

impl TrackingSample {
    pub fn position_error(&self) -> f64 {
        (self.estimate.x - self.truth.x).hypot(self.estimate.y - self.truth.y)
    }

    pub fn heading_error(&self) -> f64 {
        wrap_angle(self.estimate.yaw - self.truth.yaw).abs()
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub seed: u64,
    pub submitted: usize,
    pub stats: SmootherStats,
    pub degraded: bool,
    pub final_variables: usize,
    pub final_constraints: usize,
    pub samples: Vec<TrackingSample>,
    /// Distance between each estimated landmark and its surveyed position.
    pub landmark_errors: Vec<(u64, f64)>,
}

impl SimulationReport {
    pub fn position_rmse(&self) -> Option<f64> {
        rmse(self.samples.iter().map(TrackingSample::position_error))
    }

    pub fn heading_rmse(&self) -> Option<f64> {
        rmse(self.samples.iter().map(TrackingSample::heading_error))
    }

    pub fn landmark_rmse(&self) -> Option<f64> {
        rmse(self.landmark_errors.iter().map(|(_, e)| *e))
    }
}

fn rmse(errors: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = errors.fold((0.0, 0usize), |(sum, count), e| (sum + e * e, count + 1));
    (count > 0).then(|| (sum / count as f64).sqrt())
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metric = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
        writeln!(f, "seed:                 {}", self.seed)?;
        writeln!(f, "degraded:             {}", self.degraded)?;
        writeln!(f, "submitted:            {}", self.submitted)?;
        writeln!(
            f,
            "applied/dropped/rej.: {}/{}/{}",
            self.stats.transactions_applied, self.stats.transactions_dropped, self.stats.transactions_rejected
        )?;
        writeln!(
            f,
            "cycles/optimizations: {}/{} ({} failed)",
            self.stats.cycles, self.stats.optimizations, self.stats.optimization_failures
        )?;
        writeln!(
            f,
            "marginalized:         {} variables, {} constraints",
            self.stats.variables_marginalized, self.stats.constraints_marginalized
        )?;
        writeln!(
            f,
            "final graph:          {} variables, {} constraints",
            self.final_variables, self.final_constraints
        )?;
        writeln!(f, "samples:              {}", self.samples.len())?;
        writeln!(f, "position rmse (m):    {}", metric(self.position_rmse()))?;
        writeln!(f, "heading rmse (rad):   {}", metric(self.heading_rmse()))?;
        write!(f, "landmark rmse (m):    {}", metric(self.landmark_rmse()))
    }
}

/// Runs `config` to completion and scores the result.
pub fn run(config: &ScenarioConfig) -> Result<SimulationReport, SimError> {
    config.validate()?;
    let seed = SimulationRng::resolve_seed(config.simulation.seed);
    let rng = SimulationRng::new(seed);
    let device = identity::from_name(&config.robot.name);
    let trajectory = Trajectory::from_config(&config.robot);
    let duration = config.simulation.duration_seconds;

    let handle = Smoother::new(config.smoother.clone(), Box::new(LevenbergMarquardt::new()))
        .spawn()
        .map_err(|source| SimError::Spawn {
            name: "horizon-smoother".into(),
            source,
        })?;
    let reader = handle.reader();
    let synchronizer = Synchronizer::pose_2d(device, config.smoother.lag_duration);

    let clock = SimClock::start(config.simulation.realtime_factor);
    let mut threads = Vec::with_capacity(config.sensors.len());
    for sensor in &config.sensors {
        let producer = producers::from_config(sensor, device, trajectory, &rng)?;
        threads.push((
            sensor.name().to_string(),
            producers::spawn(producer, handle.sender(), clock, duration)?,
        ));
    }
    info!("Running {} producer(s) for {:.1} simulated seconds.", threads.len(), duration);

    let monitor_period = Duration::from_secs_f64(config.smoother.optimization_period.max(0.01));
    let mut monitor = Monitor::new(device, trajectory);
    while threads.iter().any(|(_, t)| !t.is_finished()) {
        monitor.sample(&reader, &synchronizer);
        thread::sleep(monitor_period);
    }

    let mut submitted = 0;
    for (name, thread) in threads {
        let report = thread.join().map_err(|_| SimError::ProducerPanicked(name))??;
        submitted += report.submitted;
    }

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    loop {
        let stats = reader.stats();
        let consumed = stats.transactions_applied + stats.transactions_dropped + stats.transactions_rejected;
        if consumed >= submitted as u64 {
            break;
        }
        if Instant::now() >= deadline {
            warn!("Smoother consumed {} of {} transactions before the timeout.", consumed, submitted);
            break;
        }
        thread::sleep(monitor_period);
    }
    // The last cycle may still be optimizing.
    thread::sleep(monitor_period);
    monitor.sample(&reader, &synchronizer);

    let smoother = handle.shutdown().map_err(|_| SimError::SmootherPanicked)?;
    let snapshot = reader.snapshot();

    let landmark_errors = config
        .sensors
        .iter()
        .filter_map(|s| match s {
            SensorConfig::Landmarks(c) => Some(c),
            _ => None,
        })
        .flat_map(|c| c.positions.iter().enumerate())
        .filter_map(|(id, truth)| {
            let variable = snapshot
                .get_variable(&Variable::point_3d_landmark(id as u64).uuid())
                .ok()?;
            let d = variable.data();
            let error = ((d[0] - truth[0]).powi(2) + (d[1] - truth[1]).powi(2) + (d[2] - truth[2]).powi(2)).sqrt();
            Some((id as u64, error))
        })
        .collect();

    let report = SimulationReport {
        seed,
        submitted,
        stats: reader.stats(),
        degraded: smoother.is_degraded(),
        final_variables: snapshot.variable_count(),
        final_constraints: snapshot.constraint_count(),
        samples: monitor.samples,
        landmark_errors,
    };
    info!(
        "Simulation finished: {} samples, position rmse {:?}.",
        report.samples.len(),
        report.position_rmse()
    );
    Ok(report)
}

/// Polls the published snapshot and records the newest stable pose each time it changes.
struct Monitor {
    device: Uuid,
    trajectory: Trajectory,
    samples: Vec<TrackingSample>,
}

impl Monitor {
    fn new(device: Uuid, trajectory: Trajectory) -> Self {
        Self {
            device,
            trajectory,
            samples: Vec::new(),
        }
    }

    fn sample(&mut self, reader: &SmootherReader, synchronizer: &Synchronizer) {
        let snapshot = reader.snapshot();
        let Some(stamp) = synchronizer.find_latest_common_stamp(&snapshot) else {
            return;
        };
        if self.samples.last().is_some_and(|s| s.stamp >= stamp) {
            return;
        }
        let position = snapshot.get_variable(&Variable::position_2d(stamp, self.device).uuid());
        let heading = snapshot.get_variable(&Variable::orientation_2d(stamp, self.device).uuid());
        let (Ok(position), Ok(heading)) = (position, heading) else {
            return;
        };
        self.samples.push(TrackingSample {
            stamp,
            estimate: Pose2D::new(position.data()[0], position.data()[1], heading.data()[0]),
            truth: self.trajectory.pose_at(stamp.as_secs_f64()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmse() {
        assert_eq!(rmse(std::iter::empty()), None);
        let value = rmse([3.0, 4.0].into_iter()).unwrap();
        assert!((value - (12.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sample_errors_wrap_heading() {
        let sample = TrackingSample {
            stamp: Stamp::ZERO,
            estimate: Pose2D::new(3.0, 4.0, 3.1),
            truth: Pose2D::new(0.0, 0.0, -3.1),
        };
        assert!((sample.position_error() - 5.0).abs() < 1e-12);
        assert!((sample.heading_error() - (2.0 * std::f64::consts::PI - 6.2)).abs() < 1e-9);
    }
}

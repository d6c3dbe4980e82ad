// horizon_sim/src/simulation/producers/mod.rs

//! Simulated sensors. Each one runs on its own thread, samples the ground truth at its
//! rate, and submits transactions to the smoother as the simulated clock reaches them.

pub mod landmarks;
pub mod odometry;
pub mod pose_fix;

use horizon_core::prelude::{Stamp, Transaction, TransactionSender};
use nalgebra::DMatrix;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

use crate::simulation::config::SensorConfig;
use crate::simulation::core::clock::SimClock;
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::core::trajectory::Trajectory;
use crate::simulation::error::SimError;

pub use landmarks::LandmarkProducer;
pub use odometry::OdometryProducer;
pub use pose_fix::PoseFixProducer;

/// A source of transactions sampled on a fixed-rate tick.
pub trait Producer: Send {
    fn name(&self) -> &str;

    /// Ticks per simulated second.
    fn rate(&self) -> f64;

    /// Simulated delay between taking a measurement and delivering it.
    fn latency(&self) -> f64 {
        0.0
    }

    /// The measurement for tick `index`, taken at simulated time `time`, if any.
    fn measure(&mut self, index: u64, time: f64) -> Result<Option<Transaction>, SimError>;
}

/// Builds the producer described by `config`.
pub fn from_config(
    config: &SensorConfig,
    device: Uuid,
    trajectory: Trajectory,
    rng: &SimulationRng,
) -> Result<Box<dyn Producer>, SimError> {
    let stream = rng.stream(config.name());
    Ok(match config {
        SensorConfig::Odometry(c) => Box::new(OdometryProducer::new(c.clone(), device, trajectory, stream)?),
        SensorConfig::PoseFix(c) => Box::new(PoseFixProducer::new(c.clone(), device, trajectory, stream)?),
        SensorConfig::Landmarks(c) => Box::new(LandmarkProducer::new(c.clone(), trajectory, stream)?),
    })
}

/// What a producer thread did before it finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub name: String,
    pub submitted: usize,
}

/// Runs `producer` on its own thread until `duration` simulated seconds have passed and
/// every delayed measurement has been delivered.
pub fn spawn(
    mut producer: Box<dyn Producer>,
    sender: TransactionSender,
    clock: SimClock,
    duration: f64,
) -> Result<JoinHandle<Result<ProducerReport, SimError>>, SimError> {
    let name = producer.name().to_string();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let report = run(producer.as_mut(), &sender, &clock, duration)?;
            info!("Producer '{}' finished after {} transaction(s).", report.name, report.submitted);
            Ok(report)
        })
        .map_err(|source| SimError::Spawn { name, source })
}

fn run(
    producer: &mut dyn Producer,
    sender: &TransactionSender,
    clock: &SimClock,
    duration: f64,
) -> Result<ProducerReport, SimError> {
    let period = 1.0 / producer.rate();
    let latency = producer.latency();
    let mut in_flight: VecDeque<(f64, Transaction)> = VecDeque::new();
    let mut report = ProducerReport {
        name: producer.name().to_string(),
        submitted: 0,
    };

    let mut index = 0u64;
    loop {
        let time = index as f64 * period;
        if time > duration {
            break;
        }
        clock.sleep_until(time);
        if let Some(transaction) = producer.measure(index, time)? {
            in_flight.push_back((time + latency, transaction));
        }
        while in_flight.front().is_some_and(|(due, _)| *due <= time) {
            if let Some((_, transaction)) = in_flight.pop_front() {
                deliver(sender, &mut report, transaction)?;
            }
        }
        index += 1;
    }

    while let Some((due, transaction)) = in_flight.pop_front() {
        clock.sleep_until(due);
        deliver(sender, &mut report, transaction)?;
    }
    Ok(report)
}

fn deliver(sender: &TransactionSender, report: &mut ProducerReport, transaction: Transaction) -> Result<(), SimError> {
    debug!(producer = %report.name, stamp = %transaction.stamp(), "submitting");
    sender.submit(&report.name, transaction)?;
    report.submitted += 1;
    Ok(())
}

// =========================================================================
// == Shared Helpers ==
// =========================================================================

pub(crate) fn stamp_at(time: f64) -> Stamp {
    Stamp::from_secs_f64(time)
}

pub(crate) fn normal(name: &str, stddev: f64) -> Result<Normal<f64>, SimError> {
    Normal::new(0.0, stddev)
        .map_err(|e| SimError::InvalidScenario(format!("sensor '{}': bad noise model: {}", name, e)))
}

pub(crate) fn isotropic(size: usize, stddev: f64) -> DMatrix<f64> {
    DMatrix::identity(size, size) * (stddev * stddev)
}

pub(crate) fn noisy(value: f64, noise: &Normal<f64>, rng: &mut ChaCha8Rng) -> f64 {
    value + noise.sample(rng)
}

// horizon_sim/src/simulation/producers/landmarks.rs

use horizon_core::prelude::{Constraint, Transaction, Variable};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use super::{isotropic, noisy, normal, stamp_at, Producer};
use crate::simulation::config::LandmarkConfig;
use crate::simulation::core::trajectory::Trajectory;
use crate::simulation::error::SimError;

/// Sightings of surveyed landmarks. Every landmark within range of the robot yields a
/// noisy absolute fix on its position. Landmarks are unstamped, so the window never
/// retires them.
pub struct LandmarkProducer {
    config: LandmarkConfig,
    trajectory: Trajectory,
    rng: ChaCha8Rng,
    noise: Normal<f64>,
}

impl LandmarkProducer {
    pub fn new(config: LandmarkConfig, trajectory: Trajectory, rng: ChaCha8Rng) -> Result<Self, SimError> {
        let noise = normal(&config.name, config.noise_stddev)?;
        Ok(Self {
            config,
            trajectory,
            rng,
            noise,
        })
    }

    /// Indices of the landmarks within range at `time`.
    pub fn visible(&self, time: f64) -> Vec<usize> {
        let pose = self.trajectory.pose_at(time);
        self.config
            .positions
            .iter()
            .enumerate()
            .filter(|(_, p)| (p[0] - pose.x).hypot(p[1] - pose.y) <= self.config.range)
            .map(|(id, _)| id)
            .collect()
    }
}

impl Producer for LandmarkProducer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn rate(&self) -> f64 {
        self.config.rate
    }

    fn measure(&mut self, _index: u64, time: f64) -> Result<Option<Transaction>, SimError> {
        let visible = self.visible(time);
        if visible.is_empty() {
            return Ok(None);
        }

        let covariance = isotropic(3, self.config.noise_stddev);
        let mut transaction = Transaction::new(stamp_at(time));
        for id in visible {
            let truth = self.config.positions[id];
            let measured: Vec<f64> = truth.iter().map(|v| noisy(*v, &self.noise, &mut self.rng)).collect();
            let landmark = Variable::point_3d_landmark(id as u64);
            let sighting = Constraint::absolute(&self.config.name, &landmark, measured.clone(), &covariance)?;
            transaction
                .add_variable(landmark.with_data(measured)?)
                .add_constraint(sighting);
        }
        Ok(Some(transaction))
    }
}

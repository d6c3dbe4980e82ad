// horizon_sim/src/simulation/producers/pose_fix.rs

use horizon_core::prelude::{Constraint, Loss, Transaction, Variable};
use horizon_core::variables::wrap_angle;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use uuid::Uuid;

use super::{isotropic, noisy, normal, stamp_at, Producer};
use crate::simulation::config::PoseFixConfig;
use crate::simulation::core::trajectory::Trajectory;
use crate::simulation::error::SimError;

/// An absolute position and heading fix (GPS plus compass), optionally delayed and
/// optionally robustified with a Huber loss on the position.
pub struct PoseFixProducer {
    config: PoseFixConfig,
    device: Uuid,
    trajectory: Trajectory,
    rng: ChaCha8Rng,
    position_noise: Normal<f64>,
    heading_noise: Normal<f64>,
}

impl PoseFixProducer {
    pub fn new(config: PoseFixConfig, device: Uuid, trajectory: Trajectory, rng: ChaCha8Rng) -> Result<Self, SimError> {
        let position_noise = normal(&config.name, config.noise_stddev[0])?;
        let heading_noise = normal(&config.name, config.noise_stddev[1])?;
        Ok(Self {
            config,
            device,
            trajectory,
            rng,
            position_noise,
            heading_noise,
        })
    }
}

impl Producer for PoseFixProducer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn rate(&self) -> f64 {
        self.config.rate
    }

    fn latency(&self) -> f64 {
        self.config.latency
    }

    fn measure(&mut self, _index: u64, time: f64) -> Result<Option<Transaction>, SimError> {
        let truth = self.trajectory.pose_at(time);
        let x = noisy(truth.x, &self.position_noise, &mut self.rng);
        let y = noisy(truth.y, &self.position_noise, &mut self.rng);
        let yaw = wrap_angle(noisy(truth.yaw, &self.heading_noise, &mut self.rng));

        let stamp = stamp_at(time);
        let position = Variable::position_2d(stamp, self.device).with_data(vec![x, y])?;
        let heading = Variable::orientation_2d(stamp, self.device).with_data(vec![yaw])?;

        let mut position_fix = Constraint::absolute(
            &self.config.name,
            &position,
            vec![x, y],
            &isotropic(2, self.config.noise_stddev[0]),
        )?;
        if let Some(a) = self.config.huber_scale {
            position_fix = position_fix.with_loss(Loss::Huber { a })?;
        }
        let heading_fix = Constraint::absolute(
            &self.config.name,
            &heading,
            vec![yaw],
            &isotropic(1, self.config.noise_stddev[1]),
        )?;

        let mut transaction = Transaction::new(stamp);
        transaction
            .add_variable(position)
            .add_variable(heading)
            .add_constraint(position_fix)
            .add_constraint(heading_fix);
        Ok(Some(transaction))
    }
}

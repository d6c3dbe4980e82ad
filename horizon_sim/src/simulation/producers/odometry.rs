// horizon_sim/src/simulation/producers/odometry.rs

use horizon_core::prelude::{Constraint, Transaction, Variable};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use uuid::Uuid;

use super::{isotropic, noisy, normal, stamp_at, Producer};
use crate::simulation::config::OdometryConfig;
use crate::simulation::core::trajectory::{Pose2D, Trajectory};
use crate::simulation::error::SimError;

/// Standard deviation of the prior pinning the first pose to the known start.
const START_PRIOR_STDDEV: f64 = 0.01;

/// Wheel odometry: noisy body-frame increments between consecutive ticks, integrated into
/// a dead-reckoned estimate that seeds each new pose.
pub struct OdometryProducer {
    config: OdometryConfig,
    device: Uuid,
    trajectory: Trajectory,
    rng: ChaCha8Rng,
    translation_noise: Normal<f64>,
    rotation_noise: Normal<f64>,
    /// Previous tick time and the dead-reckoned pose there.
    previous: Option<(f64, Pose2D)>,
}

impl OdometryProducer {
    pub fn new(config: OdometryConfig, device: Uuid, trajectory: Trajectory, rng: ChaCha8Rng) -> Result<Self, SimError> {
        let translation_noise = normal(&config.name, config.noise_stddev[0])?;
        let rotation_noise = normal(&config.name, config.noise_stddev[1])?;
        Ok(Self {
            config,
            device,
            trajectory,
            rng,
            translation_noise,
            rotation_noise,
            previous: None,
        })
    }

    fn pose_variables(&self, time: f64, pose: &Pose2D) -> Result<(Variable, Variable), SimError> {
        let stamp = stamp_at(time);
        let position = Variable::position_2d(stamp, self.device).with_data(vec![pose.x, pose.y])?;
        let heading = Variable::orientation_2d(stamp, self.device).with_data(vec![pose.yaw])?;
        Ok((position, heading))
    }

    fn start(&mut self, time: f64) -> Result<Transaction, SimError> {
        let start = self.trajectory.pose_at(time);
        let (position, heading) = self.pose_variables(time, &start)?;
        let covariance = isotropic(2, START_PRIOR_STDDEV);
        let mut transaction = Transaction::new(stamp_at(time));
        transaction
            .add_constraint(Constraint::absolute(
                &self.config.name,
                &position,
                vec![start.x, start.y],
                &covariance,
            )?)
            .add_constraint(Constraint::absolute(
                &self.config.name,
                &heading,
                vec![start.yaw],
                &isotropic(1, START_PRIOR_STDDEV),
            )?)
            .add_variable(position)
            .add_variable(heading);
        self.previous = Some((time, start));
        Ok(transaction)
    }
}

impl Producer for OdometryProducer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn rate(&self) -> f64 {
        self.config.rate
    }

    fn measure(&mut self, _index: u64, time: f64) -> Result<Option<Transaction>, SimError> {
        let Some((previous_time, estimate)) = self.previous else {
            return self.start(time).map(Some);
        };

        let truth = self.trajectory.between_times(previous_time, time);
        let measured = [
            noisy(truth[0], &self.translation_noise, &mut self.rng),
            noisy(truth[1], &self.translation_noise, &mut self.rng),
            noisy(truth[2], &self.rotation_noise, &mut self.rng),
        ];
        let next = estimate.compose(measured);

        let (previous_position, previous_heading) = self.pose_variables(previous_time, &estimate)?;
        let (position, heading) = self.pose_variables(time, &next)?;
        let translation_stddev = self.config.noise_stddev[0];
        let rotation_stddev = self.config.noise_stddev[1];

        let mut transaction = Transaction::new(stamp_at(time));
        transaction
            .add_constraint(Constraint::relative(
                &self.config.name,
                &previous_position,
                &position,
                vec![next.x - estimate.x, next.y - estimate.y],
                &isotropic(2, translation_stddev),
            )?)
            .add_constraint(Constraint::relative(
                &self.config.name,
                &previous_heading,
                &heading,
                vec![measured[2]],
                &isotropic(1, rotation_stddev),
            )?)
            .add_variable(previous_position)
            .add_variable(previous_heading)
            .add_variable(position)
            .add_variable(heading);

        self.previous = Some((time, next));
        Ok(Some(transaction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::core::prng::SimulationRng;
    use approx::assert_abs_diff_eq;
    use horizon_core::identity;
    use horizon_core::prelude::{ConstraintKind, Stamp};

    fn producer(noise: [f64; 2]) -> OdometryProducer {
        let config = OdometryConfig {
            name: "wheel_odometry".to_string(),
            rate: 10.0,
            noise_stddev: noise,
        };
        let trajectory = Trajectory::new(Pose2D::default(), 1.0, 0.2);
        OdometryProducer::new(config, identity::from_name("rover"), trajectory, SimulationRng::new(1).stream("odo"))
            .unwrap()
    }

    #[test]
    fn test_first_tick_pins_the_start() {
        let mut odometry = producer([0.01, 0.001]);
        let first = odometry.measure(0, 0.0).unwrap().unwrap();
        assert_eq!(first.added_variables().count(), 2);
        let priors: Vec<_> = first.added_constraints().collect();
        assert_eq!(priors.len(), 2);
        assert!(priors.iter().all(|c| matches!(c.kind(), ConstraintKind::Absolute)));
        assert_eq!(first.involved_stamps().iter().copied().collect::<Vec<_>>(), vec![Stamp::ZERO]);
    }

    #[test]
    fn test_increments_link_consecutive_poses() {
        let mut odometry = producer([1e-9, 1e-9]);
        odometry.measure(0, 0.0).unwrap();
        let second = odometry.measure(1, 0.1).unwrap().unwrap();
        assert_eq!(second.added_variables().count(), 4);
        assert_eq!(second.min_stamp(), Stamp::ZERO);
        assert_eq!(second.max_stamp(), Stamp::from_secs_f64(0.1));

        let device = identity::from_name("rover");
        let position = Variable::position_2d(Stamp::from_secs_f64(0.1), device).uuid();
        let seeded = second.added_variables().find(|v| v.uuid() == position).unwrap();
        let truth = Trajectory::new(Pose2D::default(), 1.0, 0.2).pose_at(0.1);
        assert_abs_diff_eq!(seeded.data()[0], truth.x, epsilon = 1e-6);
        assert_abs_diff_eq!(seeded.data()[1], truth.y, epsilon = 1e-6);
        assert!(second
            .added_constraints()
            .all(|c| matches!(c.kind(), ConstraintKind::Relative)));
    }
}

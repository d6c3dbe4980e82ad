// horizon_sim/src/simulation/core/trajectory.rs

use horizon_core::variables::wrap_angle;
use serde::Serialize;

use crate::simulation::config::RobotConfig;

/// A planar pose `(x, y, yaw)` in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw: wrap_angle(yaw) }
    }

    /// Expresses `other` in the body frame of `self`: `[forward, left, yaw]`.
    pub fn between(&self, other: &Pose2D) -> [f64; 3] {
        let (sin, cos) = self.yaw.sin_cos();
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        [cos * dx + sin * dy, -sin * dx + cos * dy, wrap_angle(other.yaw - self.yaw)]
    }

    /// Moves by a body-frame increment `[forward, left, yaw]`.
    pub fn compose(&self, increment: [f64; 3]) -> Pose2D {
        let (sin, cos) = self.yaw.sin_cos();
        Pose2D::new(
            self.x + cos * increment[0] - sin * increment[1],
            self.y + sin * increment[0] + cos * increment[1],
            self.yaw + increment[2],
        )
    }
}

/// Ground truth for a unicycle at constant speed and yaw rate.
#[derive(Debug, Clone, Copy)]
pub struct Trajectory {
    start: Pose2D,
    speed: f64,
    yaw_rate: f64,
}

impl Trajectory {
    pub fn new(start: Pose2D, speed: f64, yaw_rate: f64) -> Self {
        Self { start, speed, yaw_rate }
    }

    pub fn from_config(robot: &RobotConfig) -> Self {
        let [x, y, yaw] = robot.starting_pose;
        Self::new(Pose2D::new(x, y, yaw), robot.speed, robot.yaw_rate)
    }

    pub fn start(&self) -> Pose2D {
        self.start
    }

    /// The exact pose at `time` seconds after the start.
    pub fn pose_at(&self, time: f64) -> Pose2D {
        let yaw0 = self.start.yaw;
        if self.yaw_rate.abs() < 1e-9 {
            return Pose2D::new(
                self.start.x + self.speed * time * yaw0.cos(),
                self.start.y + self.speed * time * yaw0.sin(),
                yaw0,
            );
        }
        let yaw = yaw0 + self.yaw_rate * time;
        let radius = self.speed / self.yaw_rate;
        Pose2D::new(
            self.start.x + radius * (yaw.sin() - yaw0.sin()),
            self.start.y - radius * (yaw.cos() - yaw0.cos()),
            yaw,
        )
    }

    /// The true body-frame increment `[forward, left, yaw]` from `from` to `to`.
    pub fn between_times(&self, from: f64, to: f64) -> [f64; 3] {
        self.pose_at(from).between(&self.pose_at(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_straight_line() {
        let trajectory = Trajectory::new(Pose2D::new(1.0, 2.0, PI / 2.0), 2.0, 0.0);
        let pose = trajectory.pose_at(3.0);
        assert_abs_diff_eq!(pose.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y, 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.yaw, PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_closes_after_one_period() {
        let trajectory = Trajectory::new(Pose2D::default(), 1.0, 0.5);
        let period = 2.0 * PI / 0.5;
        let quarter = trajectory.pose_at(period / 4.0);
        // Radius 2, turning left from the origin.
        assert_abs_diff_eq!(quarter.x, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(quarter.y, 2.0, epsilon = 1e-9);
        let full = trajectory.pose_at(period);
        assert_abs_diff_eq!(full.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(full.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(full.yaw, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_between_and_compose_invert() {
        let trajectory = Trajectory::new(Pose2D::new(-3.0, 1.0, 2.5), 1.5, -0.3);
        let a = trajectory.pose_at(4.0);
        let b = trajectory.pose_at(4.7);
        let increment = a.between(&b);
        let rebuilt = a.compose(increment);
        assert_abs_diff_eq!(rebuilt.x, b.x, epsilon = 1e-12);
        assert_abs_diff_eq!(rebuilt.y, b.y, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(rebuilt.yaw - b.yaw), 0.0, epsilon = 1e-12);
    }
}

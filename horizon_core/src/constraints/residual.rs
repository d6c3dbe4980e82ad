// horizon_core/src/constraints/residual.rs

//! Unwhitened residual functions, one per constraint kind.
//!
//! Each function receives the current values of the referenced variables in the order
//! the constraint lists them, and returns a vector in the measurement's tangent space.

use nalgebra::{DVector, UnitQuaternion, Vector3};

use crate::variables::manifold::quaternion_from_slice;
use crate::variables::{wrap_angle, Manifold};

/// `x ⊟ mean`.
pub fn absolute(manifold: Manifold, x: &[f64], mean: &[f64]) -> DVector<f64> {
    DVector::from_vec(manifold.minus(x, mean))
}

/// `(x2 ⊟ x1) ⊟ delta`, where `delta` is the measured tangent step from `x1` to `x2`.
pub fn relative(manifold: Manifold, x1: &[f64], x2: &[f64], delta: &[f64]) -> DVector<f64> {
    match manifold {
        Manifold::Euclidean => DVector::from_iterator(
            delta.len(),
            x1.iter().zip(x2).zip(delta).map(|((a, b), d)| b - a - d),
        ),
        Manifold::Angle => DVector::from_element(1, wrap_angle(wrap_angle(x2[0] - x1[0]) - delta[0])),
        Manifold::Quaternion => {
            let q1 = quaternion_from_slice(x1);
            let q2 = quaternion_from_slice(x2);
            let measured = UnitQuaternion::from_scaled_axis(Vector3::new(delta[0], delta[1], delta[2]));
            let error = (measured.inverse() * q1.inverse() * q2).scaled_axis();
            DVector::from_column_slice(error.as_slice())
        }
    }
}

/// Position and orientation against a 7-value mean `(x, y, z, qw, qx, qy, qz)`.
pub fn absolute_pose_3d(position: &[f64], orientation: &[f64], mean: &[f64]) -> DVector<f64> {
    let rotation = Manifold::Quaternion.minus(orientation, &mean[3..7]);
    let mut residual = DVector::zeros(6);
    for i in 0..3 {
        residual[i] = position[i] - mean[i];
        residual[3 + i] = rotation[i];
    }
    residual
}

/// A constant-velocity motion model between two states `dt` seconds apart:
/// `p_j = p_i + v_i·dt` and `v_j = v_i`, compared against `mean` (usually zero).
pub fn constant_velocity_2d(
    position_i: &[f64],
    velocity_i: &[f64],
    position_j: &[f64],
    velocity_j: &[f64],
    dt: f64,
    mean: &[f64],
) -> DVector<f64> {
    DVector::from_vec(vec![
        position_j[0] - position_i[0] - velocity_i[0] * dt - mean[0],
        position_j[1] - position_i[1] - velocity_i[1] * dt - mean[1],
        velocity_j[0] - velocity_i[0] - mean[2],
        velocity_j[1] - velocity_i[1] - mean[3],
    ])
}

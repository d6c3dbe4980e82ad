// horizon_core/src/variables/manifold.rs

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};

/// Wraps an angle into the half-open interval `(-π, π]`.
pub fn wrap_angle<T: Float + FloatConst>(angle: T) -> T {
    let two_pi = T::PI() + T::PI();
    let wrapped = angle - two_pi * ((angle + T::PI()) / two_pi).floor();
    if wrapped <= -T::PI() {
        wrapped + two_pi
    } else {
        wrapped
    }
}

/// The local parameterization of a variable: how a tangent-space delta is applied to the
/// stored representation, and its inverse.
///
/// * `plus(x, δ)` returns `x ⊞ δ`
/// * `minus(x, y)` returns the `δ` with `y ⊞ δ = x`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Manifold {
    /// Plain vector addition. Stored size equals tangent size.
    Euclidean,
    /// A single heading angle, kept in `(-π, π]`.
    Angle,
    /// A unit quaternion stored as `(w, x, y, z)` with a 3-dimensional tangent space.
    /// Deltas are right-multiplied rotation vectors: `q ⊞ δ = q ⊗ exp(δ)`.
    Quaternion,
}

impl Manifold {
    /// Size of the tangent space for a stored block of `dimension` values.
    pub fn local_size(&self, dimension: usize) -> usize {
        match self {
            Manifold::Quaternion => 3,
            _ => dimension,
        }
    }

    pub fn plus(&self, x: &[f64], delta: &[f64]) -> Vec<f64> {
        match self {
            Manifold::Euclidean => x.iter().zip(delta).map(|(a, b)| a + b).collect(),
            Manifold::Angle => vec![wrap_angle(x[0] + delta[0])],
            Manifold::Quaternion => {
                let q = quaternion_from_slice(x);
                let step = UnitQuaternion::from_scaled_axis(Vector3::new(delta[0], delta[1], delta[2]));
                quaternion_to_vec(&(q * step))
            }
        }
    }

    pub fn minus(&self, x: &[f64], y: &[f64]) -> Vec<f64> {
        match self {
            Manifold::Euclidean => x.iter().zip(y).map(|(a, b)| a - b).collect(),
            Manifold::Angle => vec![wrap_angle(x[0] - y[0])],
            Manifold::Quaternion => {
                let qx = quaternion_from_slice(x);
                let qy = quaternion_from_slice(y);
                let delta = (qy.inverse() * qx).scaled_axis();
                vec![delta.x, delta.y, delta.z]
            }
        }
    }
}

/// Reads a `(w, x, y, z)` slice as a unit quaternion, renormalizing it.
pub fn quaternion_from_slice(values: &[f64]) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(values[0], values[1], values[2], values[3]))
}

/// True when a `(w, x, y, z)` slice cannot be normalized into a rotation.
pub fn is_degenerate_quaternion(values: &[f64]) -> bool {
    values.iter().map(|v| v * v).sum::<f64>() == 0.0
}

/// Writes a unit quaternion as `(w, x, y, z)`.
pub fn quaternion_to_vec(q: &UnitQuaternion<f64>) -> Vec<f64> {
    vec![q.w, q.i, q.j, q.k]
}

// horizon_core/src/loss.rs

use serde::{Deserialize, Serialize};

/// Smallest first derivative a loss will report, so a fully rejected residual still
/// leaves the normal equations well formed.
const MIN_RHO_PRIME: f64 = f64::EPSILON;

/// A robust loss `ρ(s)` applied to the squared whitened residual norm `s = ‖r‖²`.
///
/// Every loss satisfies `ρ(0) = 0` and `ρ'(0) = 1`, so a residual that fits perfectly is
/// treated exactly like ordinary least squares; only large residuals are attenuated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Loss {
    /// `ρ(s) = s`: ordinary least squares.
    Trivial,
    /// Quadratic inside `a`, linear outside.
    Huber { a: f64 },
    /// `ρ(s) = a² log(1 + s / a²)`.
    Cauchy { a: f64 },
    /// Redescending; residuals beyond `a` have no influence at all.
    Tukey { a: f64 },
}

impl Default for Loss {
    fn default() -> Self {
        Loss::Trivial
    }
}

impl Loss {
    /// Evaluates `[ρ(s), ρ'(s), ρ''(s)]`.
    pub fn evaluate(&self, s: f64) -> [f64; 3] {
        match *self {
            Loss::Trivial => [s, 1.0, 0.0],
            Loss::Huber { a } => {
                let b = a * a;
                if s > b {
                    let r = s.sqrt();
                    let rho1 = (a / r).max(MIN_RHO_PRIME);
                    [2.0 * a * r - b, rho1, -rho1 / (2.0 * s)]
                } else {
                    [s, 1.0, 0.0]
                }
            }
            Loss::Cauchy { a } => {
                let b = a * a;
                let c = 1.0 / b;
                let sum = 1.0 + s * c;
                let inv = 1.0 / sum;
                [b * sum.ln(), inv.max(MIN_RHO_PRIME), -c * inv * inv]
            }
            Loss::Tukey { a } => {
                let b = a * a;
                if s <= b {
                    let value = 1.0 - s / b;
                    [
                        b / 3.0 * (1.0 - value * value * value),
                        (value * value).max(MIN_RHO_PRIME),
                        -2.0 / b * value,
                    ]
                } else {
                    [b / 3.0, MIN_RHO_PRIME, 0.0]
                }
            }
        }
    }

    /// Scale parameters must be positive and finite.
    pub fn is_valid(&self) -> bool {
        match *self {
            Loss::Trivial => true,
            Loss::Huber { a } | Loss::Cauchy { a } | Loss::Tukey { a } => a.is_finite() && a > 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [Loss; 4] = [
        Loss::Trivial,
        Loss::Huber { a: 1.0 },
        Loss::Cauchy { a: 1.0 },
        Loss::Tukey { a: 2.0 },
    ];

    #[test]
    fn test_perfect_fit_is_unweighted() {
        for loss in ALL {
            let rho = loss.evaluate(0.0);
            assert_abs_diff_eq!(rho[0], 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(rho[1], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_large_residuals_are_attenuated() {
        for loss in ALL.iter().skip(1) {
            let rho = loss.evaluate(100.0);
            assert!(rho[0] < 100.0, "{:?} did not attenuate", loss);
            assert!(rho[1] < 1.0);
        }
    }

    #[test]
    fn test_huber_is_continuous_at_threshold() {
        let loss = Loss::Huber { a: 2.0 };
        let inside = loss.evaluate(4.0 - 1e-9)[0];
        let outside = loss.evaluate(4.0 + 1e-9)[0];
        assert_abs_diff_eq!(inside, outside, epsilon = 1e-6);
    }

    #[test]
    fn test_tukey_saturates() {
        let loss = Loss::Tukey { a: 1.0 };
        assert_abs_diff_eq!(loss.evaluate(5.0)[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(loss.evaluate(1.0)[0], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_scale_is_detected() {
        assert!(!Loss::Cauchy { a: 0.0 }.is_valid());
        assert!(!Loss::Huber { a: f64::NAN }.is_valid());
        assert!(Loss::Trivial.is_valid());
    }
}

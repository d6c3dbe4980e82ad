// horizon_core/src/params.rs

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::solver::SolverOptions;

/// Returns `value` if it is strictly positive and finite, otherwise logs and returns `default`.
pub(crate) fn positive_or_default(name: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!("Parameter '{}' must be positive, got {}. Using default {}.", name, value, default);
        default
    }
}

pub(crate) fn positive_or_default_count<T>(name: &str, value: T, default: T) -> T
where
    T: PartialOrd + Default + Copy + std::fmt::Display,
{
    if value > T::default() {
        value
    } else {
        warn!("Parameter '{}' must be positive, got {}. Using default {}.", name, value, default);
        default
    }
}

/// How much history the smoother keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmootherMode {
    /// Retire everything older than `lag_duration` behind the newest stamp.
    #[default]
    FixedLag,
    /// Keep the whole history and re-optimize all of it every cycle. Nothing is
    /// marginalized and no transaction is too old to accept.
    Batch,
}

/// Configuration of a fixed-lag smoother. All durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherParams {
    pub mode: SmootherMode,
    /// Span of history kept in the window, measured back from the newest stamp.
    /// Ignored in batch mode.
    pub lag_duration: f64,
    /// Minimum time between two optimization cycles in background mode.
    pub optimization_period: f64,
    /// How far behind the window start a transaction may be and still be accepted.
    pub transaction_grace: f64,
    /// Wall-clock limit on one optimization; slower results are discarded.
    pub optimization_budget: f64,
    /// Consecutive failed optimizations before the smoother enters `Degraded`.
    pub max_consecutive_failures: u32,
    pub solver: SolverOptions,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            mode: SmootherMode::FixedLag,
            lag_duration: 5.0,
            optimization_period: 0.1,
            transaction_grace: 0.1,
            optimization_budget: 1.0,
            max_consecutive_failures: 3,
            solver: SolverOptions::default(),
        }
    }
}

impl SmootherParams {
    /// Returns a copy in which every non-positive value is replaced by its default.
    pub fn validated(&self) -> Self {
        let defaults = Self::default();
        Self {
            mode: self.mode,
            lag_duration: positive_or_default("lag_duration", self.lag_duration, defaults.lag_duration),
            optimization_period: positive_or_default(
                "optimization_period",
                self.optimization_period,
                defaults.optimization_period,
            ),
            transaction_grace: positive_or_default(
                "transaction_grace",
                self.transaction_grace,
                defaults.transaction_grace,
            ),
            optimization_budget: positive_or_default(
                "optimization_budget",
                self.optimization_budget,
                defaults.optimization_budget,
            ),
            max_consecutive_failures: positive_or_default_count(
                "max_consecutive_failures",
                self.max_consecutive_failures,
                defaults.max_consecutive_failures,
            ),
            solver: self.solver.validated(),
        }
    }
}

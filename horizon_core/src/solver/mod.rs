// horizon_core/src/solver/mod.rs

use dyn_clone::DynClone;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::error::SolverError;
use crate::params::{positive_or_default, positive_or_default_count};

pub mod levenberg_marquardt;
pub mod problem;

pub use levenberg_marquardt::LevenbergMarquardt;
pub use problem::{NormalEquations, ParameterBlock, Problem};

/// Stopping criteria and damping for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Wall-clock limit in seconds.
    pub max_time: f64,
    /// Relative cost decrease below which the run is considered converged.
    pub function_tolerance: f64,
    /// Relative step size below which the run is considered converged.
    pub parameter_tolerance: f64,
    pub initial_lambda: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_time: 1.0,
            function_tolerance: 1e-9,
            parameter_tolerance: 1e-10,
            initial_lambda: 1e-4,
        }
    }
}

impl SolverOptions {
    /// Returns a copy where every non-positive field is replaced by its default.
    pub fn validated(&self) -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: positive_or_default_count(
                "solver.max_iterations",
                self.max_iterations,
                defaults.max_iterations,
            ),
            max_time: positive_or_default("solver.max_time", self.max_time, defaults.max_time),
            function_tolerance: positive_or_default(
                "solver.function_tolerance",
                self.function_tolerance,
                defaults.function_tolerance,
            ),
            parameter_tolerance: positive_or_default(
                "solver.parameter_tolerance",
                self.parameter_tolerance,
                defaults.parameter_tolerance,
            ),
            initial_lambda: positive_or_default("solver.initial_lambda", self.initial_lambda, defaults.initial_lambda),
        }
    }
}

/// Why a solver run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// A cost, gradient or step tolerance was met.
    Converged,
    /// No damped step reduces the cost any further.
    NoFurtherProgress,
    MaxIterations,
    MaxTime,
}

impl TerminationReason {
    /// Whether the values at termination can be trusted as a solution.
    pub fn is_usable(&self) -> bool {
        matches!(self, TerminationReason::Converged | TerminationReason::NoFurtherProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSummary {
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub termination: TerminationReason,
    pub elapsed: Duration,
}

// --- SOLVER TRAIT ---
// The nonlinear least-squares backend a graph is optimized with.
pub trait Solver: DynClone + Debug + Send + Sync {
    /// Minimizes the problem's cost, leaving the optimized values in `problem`.
    fn solve(&self, problem: &mut Problem<'_>, options: &SolverOptions) -> Result<SolverSummary, SolverError>;

    /// Blocks of the inverse Gauss-Newton Hessian at the problem's current values, one per
    /// requested `(block, block)` pair, each of size `local(a) x local(b)`.
    fn covariance(&self, problem: &Problem<'_>, pairs: &[(usize, usize)]) -> Result<Vec<DMatrix<f64>>, SolverError>;
}

dyn_clone::clone_trait_object!(Solver);

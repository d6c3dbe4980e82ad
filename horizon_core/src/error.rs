// horizon_core/src/error.rs

use thiserror::Error;
use uuid::Uuid;

/// Malformed input, rejected before anything is mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{type_name} expects {expected} values, got {actual}")]
    InvalidDimension {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{type_name}: {what} has size {actual}, expected {expected}")]
    DimensionMismatch {
        type_name: &'static str,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{type_name}: row {row} of the square root information matrix is all zeros")]
    DegenerateInformation { type_name: &'static str, row: usize },

    #[error("{type_name}: {what} contains a non-finite value")]
    NonFinite {
        type_name: &'static str,
        what: &'static str,
    },

    #[error("{type_name}: square root information entry ({row}, {col}) is below the diagonal")]
    NotUpperTriangular {
        type_name: &'static str,
        row: usize,
        col: usize,
    },

    #[error("{type_name}: robust loss scale must be positive and finite")]
    InvalidLoss { type_name: &'static str },

    #[error("{type_name}: quaternion has zero norm")]
    ZeroNorm { type_name: &'static str },

    #[error("{type_name} expects {expected} variables, got {actual}")]
    VariableCount {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{type_name}: variable {index} must be a {expected}, got a {actual}")]
    WrongVariableKind {
        type_name: &'static str,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{type_name}: stored uuid {stored} does not match the uuid derived from its key fields")]
    UuidMismatch { type_name: &'static str, stored: Uuid },

    #[error("covariance matrix is not positive definite")]
    NotPositiveDefinite,
}

/// A mutation that would break referential integrity. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("constraint {constraint} references unknown variable {variable}")]
    UnknownVariable { constraint: Uuid, variable: Uuid },

    #[error("variable {variable} is still referenced by constraint {constraint}")]
    VariableInUse { variable: Uuid, constraint: Uuid },

    #[error("no variable or constraint with uuid {0}")]
    NotFound(Uuid),
}

/// Failures reported by a `Solver` implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("the information matrix is singular; covariance is undefined")]
    SingularHessian,

    #[error("the cost evaluated to a non-finite value")]
    NonFiniteCost,

    #[error("covariance requested for a parameter block that is not in the problem")]
    InvalidPair,

    #[error("{0}")]
    Other(String),
}

/// The error type of every fallible `Graph` operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("covariance requested before any successful optimization")]
    NotOptimized,

    #[error("checkpoint serialization failed: {0}")]
    Serialization(String),
}

/// Returned by `TransactionSender::submit` once the smoother is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("the smoother has shut down; transaction not accepted")]
    Closed,
}

impl GraphError {
    pub fn is_validation(&self) -> bool {
        matches!(self, GraphError::Validation(_))
    }

    pub fn is_consistency(&self) -> bool {
        matches!(self, GraphError::Consistency(_))
    }
}

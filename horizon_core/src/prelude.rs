// horizon_core/src/prelude.rs

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::constraints::{Constraint, ConstraintKind};
pub use crate::loss::Loss;
pub use crate::stamp::Stamp;
pub use crate::transaction::{Edit, Transaction};
pub use crate::variables::{Manifold, Variable, VariableKind, VariableType};

// --- Graph and Optimization ---
pub use crate::graph::{Graph, GraphCheckpoint};
pub use crate::solver::{LevenbergMarquardt, Solver, SolverOptions, SolverSummary, TerminationReason};

// --- Fixed-Lag Smoothing ---
pub use crate::params::{SmootherMode, SmootherParams};
pub use crate::smoother::{
    CycleEvent, CycleReport, Smoother, SmootherHandle, SmootherReader, SmootherState, SmootherStats,
    TransactionSender, WindowState,
};
pub use crate::synchronizer::Synchronizer;

// --- Errors ---
pub use crate::error::{ConsistencyError, GraphError, SolverError, SubmitError, ValidationError};

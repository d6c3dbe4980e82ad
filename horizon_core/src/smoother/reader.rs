// horizon_core/src/smoother/reader.rs

use nalgebra::DMatrix;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::window::WindowState;
use crate::constraints::Constraint;
use crate::error::GraphError;
use crate::graph::Graph;
use crate::stamp::Stamp;
use crate::synchronizer::Synchronizer;
use crate::variables::Variable;

/// Where a smoother is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmootherState {
    Idle,
    AwaitingTransaction,
    Validating,
    Applying,
    Optimizing,
    /// Too many consecutive optimization failures. Transactions are still applied but
    /// nothing is optimized or published until the smoother is reset.
    Degraded,
}

/// Cumulative counters since construction or the last `reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmootherStats {
    pub cycles: u64,
    pub transactions_applied: u64,
    pub transactions_dropped: u64,
    pub transactions_rejected: u64,
    pub optimizations: u64,
    pub optimization_failures: u64,
    pub variables_marginalized: u64,
    pub constraints_marginalized: u64,
}

/// State the smoother publishes for readers.
#[derive(Debug)]
pub(crate) struct Shared {
    pub snapshot: RwLock<Arc<Graph>>,
    pub window: RwLock<WindowState>,
    pub state: RwLock<SmootherState>,
    pub stats: RwLock<SmootherStats>,
}

impl Shared {
    pub fn new(snapshot: Graph, window: WindowState) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            window: RwLock::new(window),
            state: RwLock::new(SmootherState::Idle),
            stats: RwLock::new(SmootherStats::default()),
        }
    }

    pub fn set_state(&self, state: SmootherState) {
        *self.state.write() = state;
    }

    pub fn publish(&self, snapshot: Graph) {
        *self.snapshot.write() = Arc::new(snapshot);
    }
}

/// Read access to the last snapshot a smoother published. Never blocks on a cycle.
#[derive(Debug, Clone)]
pub struct SmootherReader {
    shared: Arc<Shared>,
}

impl SmootherReader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// The last published graph. Holding it does not delay the smoother.
    pub fn snapshot(&self) -> Arc<Graph> {
        self.shared.snapshot.read().clone()
    }

    pub fn get_variable(&self, uuid: &Uuid) -> Result<Variable, GraphError> {
        self.snapshot().get_variable(uuid).cloned()
    }

    pub fn get_constraint(&self, uuid: &Uuid) -> Result<Constraint, GraphError> {
        self.snapshot().get_constraint(uuid).cloned()
    }

    pub fn get_covariance(&self, pairs: &[(Uuid, Uuid)]) -> Result<Vec<DMatrix<f64>>, GraphError> {
        self.snapshot().get_covariance(pairs)
    }

    pub fn find_stable_stamp(&self, synchronizer: &Synchronizer) -> Option<Stamp> {
        synchronizer.find_latest_common_stamp(&self.snapshot())
    }

    pub fn window(&self) -> WindowState {
        *self.shared.window.read()
    }

    pub fn state(&self) -> SmootherState {
        *self.shared.state.read()
    }

    pub fn stats(&self) -> SmootherStats {
        self.shared.stats.read().clone()
    }
}

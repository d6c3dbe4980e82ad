// horizon_core/src/smoother/window.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::graph::Graph;
use crate::stamp::Stamp;
use crate::transaction::Transaction;

/// The span of history a smoother retains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    /// `None` for a batch window that never lets go of history.
    pub lag_duration: Option<f64>,
    /// `None` until the first transaction has been applied.
    pub oldest_retained_stamp: Option<Stamp>,
    pub newest_stamp: Option<Stamp>,
}

impl WindowState {
    pub fn new(lag_duration: f64) -> Self {
        Self {
            lag_duration: Some(lag_duration),
            oldest_retained_stamp: None,
            newest_stamp: None,
        }
    }

    /// A window whose start stays at [`Stamp::MIN`] once initialized.
    pub fn unbounded() -> Self {
        Self {
            lag_duration: None,
            oldest_retained_stamp: None,
            newest_stamp: None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.lag_duration.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.oldest_retained_stamp.is_some()
    }

    /// Stamps strictly older than this are too late to accept.
    pub fn acceptance_cutoff(&self, grace: f64) -> Option<Stamp> {
        self.oldest_retained_stamp.map(|oldest| oldest.offset_secs(-grace))
    }

    /// Moves the window forward to cover `stamp`. Neither bound ever moves back.
    pub fn advance(&mut self, stamp: Stamp) {
        let newest = self.newest_stamp.map_or(stamp, |n| n.max(stamp));
        self.newest_stamp = Some(newest);
        let start = self.lag_duration.map_or(Stamp::MIN, |lag| newest.offset_secs(-lag));
        self.oldest_retained_stamp = Some(self.oldest_retained_stamp.map_or(start, |o| o.max(start)));
    }
}

/// Builds the transaction that retires history older than `oldest`.
///
/// Stamped variables before `oldest` are candidates. A constraint is removed only when all
/// of its variables are candidates; a candidate is removed only when no surviving
/// constraint references it. Candidates held by a surviving constraint stay until a later
/// cycle.
pub fn marginalization(graph: &Graph, oldest: Stamp) -> Transaction {
    let candidates: BTreeSet<Uuid> = graph
        .variables()
        .filter(|v| v.stamp().is_some_and(|stamp| stamp < oldest))
        .map(|v| v.uuid())
        .collect();

    let mut transaction = Transaction::new(oldest);
    if candidates.is_empty() {
        return transaction;
    }

    let mut removed_constraints = BTreeSet::new();
    for constraint in graph.constraints() {
        if constraint.variables().iter().all(|uuid| candidates.contains(uuid)) {
            removed_constraints.insert(constraint.uuid());
            transaction.remove_constraint(constraint.uuid());
        }
    }

    for uuid in &candidates {
        let blocked = graph
            .connected_constraints(uuid)
            .map(|connected| connected.iter().any(|c| !removed_constraints.contains(&c.uuid())))
            .unwrap_or(true);
        if !blocked {
            transaction.remove_variable(*uuid);
        }
    }
    transaction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::identity;
    use crate::solver::LevenbergMarquardt;
    use crate::variables::Variable;
    use nalgebra::DMatrix;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn t(secs: f64) -> Stamp {
        Stamp::from_secs_f64(secs)
    }

    fn position(secs: f64) -> Variable {
        Variable::position_2d(t(secs), identity::from_name("robot"))
    }

    #[test]
    fn test_window_never_moves_back() {
        let mut window = WindowState::new(5.0);
        assert!(!window.is_initialized());
        window.advance(t(20.0));
        assert_eq!(window.oldest_retained_stamp, Some(t(15.0)));
        window.advance(t(12.0));
        assert_eq!(window.newest_stamp, Some(t(20.0)));
        assert_eq!(window.oldest_retained_stamp, Some(t(15.0)));
        window.advance(t(21.0));
        assert_eq!(window.oldest_retained_stamp, Some(t(16.0)));
        assert_eq!(window.acceptance_cutoff(0.5), Some(t(15.5)));
    }

    #[test]
    fn test_unbounded_window_keeps_everything() {
        let mut window = WindowState::unbounded();
        assert!(!window.is_bounded());
        window.advance(t(1000.0));
        assert_eq!(window.newest_stamp, Some(t(1000.0)));
        assert_eq!(window.oldest_retained_stamp, Some(Stamp::MIN));
        assert_eq!(window.acceptance_cutoff(0.1), Some(Stamp::MIN));

        let mut graph = Graph::new(Box::new(LevenbergMarquardt::new()));
        graph.add_variable(position(0.0)).unwrap();
        graph.add_variable(position(-50.0)).unwrap();
        assert!(marginalization(&graph, Stamp::MIN).is_empty());
    }

    #[test]
    fn test_random_graphs_marginalize_safely() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let mut graph = Graph::new(Box::new(LevenbergMarquardt::new()));
            let variables: Vec<Variable> = (0..12).map(|i| position(i as f64)).collect();
            for v in &variables {
                graph.add_variable(v.clone()).unwrap();
            }
            for _ in 0..10 {
                let a = &variables[rng.gen_range(0..variables.len())];
                let b = &variables[rng.gen_range(0..variables.len())];
                if a == b {
                    continue;
                }
                let c = Constraint::relative("odom", a, b, vec![0.0, 0.0], &DMatrix::identity(2, 2)).unwrap();
                graph.add_constraint(c).unwrap();
            }
            let oldest = t(rng.gen_range(0..12) as f64);
            let transaction = marginalization(&graph, oldest);
            graph.apply(&transaction).unwrap();
            graph.verify_integrity().unwrap();
            for constraint in graph.constraints() {
                let all_old = constraint
                    .variables()
                    .iter()
                    .all(|uuid| graph.get_variable(uuid).unwrap().stamp().is_some_and(|s| s < oldest));
                assert!(!all_old);
            }
            for v in graph.variables() {
                if v.stamp().is_some_and(|s| s < oldest) {
                    assert!(!graph.connected_constraints(&v.uuid()).unwrap().is_empty());
                }
            }
        }
    }
}

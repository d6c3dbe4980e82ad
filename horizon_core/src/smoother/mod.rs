// horizon_core/src/smoother/mod.rs

//! Fixed-lag smoothing over a sliding time window.
//!
//! A [`Smoother`] owns the only mutable copy of its graph. Producers hand it
//! transactions through a [`TransactionSender`]; each cycle drains the queue, applies the
//! transactions atomically, retires history that fell out of the window, optimizes and
//! publishes an immutable snapshot that any number of [`SmootherReader`]s can read.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::params::{SmootherMode, SmootherParams};
use crate::solver::{Solver, SolverSummary};
use crate::stamp::Stamp;
use crate::transaction::Transaction;

pub mod handle;
pub mod queue;
pub mod reader;
pub mod window;

pub use handle::SmootherHandle;
pub use queue::{Submission, TransactionSender};
pub use reader::{SmootherReader, SmootherState, SmootherStats};
pub use window::WindowState;

use queue::Arrival;
use reader::Shared;

/// Something noteworthy that happened to a transaction or an optimization during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// The transaction was older than the window allows.
    Dropped { source: String, stamp: Stamp },
    /// The transaction failed validation and was not applied.
    Rejected { source: String, error: GraphError },
    /// The optimization result was discarded; the previous snapshot stays published.
    OptimizationFailed { reason: String },
}

/// What a single call to [`Smoother::run_cycle`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub applied: usize,
    pub events: Vec<CycleEvent>,
    pub variables_marginalized: usize,
    pub constraints_marginalized: usize,
    /// Present when an optimization succeeded and a new snapshot was published.
    pub summary: Option<SolverSummary>,
}

pub struct Smoother {
    params: SmootherParams,
    graph: Graph,
    window: WindowState,
    sender: Sender<Submission>,
    receiver: Receiver<Submission>,
    pending: Vec<Arrival>,
    next_sequence: u64,
    consecutive_failures: u32,
    degraded: bool,
    /// Set when the graph changed since the last successful optimization.
    dirty: bool,
    shared: Arc<Shared>,
}

impl Smoother {
    pub fn new(params: SmootherParams, solver: Box<dyn Solver>) -> Self {
        let params = params.validated();
        let graph = Graph::new(solver);
        let window = initial_window(&params);
        if params.mode == SmootherMode::Batch {
            debug!("Smoother running in batch mode; history is never marginalized.");
        }
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::new(graph.clone(), window));
        Self {
            params,
            graph,
            window,
            sender,
            receiver,
            pending: Vec::new(),
            next_sequence: 0,
            consecutive_failures: 0,
            degraded: false,
            dirty: false,
            shared,
        }
    }

    /// A new producer handle onto this smoother's queue.
    pub fn sender(&self) -> TransactionSender {
        TransactionSender::new(self.sender.clone())
    }

    pub fn reader(&self) -> SmootherReader {
        SmootherReader::new(Arc::clone(&self.shared))
    }

    pub fn params(&self) -> &SmootherParams {
        &self.params
    }

    /// The smoother's private graph, including edits not yet published.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn window(&self) -> WindowState {
        self.window
    }

    pub fn state(&self) -> SmootherState {
        *self.shared.state.read()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Leaves the degraded state so the next cycle optimizes again.
    pub fn reset_degraded(&mut self) {
        if self.degraded {
            debug!("Smoother leaving degraded state.");
        }
        self.degraded = false;
        self.consecutive_failures = 0;
        self.dirty = true;
        self.shared.set_state(SmootherState::Idle);
    }

    /// Forgets all state: graph, window, queued transactions and statistics.
    pub fn reset(&mut self) {
        self.receiver.try_iter().for_each(drop);
        self.pending.clear();
        self.graph = self.graph.empty_like();
        self.window = initial_window(&self.params);
        self.consecutive_failures = 0;
        self.degraded = false;
        self.dirty = false;
        self.shared.publish(self.graph.clone());
        *self.shared.window.write() = self.window;
        *self.shared.stats.write() = SmootherStats::default();
        self.shared.set_state(SmootherState::Idle);
    }

    /// Runs one full cycle: drain, filter, apply, advance the window, marginalize,
    /// optimize and publish.
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        self.shared.set_state(SmootherState::AwaitingTransaction);
        queue::drain(&self.receiver, &mut self.pending, &mut self.next_sequence);
        let arrivals = std::mem::take(&mut self.pending);
        let mut retained = self.drop_stale(arrivals, &mut report);
        retained.sort_by_key(|a| (a.transaction.stamp(), a.sequence));

        if let Some(newest) = self.apply_arrivals(retained, &mut report) {
            self.window.advance(newest);
        }
        self.marginalize(&mut report);

        if self.degraded {
            debug!("Smoother is degraded; skipping optimization.");
        } else if self.dirty {
            self.optimize(&mut report);
        }

        self.shared.set_state(if self.degraded {
            SmootherState::Degraded
        } else {
            SmootherState::Idle
        });
        *self.shared.window.write() = self.window;
        self.record_stats(&report);
        debug!(
            applied = report.applied,
            events = report.events.len(),
            variables = self.graph.variable_count(),
            constraints = self.graph.constraint_count(),
            "cycle complete"
        );
        report
    }

    fn drop_stale(&self, arrivals: Vec<Arrival>, report: &mut CycleReport) -> Vec<Arrival> {
        let Some(cutoff) = self.window.acceptance_cutoff(self.params.transaction_grace) else {
            return arrivals;
        };
        let mut retained = Vec::with_capacity(arrivals.len());
        for arrival in arrivals {
            let stamp = arrival.transaction.min_stamp();
            if stamp < cutoff {
                warn!(
                    "Dropping transaction from '{}' at {}: older than the window start {}.",
                    arrival.source, stamp, cutoff
                );
                report.events.push(CycleEvent::Dropped {
                    source: arrival.source,
                    stamp,
                });
            } else {
                retained.push(arrival);
            }
        }
        retained
    }

    /// Applies the arrivals as one merged transaction, falling back to one at a time when
    /// the merge is rejected. Returns the newest stamp among what was applied.
    fn apply_arrivals(&mut self, arrivals: Vec<Arrival>, report: &mut CycleReport) -> Option<Stamp> {
        if arrivals.is_empty() {
            return None;
        }

        self.shared.set_state(SmootherState::Validating);
        let merged = arrivals
            .iter()
            .map(|a| a.transaction.clone())
            .reduce(Transaction::merged)?;

        if self.graph.validate(&merged).is_ok() {
            self.shared.set_state(SmootherState::Applying);
            if self.graph.apply(&merged).is_ok() {
                report.applied += arrivals.len();
                self.dirty = true;
                return Some(merged.max_stamp());
            }
        }

        debug!(
            "Merged transaction of {} arrivals was rejected; applying them one at a time.",
            arrivals.len()
        );
        self.shared.set_state(SmootherState::Applying);
        let mut newest: Option<Stamp> = None;
        for arrival in arrivals {
            match self.graph.apply(&arrival.transaction) {
                Ok(()) => {
                    report.applied += 1;
                    self.dirty = true;
                    let stamp = arrival.transaction.max_stamp();
                    newest = Some(newest.map_or(stamp, |n| n.max(stamp)));
                }
                Err(error) => {
                    warn!("Rejected transaction from '{}': {}", arrival.source, error);
                    report.events.push(CycleEvent::Rejected {
                        source: arrival.source,
                        error,
                    });
                }
            }
        }
        newest
    }

    fn marginalize(&mut self, report: &mut CycleReport) {
        if !self.window.is_bounded() {
            return;
        }
        let Some(oldest) = self.window.oldest_retained_stamp else {
            return;
        };
        let transaction = window::marginalization(&self.graph, oldest);
        if transaction.is_empty() {
            return;
        }
        let variables = transaction.removed_variables().count();
        let constraints = transaction.removed_constraints().count();
        match self.graph.apply(&transaction) {
            Ok(()) => {
                report.variables_marginalized += variables;
                report.constraints_marginalized += constraints;
                self.dirty = true;
                debug!(variables, constraints, "marginalized history older than {}", oldest);
            }
            Err(error) => error!("Marginalization before {} failed: {}", oldest, error),
        }
    }

    fn optimize(&mut self, report: &mut CycleReport) {
        if self.graph.is_empty() {
            self.shared.publish(self.graph.clone());
            self.dirty = false;
            return;
        }

        self.shared.set_state(SmootherState::Optimizing);
        let budget = Duration::from_secs_f64(self.params.optimization_budget);
        let started = Instant::now();
        let outcome = self.graph.optimize_candidate(&self.params.solver);
        let elapsed = started.elapsed();

        let failure = match outcome {
            Ok(candidate) if !candidate.summary.termination.is_usable() => {
                format!("solver stopped without converging ({:?})", candidate.summary.termination)
            }
            Ok(_) if elapsed > budget => {
                format!("optimization took {:?}, over the budget of {:?}", elapsed, budget)
            }
            Ok(candidate) => match self.graph.commit_values(&candidate.values) {
                Ok(()) => {
                    self.consecutive_failures = 0;
                    self.dirty = false;
                    self.shared.publish(self.graph.clone());
                    report.summary = Some(candidate.summary);
                    return;
                }
                Err(error) => error.to_string(),
            },
            Err(error) => error.to_string(),
        };

        self.consecutive_failures += 1;
        warn!(
            "Discarding optimization result ({} consecutive failures): {}",
            self.consecutive_failures, failure
        );
        report.events.push(CycleEvent::OptimizationFailed { reason: failure });
        if self.consecutive_failures >= self.params.max_consecutive_failures {
            self.degraded = true;
            error!(
                "Smoother degraded after {} consecutive optimization failures; serving the last good snapshot.",
                self.consecutive_failures
            );
        }
    }

    fn record_stats(&self, report: &CycleReport) {
        let mut stats = self.shared.stats.write();
        stats.cycles += 1;
        stats.transactions_applied += report.applied as u64;
        stats.variables_marginalized += report.variables_marginalized as u64;
        stats.constraints_marginalized += report.constraints_marginalized as u64;
        if report.summary.is_some() {
            stats.optimizations += 1;
        }
        for event in &report.events {
            match event {
                CycleEvent::Dropped { .. } => stats.transactions_dropped += 1,
                CycleEvent::Rejected { .. } => stats.transactions_rejected += 1,
                CycleEvent::OptimizationFailed { .. } => stats.optimization_failures += 1,
            }
        }
    }
}

fn initial_window(params: &SmootherParams) -> WindowState {
    match params.mode {
        SmootherMode::FixedLag => WindowState::new(params.lag_duration),
        SmootherMode::Batch => WindowState::unbounded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::error::{SolverError, SubmitError, ValidationError};
    use crate::identity;
    use crate::solver::{LevenbergMarquardt, Problem, SolverOptions, TerminationReason};
    use crate::synchronizer::Synchronizer;
    use crate::variables::{Variable, VariableType};
    use nalgebra::DMatrix;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Fails every solve while `failing` is set.
    #[derive(Debug, Clone)]
    struct SwitchableSolver {
        failing: Arc<AtomicBool>,
    }

    impl Solver for SwitchableSolver {
        fn solve(&self, problem: &mut Problem<'_>, options: &SolverOptions) -> Result<SolverSummary, SolverError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SolverError::Other("injected failure".into()));
            }
            LevenbergMarquardt::new().solve(problem, options)
        }

        fn covariance(&self, problem: &Problem<'_>, pairs: &[(usize, usize)]) -> Result<Vec<DMatrix<f64>>, SolverError> {
            LevenbergMarquardt::new().covariance(problem, pairs)
        }
    }

    /// Always reports that it ran out of iterations.
    #[derive(Debug, Clone)]
    struct StubbornSolver;

    impl Solver for StubbornSolver {
        fn solve(&self, problem: &mut Problem<'_>, _options: &SolverOptions) -> Result<SolverSummary, SolverError> {
            let cost = problem.cost();
            Ok(SolverSummary {
                iterations: 1,
                initial_cost: cost,
                final_cost: cost,
                termination: TerminationReason::MaxIterations,
                elapsed: Duration::ZERO,
            })
        }

        fn covariance(&self, _problem: &Problem<'_>, _pairs: &[(usize, usize)]) -> Result<Vec<DMatrix<f64>>, SolverError> {
            Err(SolverError::SingularHessian)
        }
    }

    /// Converges, but only after sleeping past any reasonable budget.
    #[derive(Debug, Clone)]
    struct SlowSolver(Duration);

    impl Solver for SlowSolver {
        fn solve(&self, problem: &mut Problem<'_>, options: &SolverOptions) -> Result<SolverSummary, SolverError> {
            std::thread::sleep(self.0);
            LevenbergMarquardt::new().solve(problem, options)
        }

        fn covariance(&self, problem: &Problem<'_>, pairs: &[(usize, usize)]) -> Result<Vec<DMatrix<f64>>, SolverError> {
            LevenbergMarquardt::new().covariance(problem, pairs)
        }
    }

    fn device() -> uuid::Uuid {
        identity::from_name("robot")
    }

    fn t(secs: f64) -> Stamp {
        Stamp::from_secs_f64(secs)
    }

    fn position(secs: f64) -> Variable {
        Variable::position_2d(t(secs), device())
    }

    fn prior(v: &Variable) -> Constraint {
        let mean = v.data().to_vec();
        let covariance = DMatrix::identity(v.local_size(), v.local_size());
        Constraint::absolute("prior", v, mean, &covariance).unwrap()
    }

    fn observation(secs: f64) -> Transaction {
        let v = position(secs).with_data(vec![secs, 0.0]).unwrap();
        let mut tx = Transaction::new(t(secs));
        tx.add_constraint(prior(&v)).add_variable(v);
        tx
    }

    fn smoother(lag: f64) -> Smoother {
        let params = SmootherParams {
            lag_duration: lag,
            ..SmootherParams::default()
        };
        Smoother::new(params, Box::new(LevenbergMarquardt::new()))
    }

    #[test]
    fn test_window_retires_old_variables_unless_blocked() {
        let mut smoother = smoother(5.0);
        let variables: Vec<Variable> = (1..=20).map(|i| position(i as f64)).collect();
        let mut tx = Transaction::new(t(20.0));
        for v in &variables {
            tx.add_variable(v.clone()).add_constraint(prior(v));
        }
        let bridge = Constraint::relative("odom", &variables[13], &variables[15], vec![0.0, 0.0], &DMatrix::identity(2, 2))
            .unwrap();
        tx.add_constraint(bridge.clone());
        smoother.sender().submit("sensor", tx).unwrap();

        let report = smoother.run_cycle();
        assert_eq!(report.applied, 1);
        assert!(report.summary.is_some());
        assert_eq!(smoother.window().oldest_retained_stamp, Some(t(15.0)));

        let graph = smoother.reader().snapshot();
        for v in &variables {
            let stamp = v.stamp().unwrap();
            let expected = stamp >= t(15.0) || stamp == t(14.0);
            assert_eq!(graph.variable_exists(&v.uuid()), expected, "variable at {}", stamp);
        }
        assert!(graph.constraint_exists(&bridge.uuid()));
        assert_eq!(report.variables_marginalized, 13);
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_batch_mode_never_marginalizes() {
        let params = SmootherParams {
            mode: SmootherMode::Batch,
            lag_duration: 1.0,
            ..SmootherParams::default()
        };
        let mut smoother = Smoother::new(params, Box::new(LevenbergMarquardt::new()));
        let reader = smoother.reader();
        for i in 1..=60 {
            smoother.sender().submit("sensor", observation(i as f64)).unwrap();
            let report = smoother.run_cycle();
            assert_eq!(report.variables_marginalized, 0);
            assert_eq!(report.constraints_marginalized, 0);
        }

        // Far older than any lag, still accepted.
        smoother.sender().submit("late", observation(0.5)).unwrap();
        let report = smoother.run_cycle();
        assert_eq!(report.applied, 1);
        assert!(report.events.is_empty());

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.variable_count(), 61);
        assert_eq!(snapshot.constraint_count(), 61);
        assert_eq!(reader.window().newest_stamp, Some(t(60.0)));
        let stats = reader.stats();
        assert_eq!(stats.variables_marginalized, 0);
        assert_eq!(stats.transactions_dropped, 0);

        smoother.reset();
        assert!(!smoother.window().is_bounded());
    }

    #[test]
    fn test_zero_norm_orientation_prior_is_rejected_at_apply() {
        let mut smoother = smoother(5.0);
        let orientation = Variable::orientation_3d(t(2.0), device());
        let valid = Constraint::absolute("imu", &orientation, vec![1.0, 0.0, 0.0, 0.0], &DMatrix::identity(3, 3)).unwrap();
        let mut json = serde_json::to_value(&valid).unwrap();
        json["mean"] = serde_json::json!([0.0, 0.0, 0.0, 0.0]);
        let corrupted: Constraint = serde_json::from_value(json).unwrap();

        let mut bad = Transaction::new(t(2.0));
        bad.add_variable(orientation).add_constraint(corrupted);
        smoother.sender().submit("good", observation(1.0)).unwrap();
        smoother.sender().submit("bad", bad).unwrap();

        let report = smoother.run_cycle();
        assert_eq!(report.applied, 1);
        assert_eq!(
            report.events,
            vec![CycleEvent::Rejected {
                source: "bad".into(),
                error: GraphError::Validation(ValidationError::ZeroNorm {
                    type_name: "AbsoluteConstraint"
                }),
            }]
        );
        assert_eq!(smoother.graph().variable_count(), 1);
        assert_eq!(smoother.reader().stats().transactions_rejected, 1);
    }

    #[test]
    fn test_two_producers_complete_a_stamp_in_either_order() {
        let synchronizer = Synchronizer::new(
            device(),
            &[
                VariableType::Position2DStamped,
                VariableType::Orientation2DStamped,
                VariableType::VelocityLinear2DStamped,
            ],
            5.0,
        );
        let stamp = t(10.0);
        let pose = || {
            let p = Variable::position_2d(stamp, device());
            let o = Variable::orientation_2d(stamp, device());
            let mut tx = Transaction::new(stamp);
            tx.add_constraint(prior(&p))
                .add_constraint(prior(&o))
                .add_variable(p)
                .add_variable(o);
            tx
        };
        let velocity = || {
            let v = Variable::velocity_linear_2d(stamp, device());
            let mut tx = Transaction::new(stamp);
            tx.add_constraint(prior(&v)).add_variable(v);
            tx
        };

        for pose_first in [true, false] {
            let mut smoother = smoother(5.0);
            let reader = smoother.reader();
            let pose_sender = smoother.sender();
            let velocity_sender = smoother.sender();
            if pose_first {
                pose_sender.submit("pose", pose()).unwrap();
                velocity_sender.submit("velocity", velocity()).unwrap();
            } else {
                velocity_sender.submit("velocity", velocity()).unwrap();
                pose_sender.submit("pose", pose()).unwrap();
            }
            assert_eq!(reader.find_stable_stamp(&synchronizer), None);
            smoother.run_cycle();
            assert_eq!(reader.find_stable_stamp(&synchronizer), Some(stamp));
        }
    }

    #[test]
    fn test_stale_transactions_are_dropped() {
        let mut smoother = smoother(5.0);
        smoother.sender().submit("sensor", observation(20.0)).unwrap();
        smoother.run_cycle();

        smoother.sender().submit("late", observation(14.95)).unwrap();
        smoother.sender().submit("too late", observation(14.0)).unwrap();
        let report = smoother.run_cycle();
        assert_eq!(report.applied, 1);
        assert_eq!(
            report.events,
            vec![CycleEvent::Dropped {
                source: "too late".into(),
                stamp: t(14.0)
            }]
        );
        assert_eq!(smoother.reader().stats().transactions_dropped, 1);
    }

    #[test]
    fn test_invalid_transaction_is_rejected_and_others_still_apply() {
        let mut smoother = smoother(5.0);
        let orphan = position(3.0);
        let mut bad = Transaction::new(t(3.0));
        bad.add_constraint(prior(&orphan));
        smoother.sender().submit("good", observation(1.0)).unwrap();
        smoother.sender().submit("bad", bad).unwrap();
        smoother.sender().submit("good", observation(2.0)).unwrap();

        let report = smoother.run_cycle();
        assert_eq!(report.applied, 2);
        assert_eq!(report.events.len(), 1);
        assert!(matches!(
            &report.events[0],
            CycleEvent::Rejected { source, error } if source == "bad" && error.is_consistency()
        ));
        assert_eq!(smoother.graph().variable_count(), 2);
    }

    #[test]
    fn test_repeated_failures_degrade_until_reset() {
        let failing = Arc::new(AtomicBool::new(false));
        let params = SmootherParams {
            max_consecutive_failures: 2,
            ..SmootherParams::default()
        };
        let mut smoother = Smoother::new(
            params,
            Box::new(SwitchableSolver {
                failing: Arc::clone(&failing),
            }),
        );
        let reader = smoother.reader();
        smoother.sender().submit("sensor", observation(1.0)).unwrap();
        smoother.run_cycle();
        assert_eq!(reader.snapshot().variable_count(), 1);

        failing.store(true, Ordering::SeqCst);
        smoother.sender().submit("sensor", observation(2.0)).unwrap();
        let report = smoother.run_cycle();
        assert!(matches!(report.events[0], CycleEvent::OptimizationFailed { .. }));
        assert_eq!(reader.state(), SmootherState::Idle);
        assert_eq!(reader.snapshot().variable_count(), 1);

        smoother.run_cycle();
        assert_eq!(reader.state(), SmootherState::Degraded);

        smoother.sender().submit("sensor", observation(3.0)).unwrap();
        let report = smoother.run_cycle();
        assert_eq!(report.applied, 1);
        assert!(report.events.is_empty());
        assert_eq!(smoother.graph().variable_count(), 3);
        assert_eq!(reader.snapshot().variable_count(), 1);

        failing.store(false, Ordering::SeqCst);
        smoother.reset_degraded();
        let report = smoother.run_cycle();
        assert!(report.summary.is_some());
        assert_eq!(reader.state(), SmootherState::Idle);
        assert_eq!(reader.snapshot().variable_count(), 3);
        assert_eq!(reader.stats().optimization_failures, 2);
    }

    #[test]
    fn test_non_converged_result_is_discarded() {
        let mut smoother = Smoother::new(SmootherParams::default(), Box::new(StubbornSolver));
        smoother.sender().submit("sensor", observation(1.0)).unwrap();
        let report = smoother.run_cycle();
        assert!(report.summary.is_none());
        assert!(matches!(report.events[0], CycleEvent::OptimizationFailed { .. }));
        assert_eq!(smoother.reader().snapshot().variable_count(), 0);
    }

    #[test]
    fn test_over_budget_result_is_discarded() {
        let params = SmootherParams {
            optimization_budget: 0.01,
            ..SmootherParams::default()
        };
        let mut smoother = Smoother::new(params, Box::new(SlowSolver(Duration::from_millis(50))));
        smoother.sender().submit("sensor", observation(1.0)).unwrap();
        let report = smoother.run_cycle();
        assert!(report.summary.is_none());
        match &report.events[0] {
            CycleEvent::OptimizationFailed { reason } => assert!(reason.contains("budget")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_window_is_monotonic_under_random_arrivals() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut smoother = smoother(2.0);
        let reader = smoother.reader();
        let mut last = (None, None);
        for _ in 0..40 {
            for _ in 0..rng.gen_range(0..4) {
                let secs = (rng.gen_range(0..200) as f64) * 0.1;
                smoother.sender().submit("sensor", observation(secs)).unwrap();
            }
            smoother.run_cycle();
            let window = reader.window();
            assert!(window.oldest_retained_stamp >= last.0);
            assert!(window.newest_stamp >= last.1);
            last = (window.oldest_retained_stamp, window.newest_stamp);
            smoother.graph().verify_integrity().unwrap();
        }
    }

    #[test]
    fn test_submit_fails_once_smoother_is_gone() {
        let smoother = smoother(5.0);
        let sender = smoother.sender();
        drop(smoother);
        assert_eq!(sender.submit("sensor", observation(1.0)), Err(SubmitError::Closed));
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut smoother = smoother(5.0);
        smoother.sender().submit("sensor", observation(1.0)).unwrap();
        smoother.run_cycle();
        smoother.sender().submit("sensor", observation(2.0)).unwrap();
        smoother.reset();
        assert!(smoother.graph().is_empty());
        assert!(!smoother.window().is_initialized());
        assert_eq!(smoother.reader().stats(), SmootherStats::default());
        let report = smoother.run_cycle();
        assert_eq!(report.applied, 0);
    }
}

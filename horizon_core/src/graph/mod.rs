// horizon_core/src/graph/mod.rs

use nalgebra::DMatrix;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

use crate::constraints::Constraint;
use crate::error::{ConsistencyError, GraphError, SolverError, ValidationError};
use crate::solver::{Problem, Solver, SolverOptions, SolverSummary};
use crate::transaction::{Edit, Transaction};
use crate::variables::{Variable, VariableType};

pub mod checkpoint;

pub use checkpoint::GraphCheckpoint;

/// Values produced by an optimization that has not been written back yet.
#[derive(Debug, Clone)]
pub struct OptimizedValues {
    pub values: BTreeMap<Uuid, Vec<f64>>,
    pub summary: SolverSummary,
}

/// The authoritative store of variables and constraints.
///
/// Every mutation is validated against the whole current state before anything is
/// written, so a failed call leaves the graph exactly as it was.
#[derive(Debug, Clone)]
pub struct Graph {
    variables: BTreeMap<Uuid, Variable>,
    constraints: BTreeMap<Uuid, Constraint>,
    /// variable uuid -> uuids of the constraints referencing it
    cross_reference: BTreeMap<Uuid, BTreeSet<Uuid>>,
    solver: Box<dyn Solver>,
    optimized: bool,
}

impl Graph {
    pub fn new(solver: Box<dyn Solver>) -> Self {
        Self {
            variables: BTreeMap::new(),
            constraints: BTreeMap::new(),
            cross_reference: BTreeMap::new(),
            solver,
            optimized: false,
        }
    }

    /// An empty graph that shares this graph's solver.
    pub fn empty_like(&self) -> Self {
        Self::new(self.solver.clone())
    }

    // --- Queries ---

    pub fn variable_exists(&self, uuid: &Uuid) -> bool {
        self.variables.contains_key(uuid)
    }

    pub fn constraint_exists(&self, uuid: &Uuid) -> bool {
        self.constraints.contains_key(uuid)
    }

    pub fn get_variable(&self, uuid: &Uuid) -> Result<&Variable, GraphError> {
        self.variables
            .get(uuid)
            .ok_or_else(|| ConsistencyError::NotFound(*uuid).into())
    }

    pub fn get_constraint(&self, uuid: &Uuid) -> Result<&Constraint, GraphError> {
        self.constraints
            .get(uuid)
            .ok_or_else(|| ConsistencyError::NotFound(*uuid).into())
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }

    /// Every constraint that references the given variable.
    pub fn connected_constraints(&self, variable: &Uuid) -> Result<Vec<&Constraint>, GraphError> {
        if !self.variable_exists(variable) {
            return Err(ConsistencyError::NotFound(*variable).into());
        }
        Ok(self
            .cross_reference
            .get(variable)
            .into_iter()
            .flatten()
            .filter_map(|uuid| self.constraints.get(uuid))
            .collect())
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.constraints.is_empty()
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// Total robust cost of all constraints at the current values.
    pub fn cost(&self) -> f64 {
        self.constraints
            .values()
            .map(|c| {
                let values: Vec<&[f64]> = c
                    .variables()
                    .iter()
                    .filter_map(|uuid| self.variables.get(uuid))
                    .map(|v| v.data())
                    .collect();
                c.cost(&values)
            })
            .sum()
    }

    // --- Single-element mutations ---

    /// Inserts a variable. Returns `Ok(false)` if its uuid is already present.
    pub fn add_variable(&mut self, variable: Variable) -> Result<bool, GraphError> {
        variable.validate()?;
        if self.variable_exists(&variable.uuid()) {
            return Ok(false);
        }
        self.variables.insert(variable.uuid(), variable);
        Ok(true)
    }

    /// Inserts a constraint. Returns `Ok(false)` if its uuid is already present.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<bool, GraphError> {
        constraint.validate()?;
        if self.constraint_exists(&constraint.uuid()) {
            return Ok(false);
        }
        for (index, uuid) in constraint.variables().iter().enumerate() {
            let variable = self.variables.get(uuid).ok_or(ConsistencyError::UnknownVariable {
                constraint: constraint.uuid(),
                variable: *uuid,
            })?;
            check_referenced_type(&constraint, index, variable.variable_type())?;
        }
        self.insert_constraint(constraint);
        Ok(true)
    }

    /// Removes a variable no live constraint references.
    pub fn remove_variable(&mut self, uuid: &Uuid) -> Result<(), GraphError> {
        if !self.variable_exists(uuid) {
            return Err(ConsistencyError::NotFound(*uuid).into());
        }
        if let Some(constraint) = self.cross_reference.get(uuid).and_then(|set| set.iter().next()) {
            return Err(ConsistencyError::VariableInUse {
                variable: *uuid,
                constraint: *constraint,
            }
            .into());
        }
        self.variables.remove(uuid);
        self.cross_reference.remove(uuid);
        Ok(())
    }

    /// Returns `Ok(true)` if the constraint was removed, `Ok(false)` if it was absent.
    pub fn remove_constraint(&mut self, uuid: &Uuid) -> Result<bool, GraphError> {
        Ok(self.take_constraint(uuid).is_some())
    }

    fn insert_constraint(&mut self, constraint: Constraint) {
        for variable in constraint.variables() {
            self.cross_reference
                .entry(*variable)
                .or_default()
                .insert(constraint.uuid());
        }
        self.constraints.insert(constraint.uuid(), constraint);
    }

    fn take_constraint(&mut self, uuid: &Uuid) -> Option<Constraint> {
        let constraint = self.constraints.remove(uuid)?;
        for variable in constraint.variables() {
            if let Some(set) = self.cross_reference.get_mut(variable) {
                set.remove(uuid);
                if set.is_empty() {
                    self.cross_reference.remove(variable);
                }
            }
        }
        Some(constraint)
    }

    // --- Transactions ---

    /// Checks a transaction against the current state without applying it.
    ///
    /// Data validation runs over every element first, then existence and reference
    /// checks run across the transaction as a whole.
    pub fn validate(&self, transaction: &Transaction) -> Result<(), GraphError> {
        for variable in transaction.added_variables() {
            variable.validate()?;
        }
        for constraint in transaction.added_constraints() {
            constraint.validate()?;
        }

        for (uuid, edit) in transaction.variable_edits() {
            if matches!(edit, Edit::Remove) && !self.variable_exists(uuid) {
                return Err(ConsistencyError::NotFound(*uuid).into());
            }
        }

        for constraint in transaction.added_constraints() {
            for (index, uuid) in constraint.variables().iter().enumerate() {
                let variable_type =
                    self.type_after(transaction, uuid)
                        .ok_or(ConsistencyError::UnknownVariable {
                            constraint: constraint.uuid(),
                            variable: *uuid,
                        })?;
                check_referenced_type(constraint, index, variable_type)?;
            }
        }

        for (uuid, edit) in transaction.variable_edits() {
            if !matches!(edit, Edit::Remove) {
                continue;
            }
            if let Some(constraint) = self.referencing_after(transaction, uuid) {
                return Err(ConsistencyError::VariableInUse {
                    variable: *uuid,
                    constraint,
                }
                .into());
            }
        }
        Ok(())
    }

    /// The type of the variable with this uuid once `transaction` is applied, if it exists.
    fn type_after(&self, transaction: &Transaction, uuid: &Uuid) -> Option<VariableType> {
        match transaction.variable_edit(uuid) {
            // An add over an existing variable keeps the stored one.
            Some(Edit::Add(v)) => Some(self.variables.get(uuid).unwrap_or(v).variable_type()),
            Some(Edit::Replace(v)) => Some(v.variable_type()),
            Some(Edit::Remove) => None,
            Some(Edit::Cancelled) | None => self.variables.get(uuid).map(|v| v.variable_type()),
        }
    }

    /// A constraint that would still reference `variable` once `transaction` is applied.
    fn referencing_after(&self, transaction: &Transaction, variable: &Uuid) -> Option<Uuid> {
        let surviving = self.cross_reference.get(variable).into_iter().flatten().find(|uuid| {
            match transaction.constraint_edit(uuid) {
                Some(Edit::Remove) => false,
                Some(Edit::Replace(replacement)) => replacement.variables().contains(variable),
                Some(Edit::Add(_)) | Some(Edit::Cancelled) | None => true,
            }
        });
        if let Some(uuid) = surviving {
            return Some(*uuid);
        }
        transaction
            .added_constraints()
            .find(|c| c.variables().contains(variable))
            .map(|c| c.uuid())
    }

    /// Validates and then commits a transaction. On error the graph is unchanged.
    ///
    /// Commit order: added and replaced variables, removed constraints, added and replaced
    /// constraints, removed variables.
    pub fn apply(&mut self, transaction: &Transaction) -> Result<(), GraphError> {
        self.validate(transaction)?;

        for (uuid, edit) in transaction.variable_edits() {
            match edit {
                Edit::Add(variable) => {
                    self.variables.entry(*uuid).or_insert_with(|| variable.clone());
                }
                Edit::Replace(variable) => {
                    self.variables.insert(*uuid, variable.clone());
                }
                Edit::Remove | Edit::Cancelled => {}
            }
        }
        for uuid in transaction.removed_constraints() {
            self.take_constraint(&uuid);
        }
        for (uuid, edit) in transaction.constraint_edits() {
            match edit {
                Edit::Add(constraint) if !self.constraint_exists(uuid) => self.insert_constraint(constraint.clone()),
                Edit::Replace(constraint) => self.insert_constraint(constraint.clone()),
                _ => {}
            }
        }
        for (uuid, edit) in transaction.variable_edits() {
            if matches!(edit, Edit::Remove) {
                self.variables.remove(uuid);
                self.cross_reference.remove(uuid);
            }
        }

        debug!(
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            "applied transaction at {}",
            transaction.stamp()
        );
        Ok(())
    }

    /// Checks the cross-reference index and every constraint's references against the
    /// stored variables.
    pub fn verify_integrity(&self) -> Result<(), ConsistencyError> {
        for constraint in self.constraints.values() {
            for variable in constraint.variables() {
                if !self.variables.contains_key(variable) {
                    return Err(ConsistencyError::UnknownVariable {
                        constraint: constraint.uuid(),
                        variable: *variable,
                    });
                }
                let indexed = self
                    .cross_reference
                    .get(variable)
                    .is_some_and(|set| set.contains(&constraint.uuid()));
                if !indexed {
                    return Err(ConsistencyError::NotFound(constraint.uuid()));
                }
            }
        }
        for (variable, set) in &self.cross_reference {
            for constraint in set {
                if !self.constraints.contains_key(constraint) {
                    return Err(ConsistencyError::NotFound(*constraint));
                }
            }
            if !self.variables.contains_key(variable) {
                return Err(ConsistencyError::NotFound(*variable));
            }
        }
        Ok(())
    }

    // --- Optimization ---

    fn problem(&self) -> Result<Problem<'_>, GraphError> {
        Problem::new(self.variables.values(), self.constraints.values())
            .ok_or_else(|| GraphError::Solver(SolverError::Other("constraint references a missing variable".into())))
    }

    /// Runs the solver and returns the optimized values without writing them back.
    pub fn optimize_candidate(&self, options: &SolverOptions) -> Result<OptimizedValues, GraphError> {
        let mut problem = self.problem()?;
        let summary = self.solver.solve(&mut problem, options)?;
        if !summary.final_cost.is_finite() {
            return Err(SolverError::NonFiniteCost.into());
        }
        let values = problem
            .blocks()
            .iter()
            .map(|block| (block.uuid, block.values.clone()))
            .collect();
        Ok(OptimizedValues { values, summary })
    }

    /// Writes optimized values back. Every value is checked before any is written.
    pub fn commit_values(&mut self, values: &BTreeMap<Uuid, Vec<f64>>) -> Result<(), GraphError> {
        let mut updated = Vec::with_capacity(values.len());
        for (uuid, data) in values {
            let variable = self.get_variable(uuid)?;
            updated.push(variable.clone().with_data(data.clone())?);
        }
        for variable in updated {
            self.variables.insert(variable.uuid(), variable);
        }
        self.optimized = true;
        Ok(())
    }

    /// Optimizes the graph in place. Only variable values change.
    pub fn optimize(&mut self, options: &SolverOptions) -> Result<SolverSummary, GraphError> {
        let OptimizedValues { values, summary } = self.optimize_candidate(options)?;
        self.commit_values(&values)?;
        debug!(
            iterations = summary.iterations,
            initial_cost = summary.initial_cost,
            final_cost = summary.final_cost,
            "optimized graph ({:?})",
            summary.termination
        );
        Ok(summary)
    }

    /// Marginal covariance blocks for the requested variable pairs, in their tangent spaces.
    pub fn get_covariance(&self, pairs: &[(Uuid, Uuid)]) -> Result<Vec<DMatrix<f64>>, GraphError> {
        if !self.optimized {
            return Err(GraphError::NotOptimized);
        }
        let problem = self.problem()?;
        let indices = pairs
            .iter()
            .map(|(a, b)| {
                let ia = problem.block_index(a).ok_or(ConsistencyError::NotFound(*a))?;
                let ib = problem.block_index(b).ok_or(ConsistencyError::NotFound(*b))?;
                Ok((ia, ib))
            })
            .collect::<Result<Vec<_>, GraphError>>()?;
        Ok(self.solver.covariance(&problem, &indices)?)
    }
}

fn check_referenced_type(
    constraint: &Constraint,
    index: usize,
    actual: VariableType,
) -> Result<(), ValidationError> {
    let expected = constraint.variable_types()[index];
    if expected != actual {
        return Err(ValidationError::WrongVariableKind {
            type_name: constraint.type_name(),
            index,
            expected: expected.type_name(),
            actual: actual.type_name(),
        });
    }
    Ok(())
}

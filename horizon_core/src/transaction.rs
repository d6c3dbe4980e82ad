// horizon_core/src/transaction.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::constraints::Constraint;
use crate::stamp::Stamp;
use crate::variables::Variable;

/// The net edit a transaction makes to one id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Edit<T> {
    Add(T),
    Remove,
    /// Remove the stored element (if any) and insert this one.
    Replace(T),
    /// Added and then removed within the same batch; no net edit.
    Cancelled,
}

impl<T> Edit<T> {
    /// The net edit of `self` followed by `next`. Last write wins.
    ///
    /// This is composition of partial functions over the states
    /// `{absent, created in this batch, pre-existing}`, which makes it associative.
    pub fn then(self, next: Edit<T>) -> Edit<T> {
        use Edit::*;
        match (self, next) {
            (Add(_), Add(w)) | (Add(_), Replace(w)) => Add(w),
            (Add(_), Remove) => Cancelled,
            (Add(_), Cancelled) => Cancelled,

            (Remove, Add(w)) | (Remove, Replace(w)) => Replace(w),
            (Remove, Remove) | (Remove, Cancelled) => Remove,

            (Replace(_), Add(w)) | (Replace(_), Replace(w)) => Replace(w),
            (Replace(_), Remove) | (Replace(_), Cancelled) => Remove,

            (Cancelled, Add(w)) | (Cancelled, Replace(w)) => Add(w),
            (Cancelled, Remove) | (Cancelled, Cancelled) => Cancelled,
        }
    }

    /// The element this edit inserts, if any.
    pub fn inserted(&self) -> Option<&T> {
        match self {
            Edit::Add(value) | Edit::Replace(value) => Some(value),
            Edit::Remove | Edit::Cancelled => None,
        }
    }

    /// Whether this edit removes a stored element.
    pub fn removes(&self) -> bool {
        matches!(self, Edit::Remove | Edit::Replace(_))
    }
}

fn record<T>(edits: &mut BTreeMap<Uuid, Edit<T>>, uuid: Uuid, edit: Edit<T>) {
    let merged = match edits.remove(&uuid) {
        Some(previous) => previous.then(edit),
        None => edit,
    };
    edits.insert(uuid, merged);
}

/// An atomic batch of graph edits produced by one source.
///
/// Every id carries at most one net edit, so building a transaction incrementally and
/// merging two transactions follow the same rules (see [`Edit::then`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    stamp: Stamp,
    involved_stamps: BTreeSet<Stamp>,
    variables: BTreeMap<Uuid, Edit<Variable>>,
    constraints: BTreeMap<Uuid, Edit<Constraint>>,
}

impl Transaction {
    pub fn new(stamp: Stamp) -> Self {
        Self {
            stamp,
            ..Default::default()
        }
    }

    // --- Builder ---

    /// Adds a variable. The stamp of a stamped variable is recorded as involved.
    pub fn add_variable(&mut self, variable: Variable) -> &mut Self {
        if let Some(stamp) = variable.stamp() {
            self.involved_stamps.insert(stamp);
        }
        record(&mut self.variables, variable.uuid(), Edit::Add(variable));
        self
    }

    /// Replaces the stored value of a variable, inserting it if absent.
    pub fn replace_variable(&mut self, variable: Variable) -> &mut Self {
        if let Some(stamp) = variable.stamp() {
            self.involved_stamps.insert(stamp);
        }
        record(&mut self.variables, variable.uuid(), Edit::Replace(variable));
        self
    }

    pub fn remove_variable(&mut self, uuid: Uuid) -> &mut Self {
        record(&mut self.variables, uuid, Edit::Remove);
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        record(&mut self.constraints, constraint.uuid(), Edit::Add(constraint));
        self
    }

    pub fn replace_constraint(&mut self, constraint: Constraint) -> &mut Self {
        record(&mut self.constraints, constraint.uuid(), Edit::Replace(constraint));
        self
    }

    pub fn remove_constraint(&mut self, uuid: Uuid) -> &mut Self {
        record(&mut self.constraints, uuid, Edit::Remove);
        self
    }

    pub fn add_involved_stamp(&mut self, stamp: Stamp) -> &mut Self {
        self.involved_stamps.insert(stamp);
        self
    }

    /// Folds `other` into `self` so the result has the net effect of applying `self`
    /// and then `other`. The merged stamp is the earlier of the two.
    pub fn merge(&mut self, other: Transaction) {
        self.stamp = self.stamp.min(other.stamp);
        self.involved_stamps.extend(other.involved_stamps);
        for (uuid, edit) in other.variables {
            record(&mut self.variables, uuid, edit);
        }
        for (uuid, edit) in other.constraints {
            record(&mut self.constraints, uuid, edit);
        }
    }

    /// Consuming form of [`Transaction::merge`].
    pub fn merged(mut self, other: Transaction) -> Transaction {
        self.merge(other);
        self
    }

    // --- Views ---

    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    pub fn involved_stamps(&self) -> &BTreeSet<Stamp> {
        &self.involved_stamps
    }

    /// Earliest of the transaction stamp and the involved stamps.
    pub fn min_stamp(&self) -> Stamp {
        self.involved_stamps
            .iter()
            .next()
            .map_or(self.stamp, |first| self.stamp.min(*first))
    }

    /// Latest of the transaction stamp and the involved stamps.
    pub fn max_stamp(&self) -> Stamp {
        self.involved_stamps
            .iter()
            .next_back()
            .map_or(self.stamp, |last| self.stamp.max(*last))
    }

    /// True when the transaction makes no net edit.
    pub fn is_empty(&self) -> bool {
        self.variables.values().all(|e| matches!(e, Edit::Cancelled))
            && self.constraints.values().all(|e| matches!(e, Edit::Cancelled))
    }

    pub fn variable_edits(&self) -> impl Iterator<Item = (&Uuid, &Edit<Variable>)> {
        self.variables.iter()
    }

    pub fn constraint_edits(&self) -> impl Iterator<Item = (&Uuid, &Edit<Constraint>)> {
        self.constraints.iter()
    }

    pub fn variable_edit(&self, uuid: &Uuid) -> Option<&Edit<Variable>> {
        self.variables.get(uuid)
    }

    pub fn constraint_edit(&self, uuid: &Uuid) -> Option<&Edit<Constraint>> {
        self.constraints.get(uuid)
    }

    /// Variables inserted by an add or a replace.
    pub fn added_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values().filter_map(Edit::inserted)
    }

    /// Ids removed by a remove or a replace.
    pub fn removed_variables(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.variables
            .iter()
            .filter(|(_, edit)| edit.removes())
            .map(|(uuid, _)| *uuid)
    }

    pub fn added_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values().filter_map(Edit::inserted)
    }

    pub fn removed_constraints(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.constraints
            .iter()
            .filter(|(_, edit)| edit.removes())
            .map(|(uuid, _)| *uuid)
    }
}

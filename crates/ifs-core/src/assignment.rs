//! Mutable variable→value state.
//!
//! An [`Assignment`] holds everything that changes during search: current
//! values, per-variable iteration stamps, running criterion totals and the
//! per-constraint contexts. The [`Model`](crate::Model) stays read-only, so
//! several assignments can be searched concurrently over one model.
//!
//! Assignments are mutated only through [`Model::assign`](crate::Model::assign)
//! and [`Model::unassign`](crate::Model::unassign), which keep constraint
//! contexts and criterion totals consistent.

use crate::model::{ConstraintId, ContextSlot, CriterionId, ValueId, VariableId};

/// Set of variables with O(1) insert, remove, membership and indexed access.
///
/// Iteration order is unspecified and changes as members are removed.
#[derive(Debug, Clone, Default)]
pub struct VariableSet {
    items: Vec<VariableId>,
    positions: Vec<Option<usize>>,
}

impl VariableSet {
    /// Creates an empty set able to hold `capacity` variables.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            positions: vec![None; capacity],
        }
    }

    /// Creates a set holding all variables `0..len`.
    pub fn full(len: usize) -> Self {
        Self {
            items: (0..len).map(VariableId).collect(),
            positions: (0..len).map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, variable: VariableId) -> bool {
        matches!(self.positions.get(variable.0), Some(Some(_)))
    }

    /// Returns the member at `index`, useful for uniform random picks.
    pub fn get(&self, index: usize) -> Option<VariableId> {
        self.items.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.items.iter().copied()
    }

    /// Inserts a variable; returns false if it was already present.
    pub fn insert(&mut self, variable: VariableId) -> bool {
        if variable.0 >= self.positions.len() {
            self.positions.resize(variable.0 + 1, None);
        }
        if self.positions[variable.0].is_some() {
            return false;
        }
        self.positions[variable.0] = Some(self.items.len());
        self.items.push(variable);
        true
    }

    /// Removes a variable; returns false if it was not present.
    pub fn remove(&mut self, variable: VariableId) -> bool {
        let Some(Some(pos)) = self.positions.get(variable.0).copied() else {
            return false;
        };
        self.items.swap_remove(pos);
        if let Some(&moved) = self.items.get(pos) {
            self.positions[moved.0] = Some(pos);
        }
        self.positions[variable.0] = None;
        true
    }
}

/// A variable→value mapping over one model.
#[derive(Debug)]
pub struct Assignment {
    index: usize,
    values: Vec<Option<ValueId>>,
    iterations: Vec<u64>,
    assigned: VariableSet,
    unassigned: VariableSet,
    contexts: Vec<ContextSlot>,
    criteria: Vec<f64>,
}

impl Assignment {
    pub(crate) fn new(index: usize, variables: usize, constraints: usize, criteria: usize) -> Self {
        Self {
            index,
            values: vec![None; variables],
            iterations: vec![0; variables],
            assigned: VariableSet::with_capacity(variables),
            unassigned: VariableSet::full(variables),
            contexts: (0..constraints).map(|_| ContextSlot::empty()).collect(),
            criteria: vec![0.0; criteria],
        }
    }

    /// Index of this assignment. Parallel workers are numbered from 1; the
    /// main assignment has index 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current value of a variable.
    pub fn value(&self, variable: VariableId) -> Option<ValueId> {
        self.values.get(variable.0).copied().flatten()
    }

    /// Iteration of the last assignment or unassignment of a variable.
    pub fn iteration(&self, variable: VariableId) -> u64 {
        self.iterations.get(variable.0).copied().unwrap_or(0)
    }

    /// Returns true if `value` is the current value of its variable.
    pub fn is_assigned(&self, variable: VariableId, value: ValueId) -> bool {
        self.value(variable) == Some(value)
    }

    pub fn nr_variables(&self) -> usize {
        self.values.len()
    }

    pub fn nr_assigned_variables(&self) -> usize {
        self.assigned.len()
    }

    pub fn nr_unassigned_variables(&self) -> usize {
        self.unassigned.len()
    }

    pub fn assigned_variables(&self) -> &VariableSet {
        &self.assigned
    }

    pub fn unassigned_variables(&self) -> &VariableSet {
        &self.unassigned
    }

    /// Iterates the currently assigned values.
    pub fn assigned_values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.assigned.iter().filter_map(move |v| self.value(v))
    }

    /// Copy of the variable→value map, indexed by variable.
    pub fn snapshot(&self) -> Vec<Option<ValueId>> {
        self.values.clone()
    }

    /// Context a constraint keeps for this assignment.
    pub fn context(&self, constraint: ConstraintId) -> &ContextSlot {
        &self.contexts[constraint.0]
    }

    /// Running total of a criterion.
    pub fn criterion_total(&self, criterion: CriterionId) -> f64 {
        self.criteria.get(criterion.0).copied().unwrap_or(0.0)
    }

    /// Adjusts the running total of a criterion, for criteria that update
    /// themselves outside the assign/unassign notifications.
    pub fn inc_criterion(&mut self, criterion: CriterionId, delta: f64) {
        if let Some(total) = self.criteria.get_mut(criterion.0) {
            *total += delta;
        }
    }

    pub(crate) fn set_value(&mut self, variable: VariableId, value: Option<ValueId>, iteration: u64) {
        self.values[variable.0] = value;
        self.iterations[variable.0] = iteration;
        if value.is_some() {
            self.unassigned.remove(variable);
            self.assigned.insert(variable);
        } else {
            self.assigned.remove(variable);
            self.unassigned.insert(variable);
        }
    }

    pub(crate) fn set_iteration(&mut self, variable: VariableId, iteration: u64) {
        self.iterations[variable.0] = iteration;
    }

    pub(crate) fn take_context(&mut self, constraint: ConstraintId) -> ContextSlot {
        self.contexts[constraint.0].take()
    }

    pub(crate) fn put_context(&mut self, constraint: ConstraintId, slot: ContextSlot) {
        self.contexts[constraint.0] = slot;
    }
}

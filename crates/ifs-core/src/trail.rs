//! Undo log for speculative changes.
//!
//! Search procedures that explore a move in place (conflict repair,
//! backtracking) record every assign/unassign in a [`Trail`] and roll back
//! to a [`mark`](Trail::mark) when a branch fails. Rolling back restores the
//! previous values and iteration stamps in reverse order.

use crate::assignment::Assignment;
use crate::model::{ConflictSet, Model, ValueData, ValueId, VariableId};

#[derive(Debug, Clone, Copy)]
struct Step {
    variable: VariableId,
    previous: Option<ValueId>,
    stamp: u64,
}

/// Reversible sequence of assignment changes.
///
/// # Example
///
/// ```
/// use ifs_core::{ModelBuilder, Trail};
///
/// let mut builder = ModelBuilder::<i64>::new();
/// let x = builder.add_variable("x", [1, 2]);
/// let model = builder.build().unwrap();
/// let mut assignment = model.create_assignment(0);
///
/// let mut trail = Trail::new();
/// let mark = trail.mark();
/// trail.assign(&model, &mut assignment, 1, model.variable(x).values()[0]);
/// assert_eq!(assignment.nr_assigned_variables(), 1);
///
/// trail.rollback(&model, &mut assignment, mark);
/// assert_eq!(assignment.nr_assigned_variables(), 0);
/// ```
#[derive(Debug, Default)]
#[must_use = "changes recorded in a trail should be rolled back or committed"]
pub struct Trail {
    steps: Vec<Step>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position to roll back to.
    pub fn mark(&self) -> usize {
        self.steps.len()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn record(&mut self, assignment: &Assignment, variable: VariableId) {
        self.steps.push(Step {
            variable,
            previous: assignment.value(variable),
            stamp: assignment.iteration(variable),
        });
    }

    /// Assigns `value` and records the change.
    pub fn assign<P: ValueData>(
        &mut self,
        model: &Model<P>,
        assignment: &mut Assignment,
        iteration: u64,
        value: ValueId,
    ) {
        let variable = model.value(value).variable();
        if assignment.value(variable) == Some(value) {
            return;
        }
        self.record(assignment, variable);
        model.assign(assignment, iteration, value);
    }

    /// Unassigns a variable and records the change.
    pub fn unassign<P: ValueData>(
        &mut self,
        model: &Model<P>,
        assignment: &mut Assignment,
        iteration: u64,
        variable: VariableId,
    ) -> Option<ValueId> {
        assignment.value(variable)?;
        self.record(assignment, variable);
        model.unassign(assignment, iteration, variable)
    }

    /// Unassigns the conflicts of `value`, assigns it, and records all changes.
    pub fn assign_resolving<P: ValueData>(
        &mut self,
        model: &Model<P>,
        assignment: &mut Assignment,
        iteration: u64,
        value: ValueId,
    ) -> ConflictSet {
        let conflicts = model.conflict_values(assignment, value);
        for &conflict in &conflicts {
            self.unassign(model, assignment, iteration, model.value(conflict).variable());
        }
        self.assign(model, assignment, iteration, value);
        conflicts
    }

    /// Reverts every change recorded after `mark`.
    pub fn rollback<P: ValueData>(&mut self, model: &Model<P>, assignment: &mut Assignment, mark: usize) {
        while self.steps.len() > mark {
            let Some(step) = self.steps.pop() else {
                break;
            };
            match step.previous {
                Some(value) => {
                    model.assign(assignment, step.stamp, value);
                }
                None => {
                    model.unassign(assignment, step.stamp, step.variable);
                }
            }
            assignment.set_iteration(step.variable, step.stamp);
        }
    }

    /// Reverts every recorded change.
    pub fn rollback_all<P: ValueData>(&mut self, model: &Model<P>, assignment: &mut Assignment) {
        self.rollback(model, assignment, 0);
    }

    /// Forgets the recorded changes, keeping them applied.
    pub fn commit(mut self) {
        self.steps.clear();
    }
}

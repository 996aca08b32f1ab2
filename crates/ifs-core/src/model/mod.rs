//! The problem model: variables, values, constraints and criteria.
//!
//! Everything lives in arenas owned by [`Model`] and is addressed by index
//! handles ([`VariableId`], [`ValueId`], [`ConstraintId`], [`CriterionId`]).
//! A model is built once through [`ModelBuilder`] and is read-only afterwards;
//! all search state lives in [`Assignment`]s.

mod constraint;
mod criterion;
mod value;
mod variable;

use std::collections::BTreeMap;

use tracing::debug;

pub use constraint::{
    BinaryConstraint, ConflictSet, Constraint, ConstraintContext, ConstraintId, ContextSlot,
};
pub use criterion::{Criterion, CriterionId};
pub use value::{Value, ValueData, ValueId};
pub use variable::{Variable, VariableId};

use crate::assignment::Assignment;
use crate::error::{IfsError, Result};

/// Builder collecting variables, constraints and criteria.
#[derive(Debug)]
pub struct ModelBuilder<P: ValueData> {
    variables: Vec<Variable>,
    values: Vec<Value<P>>,
    constraints: Vec<Box<dyn Constraint<P>>>,
    global: Vec<bool>,
    criteria: Vec<Box<dyn Criterion<P>>>,
}

impl<P: ValueData> Default for ModelBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ValueData> ModelBuilder<P> {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            values: Vec::new(),
            constraints: Vec::new(),
            global: Vec::new(),
            criteria: Vec::new(),
        }
    }

    /// Adds a variable whose domain holds one value per payload.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        domain: impl IntoIterator<Item = P>,
    ) -> VariableId {
        let id = VariableId(self.variables.len());
        let mut variable = Variable::new(id, name.into());
        for data in domain {
            let value = ValueId(self.values.len());
            self.values.push(Value::new(value, id, data));
            variable.push_value(value);
        }
        self.variables.push(variable);
        id
    }

    /// Domain of a variable added earlier.
    pub fn values_of(&self, variable: VariableId) -> &[ValueId] {
        self.variables
            .get(variable.0)
            .map(Variable::values)
            .unwrap_or(&[])
    }

    /// Sets the initial value of a variable (minimal perturbation search).
    pub fn set_initial_value(&mut self, variable: VariableId, value: Option<ValueId>) -> &mut Self {
        if let Some(v) = self.variables.get_mut(variable.0) {
            v.set_initial(value);
        }
        self
    }

    /// Adds a constraint over the variables it reports.
    pub fn add_constraint(&mut self, constraint: impl Constraint<P> + 'static) -> ConstraintId {
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(Box::new(constraint));
        self.global.push(false);
        id
    }

    /// Adds a global constraint, consulted for every variable.
    pub fn add_global_constraint(
        &mut self,
        constraint: impl Constraint<P> + 'static,
    ) -> ConstraintId {
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(Box::new(constraint));
        self.global.push(true);
        id
    }

    /// Adds an optimization criterion.
    pub fn add_criterion(&mut self, criterion: impl Criterion<P> + 'static) -> CriterionId {
        let id = CriterionId(self.criteria.len());
        self.criteria.push(Box::new(criterion));
        id
    }

    /// Validates references and builds the model.
    ///
    /// # Errors
    ///
    /// Returns [`IfsError::Model`] if a constraint references an unknown
    /// variable or an initial value lies outside its variable's domain.
    pub fn build(mut self) -> Result<Model<P>> {
        let mut global_constraints = Vec::new();
        for (index, constraint) in self.constraints.iter().enumerate() {
            let id = ConstraintId(index);
            if self.global[index] {
                global_constraints.push(id);
                continue;
            }
            if constraint.variables().is_empty() {
                return Err(IfsError::Model(format!(
                    "constraint {} has no variables",
                    constraint.name()
                )));
            }
            for &variable in constraint.variables() {
                let Some(v) = self.variables.get_mut(variable.0) else {
                    return Err(IfsError::Model(format!(
                        "constraint {} references unknown variable {}",
                        constraint.name(),
                        variable
                    )));
                };
                v.attach(id, constraint.is_hard());
            }
        }

        let mut with_initial = Vec::new();
        for variable in &self.variables {
            if let Some(initial) = variable.initial_value() {
                if !variable.values().contains(&initial) {
                    return Err(IfsError::Model(format!(
                        "initial value {} is not in the domain of {}",
                        initial,
                        variable.name()
                    )));
                }
                with_initial.push(variable.id());
            }
        }

        debug!(
            variables = self.variables.len(),
            values = self.values.len(),
            constraints = self.constraints.len(),
            criteria = self.criteria.len(),
            "Model built"
        );

        Ok(Model {
            variables: self.variables,
            values: self.values,
            constraints: self.constraints,
            global_constraints,
            criteria: self.criteria,
            with_initial,
        })
    }
}

/// The read-only problem model.
#[derive(Debug)]
pub struct Model<P: ValueData> {
    variables: Vec<Variable>,
    values: Vec<Value<P>>,
    constraints: Vec<Box<dyn Constraint<P>>>,
    global_constraints: Vec<ConstraintId>,
    criteria: Vec<Box<dyn Criterion<P>>>,
    with_initial: Vec<VariableId>,
}

impl<P: ValueData> Model<P> {
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn nr_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn value(&self, id: ValueId) -> &Value<P> {
        &self.values[id.0]
    }

    pub fn nr_values(&self) -> usize {
        self.values.len()
    }

    pub fn constraints(&self) -> &[Box<dyn Constraint<P>>] {
        &self.constraints
    }

    pub fn constraint(&self, id: ConstraintId) -> &dyn Constraint<P> {
        self.constraints[id.0].as_ref()
    }

    pub fn global_constraints(&self) -> &[ConstraintId] {
        &self.global_constraints
    }

    pub fn criteria(&self) -> &[Box<dyn Criterion<P>>] {
        &self.criteria
    }

    /// Variables carrying an initial value.
    pub fn variables_with_initial_value(&self) -> &[VariableId] {
        &self.with_initial
    }

    /// Display name of a value: `variable = payload`.
    pub fn value_name(&self, id: ValueId) -> String {
        let value = self.value(id);
        format!("{} = {:?}", self.variable(value.variable()).name(), value.data())
    }

    /// Creates an empty assignment with fresh constraint contexts.
    pub fn create_assignment(&self, index: usize) -> Assignment {
        let mut assignment = Assignment::new(
            index,
            self.variables.len(),
            self.constraints.len(),
            self.criteria.len(),
        );
        for (i, constraint) in self.constraints.iter().enumerate() {
            let slot = constraint.create_context(self, &assignment);
            assignment.put_context(ConstraintId(i), slot);
        }
        assignment
    }

    /// Creates a new assignment holding the same values as `source`.
    ///
    /// Values are replayed in order of their iteration stamps, so contexts and
    /// criterion totals are rebuilt incrementally for the copy.
    ///
    /// # Errors
    ///
    /// Returns [`IfsError::InvalidState`] if `source` belongs to a model with a
    /// different number of variables.
    pub fn copy_assignment(&self, source: &Assignment, index: usize) -> Result<Assignment> {
        if source.nr_variables() != self.variables.len() {
            return Err(IfsError::InvalidState(format!(
                "assignment has {} variables, model has {}",
                source.nr_variables(),
                self.variables.len()
            )));
        }
        let mut assignment = self.create_assignment(index);
        let mut assigned: Vec<VariableId> = source.assigned_variables().iter().collect();
        assigned.sort_by_key(|&v| (source.iteration(v), v));
        for variable in assigned {
            if let Some(value) = source.value(variable) {
                self.assign(&mut assignment, source.iteration(variable), value);
            }
        }
        for variable in &self.variables {
            assignment.set_iteration(variable.id(), source.iteration(variable.id()));
        }
        Ok(assignment)
    }

    fn touching(&self, variable: VariableId) -> impl Iterator<Item = ConstraintId> + '_ {
        self.variables[variable.0]
            .constraints()
            .iter()
            .chain(self.global_constraints.iter())
            .copied()
    }

    fn hard_touching(&self, variable: VariableId) -> impl Iterator<Item = ConstraintId> + '_ {
        self.variables[variable.0]
            .hard_constraints()
            .iter()
            .copied()
            .chain(
                self.global_constraints
                    .iter()
                    .copied()
                    .filter(|&c| self.constraints[c.0].is_hard()),
            )
    }

    /// Values that would conflict with assigning `value`: the union over the
    /// hard constraints of its variable and all hard global constraints.
    pub fn conflict_values(&self, assignment: &Assignment, value: ValueId) -> ConflictSet {
        let mut conflicts = ConflictSet::new();
        let variable = self.value(value).variable();
        for constraint in self.hard_touching(variable) {
            self.constraints[constraint.0].compute_conflicts(self, assignment, value, &mut conflicts);
        }
        conflicts
    }

    /// Returns true if assigning `value` would create any conflict.
    pub fn in_conflict(&self, assignment: &Assignment, value: ValueId) -> bool {
        let variable = self.value(value).variable();
        self.hard_touching(variable)
            .any(|c| self.constraints[c.0].in_conflict(self, assignment, value))
    }

    fn notify<F>(&self, assignment: &mut Assignment, variable: VariableId, f: F)
    where
        F: Fn(&dyn Constraint<P>, &Assignment, &mut ContextSlot),
    {
        for constraint in self.touching(variable) {
            let mut slot = assignment.take_context(constraint);
            f(self.constraints[constraint.0].as_ref(), &*assignment, &mut slot);
            assignment.put_context(constraint, slot);
        }
    }

    /// Assigns `value` to its variable at `iteration`.
    ///
    /// A different current value is unassigned first. Returns the previous
    /// value of the variable. Conflicting values of other variables are not
    /// touched; see [`Model::assign_resolving`].
    pub fn assign(&self, assignment: &mut Assignment, iteration: u64, value: ValueId) -> Option<ValueId> {
        let variable = self.value(value).variable();
        let previous = assignment.value(variable);
        if previous == Some(value) {
            return previous;
        }
        if previous.is_some() {
            self.unassign(assignment, iteration, variable);
        }

        for (i, criterion) in self.criteria.iter().enumerate() {
            let delta = criterion.value(self, assignment, value, None);
            assignment.inc_criterion(CriterionId(i), delta);
        }
        self.notify(assignment, variable, |c, a, slot| {
            c.before_assigned(self, a, slot, iteration, value)
        });
        assignment.set_value(variable, Some(value), iteration);
        self.notify(assignment, variable, |c, a, slot| {
            c.after_assigned(self, a, slot, iteration, value)
        });
        previous
    }

    /// Unassigns a variable at `iteration`, returning its previous value.
    pub fn unassign(&self, assignment: &mut Assignment, iteration: u64, variable: VariableId) -> Option<ValueId> {
        let value = assignment.value(variable)?;
        for (i, criterion) in self.criteria.iter().enumerate() {
            let delta = criterion.value(self, assignment, value, None);
            assignment.inc_criterion(CriterionId(i), -delta);
        }
        self.notify(assignment, variable, |c, a, slot| {
            c.before_unassigned(self, a, slot, iteration, value)
        });
        assignment.set_value(variable, None, iteration);
        self.notify(assignment, variable, |c, a, slot| {
            c.after_unassigned(self, a, slot, iteration, value)
        });
        Some(value)
    }

    /// Unassigns every value conflicting with `value`, then assigns it.
    /// Returns the conflicts that were unassigned.
    pub fn assign_resolving(&self, assignment: &mut Assignment, iteration: u64, value: ValueId) -> ConflictSet {
        let conflicts = self.conflict_values(assignment, value);
        for &conflict in &conflicts {
            self.unassign(assignment, iteration, self.value(conflict).variable());
        }
        self.assign(assignment, iteration, value);
        conflicts
    }

    /// Total value of the assignment: the weighted sum of all criteria, or the
    /// sum of the assigned values' costs when the model has no criteria.
    pub fn total_value(&self, assignment: &Assignment) -> f64 {
        if self.criteria.is_empty() {
            assignment
                .assigned_values()
                .map(|v| self.value(v).to_double(assignment))
                .sum()
        } else {
            self.criteria
                .iter()
                .enumerate()
                .map(|(i, c)| c.weight() * assignment.criterion_total(CriterionId(i)))
                .sum()
        }
    }

    /// Variables whose current value differs from their initial value.
    ///
    /// With `include_unassigned`, unassigned variables whose initial value is
    /// blocked by a conflict are included as well.
    pub fn perturb_variables(&self, assignment: &Assignment, include_unassigned: bool) -> Vec<VariableId> {
        self.with_initial
            .iter()
            .copied()
            .filter(|&variable| {
                let Some(initial) = self.variable(variable).initial_value() else {
                    return false;
                };
                match assignment.value(variable) {
                    Some(value) => value != initial,
                    None => include_unassigned && self.in_conflict(assignment, initial),
                }
            })
            .collect()
    }

    /// Summary of the assignment for logging.
    pub fn info(&self, assignment: &Assignment) -> BTreeMap<String, String> {
        let mut info = BTreeMap::new();
        let assigned = assignment.nr_assigned_variables();
        let total = self.variables.len();
        let percent = if total == 0 {
            100.0
        } else {
            100.0 * assigned as f64 / total as f64
        };
        info.insert(
            "Assigned variables".to_string(),
            format!("{percent:.2}% ({assigned}/{total})"),
        );
        info.insert(
            "Overall solution value".to_string(),
            format!("{:.2}", self.total_value(assignment)),
        );
        for (i, criterion) in self.criteria.iter().enumerate() {
            let value = assignment.criterion_total(CriterionId(i));
            if value != 0.0 {
                info.insert(criterion.name().to_string(), format!("{value:.2}"));
            }
        }
        info
    }
}

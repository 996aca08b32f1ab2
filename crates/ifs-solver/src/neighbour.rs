//! Neighbours: atomic proposed changes of an assignment.
//!
//! A neighbour knows its cost delta ([`Neighbour::value`]) and how to apply
//! itself ([`Neighbour::assign`]). Lazy neighbours cannot price themselves
//! up front; searches apply them speculatively, measure the change of the
//! total value, and [`undo`](Neighbour::undo) them when rejected.

use std::fmt::{self, Debug};

use smallvec::SmallVec;

use ifs_core::{Assignment, ConflictSet, Model, Trail, ValueData, ValueId, VariableId};

/// A proposed change of an assignment.
pub trait Neighbour<P: ValueData>: Send + Debug {
    /// Applies the change at `iteration`.
    fn assign(&mut self, model: &Model<P>, assignment: &mut Assignment, iteration: u64);

    /// Change of the total value the move causes; negative values improve.
    fn value(&self, model: &Model<P>, assignment: &Assignment) -> f64;

    /// Variables the move assigns, with their new values.
    fn assignments(&self) -> Vec<(VariableId, ValueId)>;

    /// Lazy neighbours are priced by applying them.
    fn is_lazy(&self) -> bool {
        false
    }

    /// Reverts a change applied by [`assign`](Neighbour::assign), for
    /// neighbours that record one. Others ignore the call.
    fn undo(&mut self, _model: &Model<P>, _assignment: &mut Assignment) {}
}

/// Cost delta of assigning `value` after unassigning `conflicts`.
///
/// Uses the weighted criteria when the model has any, otherwise the values'
/// own costs. The current value of the variable is charged as removed.
pub fn assignment_delta<P: ValueData>(
    model: &Model<P>,
    assignment: &Assignment,
    value: ValueId,
    conflicts: &ConflictSet,
) -> f64 {
    let variable = model.value(value).variable();
    let old = assignment
        .value(variable)
        .filter(|old| *old != value && !conflicts.contains(old));

    if model.criteria().is_empty() {
        let mut delta = model.value(value).to_double(assignment);
        if let Some(old) = old {
            delta -= model.value(old).to_double(assignment);
        }
        for &conflict in conflicts {
            delta -= model.value(conflict).to_double(assignment);
        }
        return delta;
    }

    model
        .criteria()
        .iter()
        .map(|criterion| {
            let mut delta = criterion.weighted_value(model, assignment, value, Some(conflicts));
            if let Some(old) = old {
                delta -= criterion.weighted_value(model, assignment, old, None);
            }
            for &conflict in conflicts {
                delta -= criterion.weighted_value(model, assignment, conflict, None);
            }
            delta
        })
        .sum()
}

/// Assigns one value, unassigning whatever conflicts with it.
#[derive(Debug, Clone)]
pub struct SimpleNeighbour {
    variable: VariableId,
    value: ValueId,
    conflicts: Option<ConflictSet>,
}

impl SimpleNeighbour {
    pub fn new(variable: VariableId, value: ValueId) -> Self {
        Self {
            variable,
            value,
            conflicts: None,
        }
    }

    /// Creates a neighbour with its conflicts already computed.
    pub fn with_conflicts(variable: VariableId, value: ValueId, conflicts: ConflictSet) -> Self {
        Self {
            variable,
            value,
            conflicts: Some(conflicts),
        }
    }

    pub fn variable(&self) -> VariableId {
        self.variable
    }

    pub fn new_value(&self) -> ValueId {
        self.value
    }

    pub fn conflicts(&self) -> Option<&ConflictSet> {
        self.conflicts.as_ref()
    }
}

impl<P: ValueData> Neighbour<P> for SimpleNeighbour {
    fn assign(&mut self, model: &Model<P>, assignment: &mut Assignment, iteration: u64) {
        match &self.conflicts {
            Some(conflicts) => {
                for &conflict in conflicts {
                    let variable = model.value(conflict).variable();
                    if assignment.is_assigned(variable, conflict) {
                        model.unassign(assignment, iteration, variable);
                    }
                }
                model.assign(assignment, iteration, self.value);
            }
            None => {
                model.assign_resolving(assignment, iteration, self.value);
            }
        }
    }

    fn value(&self, model: &Model<P>, assignment: &Assignment) -> f64 {
        match &self.conflicts {
            Some(conflicts) => assignment_delta(model, assignment, self.value, conflicts),
            None => {
                let conflicts = model.conflict_values(assignment, self.value);
                assignment_delta(model, assignment, self.value, &conflicts)
            }
        }
    }

    fn assignments(&self) -> Vec<(VariableId, ValueId)> {
        vec![(self.variable, self.value)]
    }
}

/// Reassigns several variables at once with a precomputed delta.
#[derive(Clone)]
pub struct SwapNeighbour {
    values: SmallVec<[ValueId; 4]>,
    variables: SmallVec<[VariableId; 4]>,
    value: f64,
}

impl SwapNeighbour {
    /// Creates a swap from `(variable, new value)` pairs.
    pub fn new(assignments: impl IntoIterator<Item = (VariableId, ValueId)>, value: f64) -> Self {
        let (variables, values) = assignments.into_iter().unzip();
        Self {
            values,
            variables,
            value,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Debug for SwapNeighbour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Swap{{{:.2}:", self.value)?;
        for (variable, value) in self.variables.iter().zip(&self.values) {
            write!(f, " {variable}={value}")?;
        }
        write!(f, "}}")
    }
}

impl<P: ValueData> Neighbour<P> for SwapNeighbour {
    fn assign(&mut self, model: &Model<P>, assignment: &mut Assignment, iteration: u64) {
        for &variable in &self.variables {
            model.unassign(assignment, iteration, variable);
        }
        for &value in &self.values {
            model.assign(assignment, iteration, value);
        }
    }

    fn value(&self, _model: &Model<P>, _assignment: &Assignment) -> f64 {
        self.value
    }

    fn assignments(&self) -> Vec<(VariableId, ValueId)> {
        self.variables.iter().copied().zip(self.values.iter().copied()).collect()
    }
}

/// Lazy change: assigns a batch of values, resolving conflicts, and records
/// the steps so a rejected change can be undone.
#[derive(Debug, Default)]
pub struct LazyChange {
    values: SmallVec<[(VariableId, ValueId); 4]>,
    trail: Trail,
}

impl LazyChange {
    pub fn new<P: ValueData>(model: &Model<P>, values: impl IntoIterator<Item = ValueId>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|value| (model.value(value).variable(), value))
                .collect(),
            trail: Trail::new(),
        }
    }
}

impl<P: ValueData> Neighbour<P> for LazyChange {
    fn assign(&mut self, model: &Model<P>, assignment: &mut Assignment, iteration: u64) {
        for &(_, value) in &self.values {
            self.trail.assign_resolving(model, assignment, iteration, value);
        }
    }

    fn value(&self, _model: &Model<P>, _assignment: &Assignment) -> f64 {
        0.0
    }

    fn assignments(&self) -> Vec<(VariableId, ValueId)> {
        self.values.to_vec()
    }

    fn is_lazy(&self) -> bool {
        true
    }

    fn undo(&mut self, model: &Model<P>, assignment: &mut Assignment) {
        self.trail.rollback_all(model, assignment);
    }
}

/// A lazy neighbour that was applied and accepted during search.
///
/// Assigning it again is a no-op; [`undo`](Neighbour::undo) still reverts
/// the recorded change.
#[derive(Debug)]
pub struct AppliedNeighbour<P: ValueData> {
    inner: Box<dyn Neighbour<P>>,
    value: f64,
}

impl<P: ValueData> AppliedNeighbour<P> {
    pub fn new(inner: Box<dyn Neighbour<P>>, value: f64) -> Self {
        Self { inner, value }
    }
}

impl<P: ValueData> Neighbour<P> for AppliedNeighbour<P> {
    fn assign(&mut self, _model: &Model<P>, _assignment: &mut Assignment, _iteration: u64) {}

    fn value(&self, _model: &Model<P>, _assignment: &Assignment) -> f64 {
        self.value
    }

    fn assignments(&self) -> Vec<(VariableId, ValueId)> {
        self.inner.assignments()
    }

    fn undo(&mut self, model: &Model<P>, assignment: &mut Assignment) {
        self.inner.undo(model, assignment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifs_test::{coloring_model, PairScenario};

    #[test]
    fn test_simple_neighbour_unassigns_conflicts() {
        let pair = PairScenario::new();
        let model = &pair.model;
        let mut assignment = model.create_assignment(0);
        model.assign(&mut assignment, 1, pair.value(pair.a, 1));

        let mut neighbour = SimpleNeighbour::new(pair.b, pair.value(pair.b, 1));
        Neighbour::<i64>::assign(&mut neighbour, model, &mut assignment, 2);

        assert_eq!(assignment.value(pair.a), None);
        assert_eq!(assignment.value(pair.b), Some(pair.value(pair.b, 1)));
    }

    #[test]
    fn test_delta_with_criterion() {
        let model = coloring_model(2, 3, &[(0, 1)]);
        let mut assignment = model.create_assignment(0);
        let n0 = model.variables()[0].values().to_vec();
        let n1 = model.variables()[1].values().to_vec();
        model.assign(&mut assignment, 1, n0[2]);
        model.assign(&mut assignment, 1, n1[1]);

        // 2 -> 0 on node 0 saves two
        let cheaper = SimpleNeighbour::new(model.variables()[0].id(), n0[0]);
        assert_eq!(Neighbour::<u32>::value(&cheaper, &model, &assignment), -2.0);

        // taking colour 1 bumps node 1 (1) and drops colour 2
        let bumping = SimpleNeighbour::new(model.variables()[0].id(), n0[1]);
        assert_eq!(Neighbour::<u32>::value(&bumping, &model, &assignment), -2.0);
    }

    #[test]
    fn test_swap_neighbour_assigns_all() {
        let pair = PairScenario::new();
        let model = &pair.model;
        let mut assignment = model.create_assignment(0);
        model.assign(&mut assignment, 1, pair.value(pair.a, 1));
        model.assign(&mut assignment, 1, pair.value(pair.b, 0));

        let mut swap = SwapNeighbour::new(
            [
                (pair.a, pair.value(pair.a, 0)),
                (pair.b, pair.value(pair.b, 1)),
            ],
            0.0,
        );
        Neighbour::<i64>::assign(&mut swap, model, &mut assignment, 2);

        assert_eq!(assignment.value(pair.a), Some(pair.value(pair.a, 0)));
        assert_eq!(assignment.value(pair.b), Some(pair.value(pair.b, 1)));
        assert_eq!(Neighbour::<i64>::assignments(&swap).len(), 2);
    }

    #[test]
    fn test_lazy_change_undo() {
        let pair = PairScenario::new();
        let model = &pair.model;
        let mut assignment = model.create_assignment(0);
        let a1 = pair.value(pair.a, 1);
        model.assign(&mut assignment, 1, a1);

        let mut lazy = LazyChange::new(model, [pair.value(pair.b, 1)]);
        assert!(Neighbour::<i64>::is_lazy(&lazy));
        Neighbour::<i64>::assign(&mut lazy, model, &mut assignment, 5);
        assert_eq!(assignment.value(pair.a), None);

        Neighbour::<i64>::undo(&mut lazy, model, &mut assignment);
        assert_eq!(assignment.value(pair.a), Some(a1));
        assert_eq!(assignment.value(pair.b), None);
        assert_eq!(assignment.iteration(pair.a), 1);
    }
}

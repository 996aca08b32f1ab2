//! Constraint trait and per-assignment context storage.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::{self, Debug};
use std::marker::PhantomData;

use super::{Model, ValueData, ValueId, VariableId};
use crate::assignment::Assignment;

/// Unique identifier of a constraint within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintId(pub(crate) usize);

impl ConstraintId {
    /// Creates an id from a raw arena index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Set of conflicting values, ordered by value id.
pub type ConflictSet = BTreeSet<ValueId>;

/// Derived state a constraint keeps for one assignment.
///
/// Implemented for every `Debug + Send + Sync + 'static` type; constraints
/// downcast through [`ContextSlot::get`] and [`ContextSlot::get_mut`].
pub trait ConstraintContext: Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Debug + Send + Sync + 'static> ConstraintContext for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Storage slot for one constraint's context inside an assignment.
#[derive(Debug, Default)]
pub struct ContextSlot(Option<Box<dyn ConstraintContext>>);

impl ContextSlot {
    /// An empty slot, used by constraints without derived state.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wraps a context.
    pub fn new<T: ConstraintContext>(context: T) -> Self {
        Self(Some(Box::new(context)))
    }

    /// Returns true if no context is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Downcasts the stored context.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|c| c.as_any().downcast_ref())
    }

    /// Downcasts the stored context mutably.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0.as_deref_mut().and_then(|c| c.as_any_mut().downcast_mut())
    }

    pub(crate) fn take(&mut self) -> Self {
        Self(self.0.take())
    }
}

/// A relation over a fixed set of variables.
///
/// Constraints are shared by every assignment over the model, so anything
/// derived from the current values must live in the [`ContextSlot`] the
/// assignment hands to the notification hooks.
///
/// # Contract
///
/// `compute_conflicts` adds exactly the currently assigned values that would
/// become inconsistent if `value` were assigned. It must not add `value`
/// itself unless the value is inconsistent on its own.
pub trait Constraint<P: ValueData>: Send + Sync + Debug {
    /// Human readable name.
    fn name(&self) -> &str {
        "Constraint"
    }

    /// Variables related by this constraint. Empty for global constraints.
    fn variables(&self) -> &[VariableId];

    /// Hard constraints take part in conflict computation.
    fn is_hard(&self) -> bool {
        true
    }

    /// Adds the values that would conflict with `value` to `conflicts`.
    fn compute_conflicts(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        value: ValueId,
        conflicts: &mut ConflictSet,
    );

    /// Returns true if assigning `value` would create any conflict.
    fn in_conflict(&self, model: &Model<P>, assignment: &Assignment, value: ValueId) -> bool {
        let mut conflicts = ConflictSet::new();
        self.compute_conflicts(model, assignment, value, &mut conflicts);
        !conflicts.is_empty()
    }

    /// Returns true if the two values may be assigned together.
    fn is_consistent(&self, _model: &Model<P>, _first: ValueId, _second: ValueId) -> bool {
        true
    }

    /// Creates the context this constraint keeps for a new assignment.
    fn create_context(&self, _model: &Model<P>, _assignment: &Assignment) -> ContextSlot {
        ContextSlot::empty()
    }

    fn before_assigned(
        &self,
        _model: &Model<P>,
        _assignment: &Assignment,
        _context: &mut ContextSlot,
        _iteration: u64,
        _value: ValueId,
    ) {
    }

    fn after_assigned(
        &self,
        _model: &Model<P>,
        _assignment: &Assignment,
        _context: &mut ContextSlot,
        _iteration: u64,
        _value: ValueId,
    ) {
    }

    fn before_unassigned(
        &self,
        _model: &Model<P>,
        _assignment: &Assignment,
        _context: &mut ContextSlot,
        _iteration: u64,
        _value: ValueId,
    ) {
    }

    fn after_unassigned(
        &self,
        _model: &Model<P>,
        _assignment: &Assignment,
        _context: &mut ContextSlot,
        _iteration: u64,
        _value: ValueId,
    ) {
    }
}

/// A binary constraint defined by a consistency predicate over payloads.
///
/// # Example
///
/// ```
/// use ifs_core::{BinaryConstraint, ModelBuilder};
///
/// let mut builder = ModelBuilder::<i64>::new();
/// let a = builder.add_variable("A", [0, 1]);
/// let b = builder.add_variable("B", [0, 1]);
/// builder.add_constraint(BinaryConstraint::new("not both", a, b, |x: &i64, y: &i64| {
///     !(*x == 1 && *y == 1)
/// }));
/// let model = builder.build().unwrap();
/// assert_eq!(model.constraints().len(), 1);
/// ```
pub struct BinaryConstraint<P, F> {
    name: String,
    variables: [VariableId; 2],
    consistent: F,
    _phantom: PhantomData<fn() -> P>,
}

impl<P, F> BinaryConstraint<P, F>
where
    P: ValueData,
    F: Fn(&P, &P) -> bool + Send + Sync,
{
    /// Creates a constraint over `first` and `second`; `consistent` receives
    /// the payloads in that order.
    pub fn new(name: impl Into<String>, first: VariableId, second: VariableId, consistent: F) -> Self {
        Self {
            name: name.into(),
            variables: [first, second],
            consistent,
            _phantom: PhantomData,
        }
    }

    fn check(&self, model: &Model<P>, a: ValueId, b: ValueId) -> bool {
        let (va, vb) = (model.value(a), model.value(b));
        if va.variable() == self.variables[0] {
            (self.consistent)(va.data(), vb.data())
        } else {
            (self.consistent)(vb.data(), va.data())
        }
    }
}

impl<P, F> Debug for BinaryConstraint<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryConstraint")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .finish()
    }
}

impl<P, F> Constraint<P> for BinaryConstraint<P, F>
where
    P: ValueData,
    F: Fn(&P, &P) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    fn compute_conflicts(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        value: ValueId,
        conflicts: &mut ConflictSet,
    ) {
        let variable = model.value(value).variable();
        let other = if variable == self.variables[0] {
            self.variables[1]
        } else {
            self.variables[0]
        };
        if other == variable {
            return;
        }
        if let Some(current) = assignment.value(other) {
            if !self.check(model, value, current) {
                conflicts.insert(current);
            }
        }
    }

    fn is_consistent(&self, model: &Model<P>, first: ValueId, second: ValueId) -> bool {
        self.check(model, first, second)
    }
}

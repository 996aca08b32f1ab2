//! Variable definitions

use std::fmt;

use smallvec::SmallVec;

use super::{ConstraintId, ValueId};

/// Unique identifier of a variable within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableId(pub(crate) usize);

impl VariableId {
    /// Creates an id from a raw arena index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// An assignable slot with a finite domain of values.
///
/// The variable itself is immutable once the model is built; its current
/// value lives in an [`Assignment`](crate::Assignment).
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    name: String,
    values: Vec<ValueId>,
    initial: Option<ValueId>,
    constraints: SmallVec<[ConstraintId; 4]>,
    hard_constraints: SmallVec<[ConstraintId; 4]>,
}

impl Variable {
    pub(crate) fn new(id: VariableId, name: String) -> Self {
        Self {
            id,
            name,
            values: Vec::new(),
            initial: None,
            constraints: SmallVec::new(),
            hard_constraints: SmallVec::new(),
        }
    }

    /// Returns the variable id.
    pub fn id(&self) -> VariableId {
        self.id
    }

    /// Returns the variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the domain of this variable.
    pub fn values(&self) -> &[ValueId] {
        &self.values
    }

    /// Returns the initial value used by minimal perturbation search.
    pub fn initial_value(&self) -> Option<ValueId> {
        self.initial
    }

    /// Returns every non-global constraint that references this variable.
    pub fn constraints(&self) -> &[ConstraintId] {
        &self.constraints
    }

    /// Returns the hard subset of [`Variable::constraints`].
    pub fn hard_constraints(&self) -> &[ConstraintId] {
        &self.hard_constraints
    }

    pub(crate) fn push_value(&mut self, value: ValueId) {
        self.values.push(value);
    }

    pub(crate) fn set_initial(&mut self, value: Option<ValueId>) {
        self.initial = value;
    }

    pub(crate) fn attach(&mut self, constraint: ConstraintId, hard: bool) {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
            if hard {
                self.hard_constraints.push(constraint);
            }
        }
    }
}

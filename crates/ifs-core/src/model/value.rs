//! Values: points in a variable's domain.

use std::fmt::{self, Debug};

use super::VariableId;
use crate::assignment::Assignment;

/// Unique identifier of a value within a model.
///
/// Two values are equal iff their ids are equal; the id is also the
/// tie-break of the total order used for conflict sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    /// Creates an id from a raw arena index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Domain payload carried by a value.
///
/// `to_double` is the value's cost contribution, summed into the model's
/// total value when the model has no criteria.
pub trait ValueData: Debug + Send + Sync + 'static {
    /// Cost contribution of this value under the given assignment.
    fn to_double(&self, _assignment: &Assignment) -> f64 {
        0.0
    }
}

impl ValueData for () {}

impl ValueData for f64 {
    fn to_double(&self, _assignment: &Assignment) -> f64 {
        *self
    }
}

macro_rules! integer_value_data {
    ($($t:ty),*) => {
        $(
            impl ValueData for $t {
                fn to_double(&self, _assignment: &Assignment) -> f64 {
                    *self as f64
                }
            }
        )*
    };
}

integer_value_data!(i32, i64, u32, u64, usize);

/// An immutable point in a variable's domain.
#[derive(Debug)]
pub struct Value<P> {
    id: ValueId,
    variable: VariableId,
    data: P,
}

impl<P: ValueData> Value<P> {
    pub(crate) fn new(id: ValueId, variable: VariableId, data: P) -> Self {
        Self { id, variable, data }
    }

    /// Returns the value id.
    pub fn id(&self) -> ValueId {
        self.id
    }

    /// Returns the variable whose domain holds this value.
    pub fn variable(&self) -> VariableId {
        self.variable
    }

    /// Returns the domain payload.
    pub fn data(&self) -> &P {
        &self.data
    }

    /// Cost contribution of this value.
    pub fn to_double(&self, assignment: &Assignment) -> f64 {
        self.data.to_double(assignment)
    }
}

impl<P> PartialEq for Value<P> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<P> Eq for Value<P> {}

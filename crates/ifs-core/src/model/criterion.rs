//! Optimization criteria composed into the model's total value.

use std::fmt::Debug;

use super::{ConflictSet, Model, ValueData, ValueId};
use crate::assignment::Assignment;

/// Unique identifier of a criterion within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CriterionId(pub(crate) usize);

impl CriterionId {
    /// Creates an id from a raw arena index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A scalar objective term.
///
/// The model keeps a running total per criterion and assignment: `value` of
/// a value is added right before it is assigned and subtracted right before
/// it is unassigned. `value` must therefore treat the value's own variable as
/// if it were unassigned.
pub trait Criterion<P: ValueData>: Send + Sync + Debug {
    /// Name used in info maps.
    fn name(&self) -> &str;

    /// Weight applied to the raw value.
    fn weight(&self) -> f64 {
        1.0
    }

    /// Contribution of `value` if it were assigned. When `conflicts` is given,
    /// the conflicting values are considered unassigned.
    fn value(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        value: ValueId,
        conflicts: Option<&ConflictSet>,
    ) -> f64;

    /// Weighted contribution of `value`.
    fn weighted_value(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        value: ValueId,
        conflicts: Option<&ConflictSet>,
    ) -> f64 {
        self.weight() * self.value(model, assignment, value, conflicts)
    }

    /// Lower and upper bound of the criterion over the whole model.
    ///
    /// Defaults to the sum, over all variables, of the smallest and largest
    /// contribution among the variable's values.
    fn bounds(&self, model: &Model<P>, assignment: &Assignment) -> (f64, f64) {
        let mut bounds = (0.0, 0.0);
        for variable in model.variables() {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &value in variable.values() {
                let v = self.value(model, assignment, value, None);
                min = min.min(v);
                max = max.max(v);
            }
            if min.is_finite() {
                bounds.0 += min;
                bounds.1 += max;
            }
        }
        bounds
    }
}

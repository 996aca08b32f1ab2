//! IFS Core - model and assignment types for iterative forward search
//!
//! This crate provides the problem representation shared by every search
//! strategy:
//! - [`Model`]: arena of variables, values, constraints and criteria
//! - [`Assignment`]: mutable variable→value state with per-constraint contexts
//! - [`Constraint`] / [`Criterion`]: capability traits implemented by domain code
//! - [`Trail`]: undo log for speculative in-place exploration
//!
//! # Example
//!
//! ```
//! use ifs_core::{BinaryConstraint, ModelBuilder};
//!
//! let mut builder = ModelBuilder::<i64>::new();
//! let a = builder.add_variable("A", [0, 1]);
//! let b = builder.add_variable("B", [0, 1]);
//! builder.add_constraint(BinaryConstraint::new("A=1 forbids B=1", a, b, |x: &i64, y: &i64| {
//!     !(*x == 1 && *y == 1)
//! }));
//! let model = builder.build().unwrap();
//!
//! let mut assignment = model.create_assignment(0);
//! let a1 = model.variable(a).values()[1];
//! let b1 = model.variable(b).values()[1];
//! model.assign(&mut assignment, 1, a1);
//!
//! let conflicts = model.conflict_values(&assignment, b1);
//! assert!(conflicts.contains(&a1));
//! ```

pub mod assignment;
pub mod error;
pub mod model;
pub mod trail;

#[cfg(test)]
mod tests;

pub use assignment::{Assignment, VariableSet};
pub use error::{IfsError, Result};
pub use model::{
    BinaryConstraint, ConflictSet, Constraint, ConstraintContext, ConstraintId, ContextSlot,
    Criterion, CriterionId, Model, ModelBuilder, Value, ValueData, ValueId, Variable, VariableId,
};
pub use trail::Trail;

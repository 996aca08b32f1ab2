//! IFS - an iterative forward search constraint solver.
//!
//! Build a [`Model`] from variables, constraints and criteria, then hand it
//! to [`run_solver`] or drive a [`Solver`] yourself.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ifs::prelude::*;
//!
//! let mut builder = ModelBuilder::new();
//! let a = builder.add_variable("A", [0i64, 1]);
//! let b = builder.add_variable("B", [0i64, 1]);
//! builder.add_constraint(BinaryConstraint::new("not both", a, b, |x: &i64, y: &i64| {
//!     !(*x == 1 && *y == 1)
//! }));
//! let model = Arc::new(builder.build().unwrap());
//!
//! let properties = DataProperties::new().with("General.Seed", 1);
//! let solution = ifs::run_solver_with(model, properties).unwrap();
//! assert!(solution.is_complete());
//! ```

pub use ifs_config::{ConfigError, DataProperties, GeneralConfig, TerminationConfig};
pub use ifs_core::{
    Assignment, BinaryConstraint, ConflictSet, Constraint, ConstraintContext, ConstraintId,
    Criterion, CriterionId, IfsError, Model, ModelBuilder, Result, Value, ValueData, ValueId,
    Variable, VariableId,
};
pub use ifs_solver::{
    search, selection, termination, BestRecord, ConflictStatistics, NeighbourSelection,
    ParallelOutcome, ParallelSolver, SelectionRegistry, SolutionListener, SolveStatistics, Solver,
    SolverListener, Solution,
};

#[cfg(feature = "console")]
pub mod console;

mod solver;
pub use solver::{run_solver, run_solver_with};

pub mod prelude {
    pub use super::{
        BinaryConstraint, Constraint, Criterion, DataProperties, Model, ModelBuilder, Solution,
        Solver, ValueData, ValueId, VariableId,
    };
}

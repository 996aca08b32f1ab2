//! N-Queens test fixtures.
//!
//! Queen `i` sits in column `i`; its variable chooses the row. Every pair of
//! queens is related by a binary constraint forbidding a shared row or
//! diagonal.
//!
//! # Example
//!
//! ```
//! use ifs_test::queens::{count_attacks, queens_model};
//!
//! let model = queens_model(4);
//! let mut assignment = model.create_assignment(0);
//! for (column, row) in [1, 3, 0, 2].into_iter().enumerate() {
//!     let value = model.variables()[column].values()[row];
//!     model.assign(&mut assignment, 1, value);
//! }
//! assert_eq!(count_attacks(&model, &assignment), 0);
//! ```

use ifs_core::{Assignment, BinaryConstraint, Model, ModelBuilder, VariableId};

/// Adds `n` queen variables and their pairwise constraints to a builder.
pub fn add_queens(builder: &mut ModelBuilder<usize>, n: usize) -> Vec<VariableId> {
    let queens: Vec<VariableId> = (0..n)
        .map(|column| builder.add_variable(format!("Q{column}"), 0..n))
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let distance = j - i;
            builder.add_constraint(BinaryConstraint::new(
                format!("Q{i}-Q{j}"),
                queens[i],
                queens[j],
                move |a: &usize, b: &usize| a != b && a.abs_diff(*b) != distance,
            ));
        }
    }
    queens
}

/// Builds an `n`-queens model.
///
/// # Panics
///
/// Panics if the model fails validation, which cannot happen for the
/// constraints added here.
pub fn queens_model(n: usize) -> Model<usize> {
    let mut builder = ModelBuilder::new();
    add_queens(&mut builder, n);
    builder.build().expect("queens model is valid")
}

/// Number of attacking pairs among the assigned queens.
pub fn count_attacks(model: &Model<usize>, assignment: &Assignment) -> usize {
    let rows: Vec<(usize, usize)> = model
        .variables()
        .iter()
        .enumerate()
        .filter_map(|(column, variable)| {
            assignment
                .value(variable.id())
                .map(|value| (column, *model.value(value).data()))
        })
        .collect();

    let mut attacks = 0;
    for (i, &(c1, r1)) in rows.iter().enumerate() {
        for &(c2, r2) in &rows[i + 1..] {
            if r1 == r2 || r1.abs_diff(r2) == c1.abs_diff(c2) {
                attacks += 1;
            }
        }
    }
    attacks
}

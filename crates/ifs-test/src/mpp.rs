//! Minimal perturbation fixtures.

use ifs_core::{Model, ModelBuilder};

use crate::queens::add_queens;

/// N-Queens where queen `i` starts from `initial[i]` (row), if given.
///
/// # Panics
///
/// Panics if an initial row is outside `0..n`.
pub fn mpp_queens_model(n: usize, initial: &[Option<usize>]) -> Model<usize> {
    let mut builder = ModelBuilder::new();
    let queens = add_queens(&mut builder, n);
    for (&queen, row) in queens.iter().zip(initial) {
        if let Some(row) = *row {
            let value = builder.values_of(queen)[row];
            builder.set_initial_value(queen, Some(value));
        }
    }
    builder.build().expect("mpp model is valid")
}

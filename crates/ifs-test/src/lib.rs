//! Shared test fixtures for the IFS crates.
//!
//! This crate provides small ready-made models for testing. It depends on
//! `ifs-core` only, so solver crates can use it as a dev-dependency.
//!
//! - [`queens`] - N-Queens with one row variable per column
//! - [`pair`] - three 0/1 variables where `A = 1` and `B = 1` exclude each other
//! - [`coloring`] - graph colouring with a soft "lower colours are cheaper" criterion
//! - [`mpp`] - N-Queens with initial values for minimal perturbation search
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! ifs-test = { workspace = true }
//! ```
//!
//! ```
//! use ifs_test::queens::queens_model;
//!
//! let model = queens_model(4);
//! assert_eq!(model.nr_variables(), 4);
//! ```

pub mod coloring;
pub mod mpp;
pub mod pair;
pub mod queens;

pub use coloring::{coloring_model, cycle_edges, ColorIndex};
pub use mpp::mpp_queens_model;
pub use pair::PairScenario;
pub use queens::{count_attacks, queens_model};

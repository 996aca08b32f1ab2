//! Listeners for solution and solver events.
//!
//! [`SolutionListener`]s observe a [`Solution`]: every update and every
//! save, restore or clear of the best snapshot. [`SolverListener`]s see each
//! selected neighbour before it is applied and may veto it, and then every
//! value it assigned together with the values that assignment pushed out.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use ifs_solver::event::CountingListener;
//! use ifs_solver::Solution;
//! use ifs_test::queens_model;
//!
//! let listener = Arc::new(CountingListener::new());
//! let mut solution = Solution::new(Arc::new(queens_model(4)));
//! solution.add_listener(listener.clone());
//!
//! solution.update(0.1, true);
//! assert_eq!(listener.updated_count(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use ifs_core::{Assignment, Model, ValueData, ValueId};

use crate::neighbour::Neighbour;
use crate::solution::Solution;

/// Observer of a solution.
pub trait SolutionListener<P: ValueData>: Send + Sync + Debug {
    /// Called after every iteration.
    fn solution_updated(&self, _solution: &Solution<P>) {}

    /// Called after the best snapshot was saved.
    fn best_saved(&self, _solution: &Solution<P>) {}

    /// Called after the best snapshot was restored into the assignment.
    fn best_restored(&self, _solution: &Solution<P>) {}

    /// Called after the best snapshot was cleared.
    fn best_cleared(&self, _solution: &Solution<P>) {}

    /// Adds entries to the solution's info map.
    fn info(&self, _solution: &Solution<P>, _info: &mut BTreeMap<String, String>) {}
}

/// Observer of the solver loop.
pub trait SolverListener<P: ValueData>: Send + Sync + Debug {
    /// Called with each selected neighbour; returning false drops it.
    fn neighbour_selected(
        &self,
        _assignment: &Assignment,
        _iteration: u64,
        _neighbour: &dyn Neighbour<P>,
    ) -> bool {
        true
    }

    /// Called after a neighbour was applied, once per value it assigned,
    /// with the conflicting values of other variables it unassigned.
    fn neighbour_assigned(
        &self,
        _model: &Model<P>,
        _iteration: u64,
        _assigned: ValueId,
        _unassigned: &[ValueId],
    ) {
    }
}

/// Logs best-solution events at debug level.
#[derive(Debug, Clone, Default)]
pub struct LoggingListener {
    prefix: String,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl<P: ValueData> SolutionListener<P> for LoggingListener {
    fn best_saved(&self, solution: &Solution<P>) {
        debug!(
            "{}Best saved at iteration {}: value {:.2}, {} unassigned",
            self.prefix,
            solution.iteration(),
            solution.total_value(),
            solution.assignment().nr_unassigned_variables()
        );
    }

    fn best_restored(&self, solution: &Solution<P>) {
        debug!("{}Best restored at iteration {}", self.prefix, solution.iteration());
    }
}

/// Counts events, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CountingListener {
    updated: AtomicUsize,
    saved: AtomicUsize,
    restored: AtomicUsize,
    cleared: AtomicUsize,
}

impl CountingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updated_count(&self) -> usize {
        self.updated.load(Ordering::SeqCst)
    }

    pub fn saved_count(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }

    pub fn restored_count(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }

    pub fn cleared_count(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl<P: ValueData> SolutionListener<P> for CountingListener {
    fn solution_updated(&self, _solution: &Solution<P>) {
        self.updated.fetch_add(1, Ordering::SeqCst);
    }

    fn best_saved(&self, _solution: &Solution<P>) {
        self.saved.fetch_add(1, Ordering::SeqCst);
    }

    fn best_restored(&self, _solution: &Solution<P>) {
        self.restored.fetch_add(1, Ordering::SeqCst);
    }

    fn best_cleared(&self, _solution: &Solution<P>) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn info(&self, _solution: &Solution<P>, info: &mut BTreeMap<String, String>) {
        info.insert("Best saves".to_string(), self.saved_count().to_string());
    }
}

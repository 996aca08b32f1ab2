//! Minimal perturbation termination.

use ifs_core::ValueData;

use super::TerminationCondition;
use crate::solution::Solution;

/// Terminates once a complete assignment moves at most `limit` variables
/// away from their initial values.
#[derive(Debug, Clone)]
pub struct MinPerturbances {
    limit: usize,
}

impl MinPerturbances {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl<P: ValueData> TerminationCondition<P> for MinPerturbances {
    fn is_terminated(&self, solution: &Solution<P>) -> bool {
        solution.is_complete() && solution.perturbed_variables().len() <= self.limit
    }
}

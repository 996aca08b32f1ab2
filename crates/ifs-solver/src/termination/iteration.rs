//! Iteration count termination.

use ifs_core::ValueData;

use super::TerminationCondition;
use crate::solution::Solution;

/// Terminates after an iteration count.
///
/// # Example
///
/// ```
/// use ifs_solver::termination::MaxIterations;
///
/// // Terminate after 1000 iterations
/// let term = MaxIterations::new(1000);
/// assert_eq!(term.limit(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct MaxIterations {
    limit: u64,
}

impl MaxIterations {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl<P: ValueData> TerminationCondition<P> for MaxIterations {
    fn is_terminated(&self, solution: &Solution<P>) -> bool {
        solution.iteration() >= self.limit
    }
}

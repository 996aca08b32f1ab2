//! Completion termination.

use ifs_core::ValueData;

use super::TerminationCondition;
use crate::solution::Solution;

/// Terminates once every variable is assigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopWhenComplete;

impl<P: ValueData> TerminationCondition<P> for StopWhenComplete {
    fn is_terminated(&self, solution: &Solution<P>) -> bool {
        solution.is_complete()
    }
}

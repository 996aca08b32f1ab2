//! Termination conditions for the solver loop.

mod complete;
mod iteration;
mod perturbances;
mod time;

use std::fmt::Debug;

use ifs_config::TerminationConfig;
use ifs_core::ValueData;

use crate::solution::Solution;

pub use complete::StopWhenComplete;
pub use iteration::MaxIterations;
pub use perturbances::MinPerturbances;
pub use time::TimeOut;

/// Decides when the solver loop stops.
pub trait TerminationCondition<P: ValueData>: Send + Sync + Debug {
    /// Returns true if solving should stop.
    fn is_terminated(&self, solution: &Solution<P>) -> bool;
}

/// Stops as soon as any child condition stops.
#[derive(Debug)]
pub struct AnyTermination<P: ValueData> {
    conditions: Vec<Box<dyn TerminationCondition<P>>>,
}

impl<P: ValueData> AnyTermination<P> {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, condition: impl TerminationCondition<P> + 'static) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }

    pub fn push(&mut self, condition: Box<dyn TerminationCondition<P>>) {
        self.conditions.push(condition);
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Builds the conditions described by `Termination.*`.
    ///
    /// Without any configured limit the solver runs until the assignment is
    /// complete. `Termination.MinPerturbances` only applies in MPP mode.
    pub fn from_config(config: &TerminationConfig, mpp: bool) -> Self {
        let mut termination = Self::new();
        if config.stop_when_complete {
            termination.push(Box::new(StopWhenComplete));
        }
        if let Some(limit) = config.iteration_limit() {
            termination.push(Box::new(MaxIterations::new(limit)));
        }
        if let Some(limit) = config.time_limit() {
            termination.push(Box::new(TimeOut::new(limit)));
        }
        if mpp {
            if let Ok(limit) = usize::try_from(config.min_perturbances) {
                termination.push(Box::new(MinPerturbances::new(limit)));
            }
        }
        if termination.is_empty() {
            termination.push(Box::new(StopWhenComplete));
        }
        termination
    }
}

impl<P: ValueData> Default for AnyTermination<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ValueData> TerminationCondition<P> for AnyTermination<P> {
    fn is_terminated(&self, solution: &Solution<P>) -> bool {
        self.conditions.iter().any(|c| c.is_terminated(solution))
    }
}

#[cfg(test)]
mod tests;

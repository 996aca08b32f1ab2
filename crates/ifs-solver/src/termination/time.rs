//! Time-based termination.

use std::time::Duration;

use tracing::warn;

use ifs_core::ValueData;

use super::TerminationCondition;
use crate::solution::Solution;

/// Terminates once the solution's clock passes a limit.
///
/// The clock is the time recorded by the last [`Solution::update`], so the
/// check is cheap and restoring the best solution rewinds it.
#[derive(Debug, Clone)]
pub struct TimeOut {
    limit: Duration,
}

impl TimeOut {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// Limit in seconds. Negative values terminate immediately; values
    /// with no Duration equivalent (NaN, infinite) never terminate.
    pub fn seconds(seconds: f64) -> Self {
        match Duration::try_from_secs_f64(seconds.max(0.0)) {
            Ok(limit) => Self::new(limit),
            Err(e) => {
                warn!(seconds, "Time limit out of range, running without one: {e}");
                Self::new(Duration::MAX)
            }
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl<P: ValueData> TerminationCondition<P> for TimeOut {
    fn is_terminated(&self, solution: &Solution<P>) -> bool {
        solution.time() > self.limit.as_secs_f64()
    }
}

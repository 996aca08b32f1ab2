//! Hill climbing: accept only non-worsening neighbours.

use tracing::debug;

use ifs_config::DataProperties;
use ifs_core::ValueData;

use super::{best_or_current, SearchPolicy, SearchState};
use crate::solution::Solution;

/// Accepts neighbours with a delta of at most zero and gives up after
/// `HillClimber.MaxIdle` (10000) iterations without improving the best
/// value by at least one. Movers run in hill-climbing mode.
#[derive(Debug, Clone)]
pub struct HillClimbingAcceptance {
    max_idle: u64,
    last_improving: u64,
    best_value: Option<f64>,
}

impl HillClimbingAcceptance {
    pub fn max_idle(&self) -> u64 {
        self.max_idle
    }
}

impl SearchPolicy for HillClimbingAcceptance {
    const BASE_NAME: &'static str = "HillClimber";
    const DEFAULT_NEIGHBOURS: &'static str = "RandomMove;RandomSwapMove@0.01";
    const HC_MODE: bool = true;

    fn from_properties(properties: &DataProperties) -> Self {
        Self {
            max_idle: properties.get_u64("HillClimber.MaxIdle", 10_000),
            last_improving: 0,
            best_value: None,
        }
    }

    fn activate<P: ValueData>(&mut self, _state: &SearchState, _solution: &Solution<P>) {
        self.last_improving = 0;
    }

    fn can_continue<P: ValueData>(&self, state: &SearchState, _solution: &Solution<P>) -> bool {
        state.iteration + 1 - self.last_improving.min(state.iteration) < self.max_idle
    }

    fn inc_iteration<P: ValueData>(&mut self, state: &mut SearchState, solution: &mut Solution<P>) -> bool {
        let idle = state.iteration - self.last_improving.min(state.iteration);
        if self.max_idle > 0 {
            solution.progress().set_progress(100 * idle / self.max_idle);
        }
        if state.iteration % 1000 == 0 {
            debug!(
                iteration = state.iteration,
                idle,
                speed = format!("{:.2} it/s", state.speed()),
                value = solution.total_value(),
                "Hill climbing"
            );
            return true;
        }
        false
    }

    fn accept<P: ValueData>(
        &mut self,
        _state: &SearchState,
        _solution: &mut Solution<P>,
        value: f64,
        _total: f64,
    ) -> bool {
        value <= 0.0
    }

    fn best_saved<P: ValueData>(&mut self, state: &SearchState, solution: &Solution<P>) {
        let best = best_or_current(solution);
        if self.best_value.map_or(true, |previous| (previous - best).abs() >= 1.0) {
            self.last_improving = state.iteration;
            self.best_value = Some(best);
        }
    }
}

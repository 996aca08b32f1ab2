//! Great deluge: accept anything below a slowly falling water level.

use std::collections::BTreeMap;

use tracing::debug;

use ifs_config::DataProperties;
use ifs_core::ValueData;

use super::{adjusted_rate, best_or_current, SearchPolicy, SearchState};
use crate::solution::Solution;

/// Accepts a neighbour if it does not worsen the solution or if the
/// resulting total value stays below the bound.
///
/// The bound starts at `GreatDeluge.UpperBoundRate` (1.05) times the best
/// value and is multiplied by `GreatDeluge.CoolRate` (0.9999999) every
/// iteration; the rate of assignment `i` is adjusted by the `i - 1`th
/// entry of `GreatDeluge.CoolRateAdjustments`. Once the bound falls under
/// `LowerBoundRate^(1+idle)·best` it is raised back to
/// `max(best + 2, UpperBoundRate^(1+idle)·best)` and the idle counter
/// grows, widening the next round. An improvement of the best value by at
/// least one resets the idle counter. For negative best values the rates
/// apply inversely.
#[derive(Debug, Clone)]
pub struct DelugeSchedule {
    cool_rate: f64,
    upper_bound_rate: f64,
    lower_bound_rate: f64,
    cool_rate_adjustments: Option<Vec<Option<f64>>>,
    bound: f64,
    upper_bound: f64,
    idle: i32,
    moves: u64,
    accepted_moves: u64,
    last_improving: u64,
    best_value: Option<f64>,
}

impl DelugeSchedule {
    /// Current water level.
    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Number of times the bound was raised without an improvement.
    pub fn idle(&self) -> i32 {
        self.idle
    }

    fn scaled(best: f64, rate: f64, idle: i32) -> f64 {
        if best >= 0.0 {
            rate.powi(1 + idle) * best
        } else {
            best / rate.powi(1 + idle)
        }
    }
}

impl SearchPolicy for DelugeSchedule {
    const BASE_NAME: &'static str = "GreatDeluge";

    fn from_properties(properties: &DataProperties) -> Self {
        Self {
            cool_rate: properties.get_f64("GreatDeluge.CoolRate", 0.999_999_9),
            upper_bound_rate: properties.get_f64("GreatDeluge.UpperBoundRate", 1.05),
            lower_bound_rate: properties.get_f64("GreatDeluge.LowerBoundRate", 0.95),
            cool_rate_adjustments: properties.get_f64_list("GreatDeluge.CoolRateAdjustments"),
            bound: 0.0,
            upper_bound: 0.0,
            idle: 0,
            moves: 0,
            accepted_moves: 0,
            last_improving: 0,
            best_value: None,
        }
    }

    fn activate<P: ValueData>(&mut self, _state: &SearchState, solution: &Solution<P>) {
        let best = best_or_current(solution);
        self.idle = 0;
        self.last_improving = 0;
        self.bound = if best > 0.0 {
            self.upper_bound_rate * best
        } else {
            best / self.upper_bound_rate
        };
        self.upper_bound = self.bound;
    }

    fn inc_iteration<P: ValueData>(&mut self, state: &mut SearchState, solution: &mut Solution<P>) -> bool {
        let best = best_or_current(solution);
        let rate = adjusted_rate(
            self.cool_rate,
            self.cool_rate_adjustments.as_deref(),
            solution.assignment().index(),
        );
        if best >= 0.0 {
            self.bound *= rate;
        } else {
            self.bound /= rate;
        }

        let mut changed = false;
        if state.iteration % 10_000 == 0 {
            debug!(
                iteration = state.iteration,
                idle_iterations = state.iteration - self.last_improving.min(state.iteration),
                speed = format!("{:.2} it/s", state.speed()),
                bound = self.bound,
                best,
                value = solution.total_value(),
                idle = self.idle,
                acceptance = format!(
                    "{:.5}%",
                    100.0 * self.accepted_moves as f64 / self.moves.max(1) as f64
                ),
                "Great deluge"
            );
            self.accepted_moves = 0;
            self.moves = 0;
            changed = true;
        }

        let upper_bound = (best + 2.0).max(Self::scaled(best, self.upper_bound_rate, self.idle));
        let lower_bound = Self::scaled(best, self.lower_bound_rate, self.idle);
        if self.bound > upper_bound {
            self.bound = upper_bound;
        } else if self.bound < lower_bound {
            self.idle += 1;
            self.bound = upper_bound;
            self.upper_bound = self.bound;
            solution
                .progress()
                .set_phase(&format!("Great Deluge [{}]...", 1 + self.idle), 100);
            changed = true;
        }
        let span = self.upper_bound - lower_bound;
        if span > 0.0 {
            let done = 100.0 - (100.0 * (self.bound - lower_bound) / span).round();
            solution.progress().set_progress(done.clamp(0.0, 100.0) as u64);
        }
        changed
    }

    fn accept<P: ValueData>(
        &mut self,
        _state: &SearchState,
        _solution: &mut Solution<P>,
        value: f64,
        total: f64,
    ) -> bool {
        self.moves += 1;
        if value <= 0.0 || total < self.bound {
            self.accepted_moves += 1;
            return true;
        }
        false
    }

    fn best_saved<P: ValueData>(&mut self, state: &SearchState, solution: &Solution<P>) {
        let best = best_or_current(solution);
        if self.best_value.map_or(true, |previous| (previous - best).abs() >= 1.0) {
            self.last_improving = state.iteration;
            self.idle = 0;
            self.best_value = Some(best);
        }
    }

    fn info(&self, _state: &SearchState, info: &mut BTreeMap<String, String>) {
        info.insert("Great deluge bound".to_string(), format!("{:.2}", self.bound));
    }
}

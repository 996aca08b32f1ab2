//! A mover together with its selection weight and statistics.

use std::fmt::{self, Debug, Display};
use std::time::Instant;

use ifs_core::ValueData;

use crate::neighbour::Neighbour;
use crate::selection::NeighbourSelection;
use crate::solution::Solution;
use crate::statistics::SelectorStatistics;

/// Wraps a [`NeighbourSelection`] used as a mover by a neighbour search.
///
/// Movers are picked in proportion to their weight: the configured bonus,
/// or with adaptive points enabled, the bonus scaled by how often the mover
/// produced an accepted neighbour, `bonus·(accepted + 1)/(calls + 1)`.
pub struct NeighbourSelector<P: ValueData> {
    selection: Box<dyn NeighbourSelection<P>>,
    bonus: f64,
    update_points: bool,
    statistics: SelectorStatistics,
}

impl<P: ValueData> NeighbourSelector<P> {
    pub fn new(selection: Box<dyn NeighbourSelection<P>>, bonus: f64, update_points: bool) -> Self {
        Self {
            selection,
            bonus,
            update_points,
            statistics: SelectorStatistics::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.selection.name()
    }

    pub fn bonus(&self) -> f64 {
        self.bonus
    }

    /// Adaptive points of the mover.
    pub fn points(&self) -> f64 {
        let calls = self.statistics.calls as f64;
        let accepted = self.statistics.accepted as f64;
        self.bonus * (accepted + 1.0) / (calls + 1.0)
    }

    /// Weight used when picking a mover.
    pub fn weight(&self) -> f64 {
        if self.update_points {
            self.points()
        } else {
            self.bonus
        }
    }

    pub fn statistics(&self) -> &SelectorStatistics {
        &self.statistics
    }

    pub fn selection(&self) -> &dyn NeighbourSelection<P> {
        self.selection.as_ref()
    }

    pub fn selection_mut(&mut self) -> &mut dyn NeighbourSelection<P> {
        self.selection.as_mut()
    }

    /// Asks the mover for a neighbour, recording the call.
    pub fn select(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        let started = Instant::now();
        let neighbour = self.selection.select_neighbour(solution);
        self.statistics.calls += 1;
        self.statistics.time += started.elapsed();
        if neighbour.is_some() {
            self.statistics.found += 1;
        }
        neighbour
    }

    /// Records that a neighbour of this mover was accepted.
    pub fn accepted(&mut self, value: f64) {
        self.statistics.accepted += 1;
        self.statistics.total_value += value;
    }
}

impl<P: ValueData> Debug for NeighbourSelector<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighbourSelector")
            .field("selection", &self.selection.name())
            .field("bonus", &self.bonus)
            .field("statistics", &self.statistics)
            .finish()
    }
}

impl<P: ValueData> Display for NeighbourSelector<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.statistics;
        write!(
            f,
            "{} ({:.2} pts, {} calls, {:.2}% found, {:.2}% accepted, {:.3} ms/call)",
            self.name(),
            self.weight(),
            stats.calls,
            100.0 * stats.success_rate(),
            100.0 * stats.acceptance_rate(),
            stats.avg_time().as_secs_f64() * 1000.0
        )
    }
}

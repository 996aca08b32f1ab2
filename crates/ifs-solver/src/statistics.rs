//! Solver statistics.
//!
//! [`SolveStatistics`] summarises one run of the solver loop;
//! [`SelectorStatistics`] tracks how a single mover performs inside a
//! neighbour search; [`ConflictStatistics`] remembers which assignments
//! pushed which values out, for conflict-aware value selection.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::debug;

use ifs_config::DataProperties;
use ifs_core::{Assignment, Model, ValueData, ValueId, VariableId};

use crate::event::SolverListener;

/// Record of a best-solution save.
#[derive(Debug, Clone, PartialEq)]
pub struct BestImprovement {
    /// Time since solving started.
    pub time_offset: Duration,
    pub iteration: u64,
    pub unassigned: usize,
    pub value: f64,
}

/// Statistics of one solver run.
#[derive(Debug, Clone, Default)]
pub struct SolveStatistics {
    /// Iterations performed, including failed ones.
    pub iterations: u64,
    /// Iterations in which no neighbour was applied.
    pub failed_iterations: u64,
    /// Wall-clock time of the run.
    pub duration: Duration,
    /// Every best-solution save, in order.
    pub improvements: Vec<BestImprovement>,
    /// True if the run ended on the stop flag rather than termination.
    pub stopped: bool,
    /// Index of the assignment the run worked on.
    pub index: usize,
}

impl SolveStatistics {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Iterations per second.
    pub fn speed(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.iterations as f64 / secs
        }
    }

    /// Share of iterations that applied no neighbour.
    pub fn failure_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.failed_iterations as f64 / self.iterations as f64
        }
    }

    /// The last best-solution save.
    pub fn best(&self) -> Option<&BestImprovement> {
        self.improvements.last()
    }

    pub fn improvement_count(&self) -> usize {
        self.improvements.len()
    }
}

/// Usage counters of one mover.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorStatistics {
    /// Times the mover was asked for a neighbour.
    pub calls: u64,
    /// Times it returned one.
    pub found: u64,
    /// Times the returned neighbour was accepted.
    pub accepted: u64,
    /// Sum of the accepted deltas.
    pub total_value: f64,
    /// Time spent generating neighbours.
    pub time: Duration,
}

impl SelectorStatistics {
    /// Share of calls that produced a neighbour.
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.found as f64 / self.calls as f64
        }
    }

    /// Share of produced neighbours that were accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.found == 0 {
            0.0
        } else {
            self.accepted as f64 / self.found as f64
        }
    }

    /// Average generation time per call.
    pub fn avg_time(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.time / u32::try_from(self.calls).unwrap_or(u32::MAX)
        }
    }
}

/// Counter that fades by a constant factor per iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AgedCounter {
    value: f64,
    iteration: u64,
}

impl AgedCounter {
    fn new(iteration: u64) -> Self {
        Self { value: 1.0, iteration }
    }

    fn at(&self, iteration: u64, ageing: f64) -> f64 {
        if ageing == 1.0 || iteration <= self.iteration {
            return self.value;
        }
        let age = i32::try_from(iteration - self.iteration).unwrap_or(i32::MAX);
        self.value * ageing.powi(age)
    }

    fn increment(&mut self, iteration: u64, ageing: f64) {
        self.value = self.at(iteration, ageing) + 1.0;
        self.iteration = self.iteration.max(iteration);
    }
}

#[derive(Debug, Default)]
struct ConflictTables {
    /// Removed value to the values whose assignment removed it.
    removed_by: HashMap<ValueId, HashMap<ValueId, AgedCounter>>,
    /// Variable to the values whose assignment unassigned it.
    variables: HashMap<VariableId, HashMap<ValueId, AgedCounter>>,
}

/// Conflict-based statistics.
///
/// Records, for every value pushed out of the assignment, which assigned
/// value caused it, and for every variable how often each value unassigned
/// it. Value selection uses the counts to avoid assignments that keep
/// bumping the same variables.
///
/// Counters fade by `ConflictStatistics.Ageing` (1.0, no ageing) per
/// iteration; a positive `ConflictStatistics.AgeingHalfTime` sets the
/// factor so that counters halve over that many iterations.
///
/// Enabled by listing `ConflictStatistics` in `Extensions.Classes`; the
/// solver then registers it as a listener and hands it to the solution.
#[derive(Debug)]
pub struct ConflictStatistics {
    ageing: f64,
    tables: RwLock<ConflictTables>,
}

impl Default for ConflictStatistics {
    fn default() -> Self {
        Self::with_ageing(1.0)
    }
}

impl ConflictStatistics {
    pub fn new(properties: &DataProperties) -> Self {
        let half_time = properties.get_i64("ConflictStatistics.AgeingHalfTime", 0);
        let ageing = if half_time > 0 {
            (0.5f64.ln() / half_time as f64).exp()
        } else {
            properties.get_f64("ConflictStatistics.Ageing", 1.0)
        };
        Self::with_ageing(ageing)
    }

    pub fn with_ageing(ageing: f64) -> Self {
        Self {
            ageing,
            tables: RwLock::new(ConflictTables::default()),
        }
    }

    pub fn ageing(&self) -> f64 {
        self.ageing
    }

    fn read(&self) -> RwLockReadGuard<'_, ConflictTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConflictTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records that assigning `assigned` at `iteration` unassigned
    /// `unassigned`, a value of `variable`.
    pub fn variable_unassigned(
        &self,
        iteration: u64,
        unassigned: ValueId,
        variable: VariableId,
        assigned: ValueId,
    ) {
        let ageing = self.ageing;
        let mut tables = self.write();
        let tables = &mut *tables;
        for counters in [
            tables.removed_by.entry(unassigned).or_default(),
            tables.variables.entry(variable).or_default(),
        ] {
            counters
                .entry(assigned)
                .and_modify(|counter| counter.increment(iteration, ageing))
                .or_insert_with(|| AgedCounter::new(iteration));
        }
    }

    /// How often assigning `value` unassigned the variables of `conflicts`.
    pub fn count_removals<P: ValueData>(
        &self,
        model: &Model<P>,
        iteration: u64,
        conflicts: impl IntoIterator<Item = ValueId>,
        value: ValueId,
    ) -> f64 {
        let tables = self.read();
        conflicts
            .into_iter()
            .filter_map(|conflict| {
                tables
                    .variables
                    .get(&model.value(conflict).variable())?
                    .get(&value)
                    .map(|counter| counter.at(iteration, self.ageing))
            })
            .sum()
    }

    /// Weight of the unassigned values that were pushed out by `value`
    /// before and could come back into conflict with it.
    ///
    /// With a non-negative `limit` each such value counts
    /// `max(0, 1 + limit - conflicts)`, so values that would themselves
    /// cause many conflicts matter less.
    pub fn count_potential_conflicts<P: ValueData>(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        iteration: u64,
        value: ValueId,
        limit: Option<usize>,
    ) -> f64 {
        let tables = self.read();
        let Some(removed) = tables.removed_by.get(&value) else {
            return 0.0;
        };
        removed
            .iter()
            .filter(|(&other, _)| assignment.value(model.value(other).variable()).is_none())
            .map(|(&other, counter)| {
                let count = counter.at(iteration, self.ageing);
                match limit {
                    Some(limit) => {
                        let conflicts = model.conflict_values(assignment, other).len();
                        count * (1 + limit).saturating_sub(conflicts) as f64
                    }
                    None => count,
                }
            })
            .sum()
    }

    /// Number of recorded unassignments of `variable`, without ageing.
    pub fn count_assignments(&self, variable: VariableId) -> u64 {
        self.read()
            .variables
            .get(&variable)
            .map_or(0.0, |counters| counters.values().map(|c| c.value).sum::<f64>())
            .round() as u64
    }

    pub fn reset(&self) {
        let mut tables = self.write();
        tables.removed_by.clear();
        tables.variables.clear();
    }
}

impl<P: ValueData> SolverListener<P> for ConflictStatistics {
    fn neighbour_assigned(&self, model: &Model<P>, iteration: u64, assigned: ValueId, unassigned: &[ValueId]) {
        for &value in unassigned {
            self.variable_unassigned(iteration, value, model.value(value).variable(), assigned);
        }
        if !unassigned.is_empty() {
            debug!(
                iteration,
                assigned = %model.value_name(assigned),
                unassigned = unassigned.len(),
                "Conflicts recorded"
            );
        }
    }
}

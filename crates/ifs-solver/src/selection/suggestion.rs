//! Bounded-depth backtracking over conflicts.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;

use ifs_config::DataProperties;
use ifs_core::{Assignment, Model, Trail, ValueData, ValueId, VariableId};

use super::{random_variable, NeighbourSelection, TimeBudget};
use crate::neighbour::{Neighbour, SwapNeighbour};
use crate::solution::Solution;

/// Reassigns a random variable and then backtracks over the variables it
/// bumps, up to a fixed depth.
///
/// Each level resolves the next pending variable. Values are skipped when
/// they are the current value, conflict with themselves, bump a variable
/// already fixed in this branch, or would leave more pending variables
/// than the remaining depth. A branch succeeds once nothing is pending and
/// no more variables are unassigned than before; in hill-climbing mode the
/// total value must not grow either. Every step is undone before
/// returning.
///
/// Properties: `SuggestionMove.Depth` (3), `SuggestionMove.TimeLimit`
/// (200 ms, 0 for none) and `SuggestionMove.MaxAttempts` (defaults to
/// `RandomSwapMove.MaxAttempts`, 3) values tried per level.
#[derive(Debug, Clone)]
pub struct SuggestionMove {
    depth: usize,
    max_attempts: usize,
    time_limit: Duration,
    hc_mode: bool,
}

impl SuggestionMove {
    pub fn new(properties: &DataProperties) -> Self {
        let swap_attempts = properties.get_usize("RandomSwapMove.MaxAttempts", 3);
        Self {
            depth: properties.get_usize("SuggestionMove.Depth", 3),
            max_attempts: properties.get_usize("SuggestionMove.MaxAttempts", swap_attempts),
            time_limit: Duration::from_millis(properties.get_u64("SuggestionMove.TimeLimit", 200)),
            hc_mode: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

struct Backtrack<'a, P: ValueData> {
    model: &'a Model<P>,
    assignment: &'a mut Assignment,
    rng: &'a mut StdRng,
    trail: Trail,
    iteration: u64,
    total: f64,
    unassigned: usize,
    budget: TimeBudget,
    max_attempts: usize,
    hc_mode: bool,
    resolved: BTreeMap<VariableId, ValueId>,
    pending: BTreeMap<VariableId, ValueId>,
}

impl<P: ValueData> Backtrack<'_, P> {
    fn finish(&self) -> Option<SwapNeighbour> {
        let unassigned = self.assignment.nr_unassigned_variables();
        if unassigned > self.unassigned {
            return None;
        }
        let delta = self.model.total_value(self.assignment) - self.total;
        if self.hc_mode && delta > 0.0 {
            return None;
        }
        let value = if self.unassigned > unassigned { -1.0 } else { delta };
        Some(SwapNeighbour::new(
            self.resolved.iter().map(|(&variable, &value)| (variable, value)),
            value,
        ))
    }

    fn backtrack(&mut self, initial: Option<VariableId>, depth: usize) -> Option<SwapNeighbour> {
        let model = self.model;
        let nr_pending = self.pending.len();
        if initial.is_none() && nr_pending == 0 {
            return self.finish();
        }
        if depth == 0 {
            return None;
        }

        let variable = match initial {
            Some(variable) if self.resolved.contains_key(&variable) => return None,
            Some(variable) => variable,
            None => self
                .pending
                .keys()
                .copied()
                .find(|variable| !self.resolved.contains_key(variable))?,
        };
        let values = model.variable(variable).values();
        if values.is_empty() {
            return None;
        }

        let offset = self.rng.random_range(0..values.len());
        let mut attempts = 0;
        for i in 0..values.len() {
            if attempts >= self.max_attempts || self.budget.exhausted() {
                break;
            }
            let value = values[(i + offset) % values.len()];
            if self.assignment.value(variable) == Some(value) {
                continue;
            }
            let conflicts = model.conflict_values(self.assignment, value);
            if nr_pending + conflicts.len() > depth || conflicts.contains(&value) {
                continue;
            }
            if conflicts
                .iter()
                .any(|&c| self.resolved.contains_key(&model.value(c).variable()))
            {
                continue;
            }

            let mark = self.trail.mark();
            self.trail.assign_resolving(model, self.assignment, self.iteration, value);
            for &conflict in &conflicts {
                self.pending.insert(model.value(conflict).variable(), conflict);
            }
            let resolved_conflict = self.pending.remove(&variable);
            self.resolved.insert(variable, value);

            let found = self.backtrack(None, depth - 1);
            attempts += 1;

            self.resolved.remove(&variable);
            self.trail.rollback(model, self.assignment, mark);
            for &conflict in &conflicts {
                self.pending.remove(&model.value(conflict).variable());
            }
            if let Some(conflict) = resolved_conflict {
                self.pending.insert(variable, conflict);
            }

            if found.is_some() {
                return found;
            }
        }
        None
    }
}

impl<P: ValueData> NeighbourSelection<P> for SuggestionMove {
    fn name(&self) -> &str {
        "SuggestionMove"
    }

    fn set_hc_mode(&mut self, hc_mode: bool) {
        self.hc_mode = hc_mode;
    }

    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        let iteration = solution.iteration();
        let (model, assignment, rng) = solution.split_mut();
        let variable = random_variable(model, assignment, rng)?;
        let total = model.total_value(assignment);
        let unassigned = assignment.nr_unassigned_variables();

        let mut search = Backtrack {
            model,
            assignment,
            rng,
            trail: Trail::new(),
            iteration,
            total,
            unassigned,
            budget: TimeBudget::start(self.time_limit),
            max_attempts: self.max_attempts,
            hc_mode: self.hc_mode,
            resolved: BTreeMap::new(),
            pending: BTreeMap::new(),
        };
        let found = search.backtrack(Some(variable), self.depth);
        search.trail.rollback_all(model, search.assignment);
        found.map(|neighbour| Box::new(neighbour) as Box<dyn Neighbour<P>>)
    }
}

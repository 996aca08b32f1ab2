//! Random move with bounded conflict repair.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;

use ifs_config::DataProperties;
use ifs_core::{Assignment, Model, Trail, ValueData, ValueId, VariableId};

use super::{NeighbourSelection, TimeBudget};
use crate::neighbour::{Neighbour, SimpleNeighbour, SwapNeighbour};
use crate::solution::Solution;

/// Tries a random value and, if it conflicts, moves every bumped variable
/// to a conflict-free value of its own.
///
/// The repair is explored in place and always rolled back; the result is a
/// [`SwapNeighbour`] carrying every reassignment and the measured change of
/// the total value. A move assigning a previously unassigned variable is
/// priced at `-1`.
///
/// Properties: `RandomSwapMove.MaxAttempts` (3) bounds the conflicting
/// candidates tried per variable and the values tried per bumped variable;
/// `RandomSwapMove.TimeLimit` (200 ms, 0 for none) bounds each repair.
#[derive(Debug, Clone)]
pub struct RandomSwapMove {
    max_attempts: usize,
    time_limit: Duration,
    hc_mode: bool,
}

impl RandomSwapMove {
    pub fn new(properties: &DataProperties) -> Self {
        Self {
            max_attempts: properties.get_usize("RandomSwapMove.MaxAttempts", 3),
            time_limit: Duration::from_millis(properties.get_u64("RandomSwapMove.TimeLimit", 200)),
            hc_mode: false,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

/// Speculative repair state for one candidate.
struct Repair<'a, P: ValueData> {
    model: &'a Model<P>,
    assignment: &'a mut Assignment,
    rng: &'a mut StdRng,
    trail: Trail,
    iteration: u64,
    total: f64,
    budget: TimeBudget,
    max_attempts: usize,
    hc_mode: bool,
}

impl<P: ValueData> Repair<'_, P> {
    /// Reassigns `conflicts[index..]` one by one. Returns the delta of the
    /// first complete repair found, recording its reassignments.
    fn resolve(
        &mut self,
        conflicts: &[ValueId],
        index: usize,
        assignments: &mut Vec<(VariableId, ValueId)>,
    ) -> Option<f64> {
        let model = self.model;
        let Some(&conflict) = conflicts.get(index) else {
            return Some(model.total_value(self.assignment) - self.total);
        };
        let variable = model.value(conflict).variable();
        let values = model.variable(variable).values();
        if values.is_empty() {
            return None;
        }
        let offset = self.rng.random_range(0..values.len());
        let mut attempts = 0;
        for i in 0..values.len() {
            let value = values[(i + offset) % values.len()];
            if value == conflict || model.in_conflict(self.assignment, value) {
                continue;
            }
            let mark = self.trail.mark();
            self.trail.assign(model, self.assignment, self.iteration, value);
            let delta = self.resolve(conflicts, index + 1, assignments);
            self.trail.rollback(model, self.assignment, mark);
            attempts += 1;

            if let Some(delta) = delta {
                if !self.hc_mode || delta <= 0.0 {
                    assignments.push((variable, value));
                    return Some(delta);
                }
            }
            if attempts >= self.max_attempts || self.budget.exhausted() {
                break;
            }
        }
        None
    }
}

impl<P: ValueData> NeighbourSelection<P> for RandomSwapMove {
    fn name(&self) -> &str {
        "RandomSwapMove"
    }

    fn set_hc_mode(&mut self, hc_mode: bool) {
        self.hc_mode = hc_mode;
    }

    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        let iteration = solution.iteration();
        let (model, assignment, rng) = solution.split_mut();
        let nr_variables = model.nr_variables();
        if nr_variables == 0 {
            return None;
        }
        let total = model.total_value(assignment);
        let start = rng.random_range(0..nr_variables);

        for i in 0..nr_variables {
            let variable = model.variables()[(i + start) % nr_variables].id();
            let values = model.variable(variable).values();
            if values.is_empty() {
                continue;
            }
            let offset = rng.random_range(0..values.len());
            let old = assignment.value(variable);
            let budget = TimeBudget::start(self.time_limit);
            let mut attempts = 0;

            for j in 0..values.len() {
                let value = values[(j + offset) % values.len()];
                if Some(value) == old {
                    continue;
                }
                let conflicts = model.conflict_values(assignment, value);
                if conflicts.contains(&value) {
                    continue;
                }
                if conflicts.is_empty() {
                    let neighbour = SimpleNeighbour::new(variable, value);
                    if !self.hc_mode || Neighbour::<P>::value(&neighbour, model, assignment) <= 0.0 {
                        return Some(Box::new(neighbour));
                    }
                    continue;
                }

                let bumped: Vec<ValueId> = conflicts.into_iter().collect();
                let mut assignments = vec![(variable, value)];
                let mut repair = Repair {
                    model,
                    assignment: &mut *assignment,
                    rng: &mut *rng,
                    trail: Trail::new(),
                    iteration,
                    total,
                    budget,
                    max_attempts: self.max_attempts,
                    hc_mode: self.hc_mode,
                };
                repair.trail.assign_resolving(model, repair.assignment, iteration, value);
                let delta = repair.resolve(&bumped, 0, &mut assignments);
                repair.trail.rollback_all(model, repair.assignment);
                attempts += 1;

                if let Some(delta) = delta {
                    let value = if old.is_none() { -1.0 } else { delta };
                    return Some(Box::new(SwapNeighbour::new(assignments, value)));
                }
                if attempts >= self.max_attempts {
                    break;
                }
            }
        }
        None
    }
}

//! The standard IFS variable/value selection.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::debug;

use ifs_config::DataProperties;
use ifs_core::{ConflictSet, ValueData, ValueId, VariableId};

use super::NeighbourSelection;
use crate::neighbour::{Neighbour, SimpleNeighbour};
use crate::perturbations::ViolatedInitials;
use crate::solution::Solution;
use crate::statistics::ConflictStatistics;

/// Potential conflicts only count values that would cause at most this many
/// conflicts themselves.
const POTENTIAL_CONFLICTS_LIMIT: usize = 3;

/// Picks a variable, then its best value by a weighted conflict count.
///
/// Variable selection takes a random unassigned variable. With
/// `Variable.RandomSelection` off (the default in MPP mode) the pick is a
/// roulette where variables with an initial value weigh
/// `3·(1 + conflicts of the initial value)`. Once everything is assigned a
/// random perturbed variable is chosen (MPP), else a random assigned one.
///
/// Value selection, in order:
/// 1. MPP: the initial value, when the perturbation count is over
///    `Value.MPPLimit` or with probability `Value.InitialSelectionProb`
/// 2. a random value with probability `Value.RandomWalkProb`
/// 3. the non-tabu value other than the current one minimising
///    `WeightConflicts·|conflicts| + WeightValue·cost + WeightDeltaInitialAssignments·Δ`,
///    ties broken at random
///
/// When the solution carries [`ConflictStatistics`] the sum also adds
/// `WeightWeightedConflicts` (1.0) times how often the value unassigned the
/// conflicting variables before, and `WeightPotentialConflicts` (0.0) times
/// the weight of unassigned values that pushed it out before.
///
/// The chosen value enters a tabu list of `Value.Tabu` entries. The
/// neighbour unassigns the conflicts computed during selection.
#[derive(Debug, Clone)]
pub struct StandardNeighbourSelection {
    mpp: bool,
    random_selection: bool,
    random_walk_prob: f64,
    initial_selection_prob: f64,
    mpp_limit: Option<usize>,
    weight_conflicts: f64,
    weight_value: f64,
    weight_delta_initial: f64,
    weight_weighted_conflicts: f64,
    weight_potential_conflicts: f64,
    tabu_size: usize,
    tabu: VecDeque<ValueId>,
    violated: Option<Arc<ViolatedInitials>>,
}

impl StandardNeighbourSelection {
    pub fn new(properties: &DataProperties) -> Self {
        let mpp = properties.get_bool("General.MPP", false);
        let (initial_selection_prob, mpp_limit, weight_delta_initial) = if mpp {
            (
                properties.get_f64("Value.InitialSelectionProb", 0.75),
                usize::try_from(properties.get_i64("Value.MPPLimit", -1)).ok(),
                properties.get_f64("Value.WeightDeltaInitialAssignments", 0.0),
            )
        } else {
            (0.0, None, 0.0)
        };
        Self {
            mpp,
            random_selection: properties.get_bool("Variable.RandomSelection", !mpp),
            random_walk_prob: properties.get_f64("Value.RandomWalkProb", 0.0),
            initial_selection_prob,
            mpp_limit,
            weight_conflicts: properties.get_f64("Value.WeightConflicts", 1.0),
            weight_value: properties.get_f64("Value.WeightValue", 0.0),
            weight_delta_initial,
            weight_weighted_conflicts: properties.get_f64("Value.WeightWeightedConflicts", 1.0),
            weight_potential_conflicts: properties.get_f64("Value.WeightPotentialConflicts", 0.0),
            tabu_size: properties.get_usize("Value.Tabu", 0),
            tabu: VecDeque::new(),
            violated: None,
        }
    }

    pub(crate) fn select_variable<P: ValueData>(&self, solution: &mut Solution<P>) -> Option<VariableId> {
        let (model, assignment, rng) = solution.split_mut();
        if assignment.nr_unassigned_variables() == 0 {
            let perturbed = model.perturb_variables(assignment, false);
            if let Some(&variable) = perturbed.choose(rng) {
                return Some(variable);
            }
            let assigned = assignment.assigned_variables();
            if assigned.is_empty() {
                return None;
            }
            return assigned.get(rng.random_range(0..assigned.len()));
        }

        let unassigned = assignment.unassigned_variables();
        if self.random_selection {
            return unassigned.get(rng.random_range(0..unassigned.len()));
        }
        let weights: Vec<(VariableId, usize)> = unassigned
            .iter()
            .map(|variable| {
                let weight = match model.variable(variable).initial_value() {
                    Some(initial) => 3 * (1 + model.conflict_values(assignment, initial).len()),
                    None => 1,
                };
                (variable, weight)
            })
            .collect();
        let total: usize = weights.iter().map(|&(_, w)| w).sum();
        let mut point = rng.random_range(0..total);
        for &(variable, weight) in &weights {
            if point < weight {
                return Some(variable);
            }
            point -= weight;
        }
        unassigned.get(rng.random_range(0..unassigned.len()))
    }

    /// Statistics-based terms of the value score.
    fn conflict_terms<P: ValueData>(
        &self,
        statistics: Option<&ConflictStatistics>,
        solution: &Solution<P>,
        value: ValueId,
        conflicts: &ConflictSet,
    ) -> f64 {
        let Some(statistics) = statistics else {
            return 0.0;
        };
        let model = solution.model();
        let iteration = solution.iteration();
        let mut sum = 0.0;
        if self.weight_weighted_conflicts != 0.0 {
            sum += self.weight_weighted_conflicts
                * statistics.count_removals(model, iteration, conflicts.iter().copied(), value);
        }
        if self.weight_potential_conflicts != 0.0 {
            sum += self.weight_potential_conflicts
                * statistics.count_potential_conflicts(
                    model,
                    solution.assignment(),
                    iteration,
                    value,
                    Some(POTENTIAL_CONFLICTS_LIMIT),
                );
        }
        sum
    }

    /// Change of the perturbation count if `value` were assigned.
    fn delta_initial<P: ValueData>(
        &self,
        solution: &Solution<P>,
        variable: VariableId,
        value: ValueId,
        conflicts: &ConflictSet,
    ) -> i64 {
        let model = solution.model();
        let assignment = solution.assignment();
        let mut delta = 0;
        if let Some(violations) = self.violated.as_ref().and_then(|v| v.violated_initials(value)) {
            for &initial in violations {
                let current = assignment.value(model.value(initial).variable());
                if current.is_none() || current == Some(initial) {
                    delta += 2;
                }
            }
        }
        for &conflict in conflicts {
            if model.variable(model.value(conflict).variable()).initial_value().is_some() {
                delta -= 1;
            }
        }
        if let Some(initial) = model.variable(variable).initial_value() {
            if initial != value {
                delta += 1;
            }
        }
        delta
    }

    fn select_value<P: ValueData>(
        &mut self,
        solution: &mut Solution<P>,
        variable: VariableId,
    ) -> Option<ValueId> {
        let model = Arc::clone(solution.model());
        let values = model.variable(variable).values();
        if values.is_empty() {
            return None;
        }

        let mut perturbed = None;
        if self.mpp {
            if let Some(initial) = model.variable(variable).initial_value() {
                let count = solution.perturbed_variables().len();
                perturbed = Some(count);
                if solution.is_complete() {
                    if let Some(limit) = self.mpp_limit {
                        if count <= limit {
                            self.mpp_limit = count.checked_sub(1);
                        }
                    }
                }
                if self.mpp_limit.is_some_and(|limit| count > limit) {
                    return Some(initial);
                }
                if solution.rng().random::<f64>() < self.initial_selection_prob {
                    return Some(initial);
                }
            }
        }

        if solution.rng().random::<f64>() < self.random_walk_prob {
            return values.choose(solution.rng()).copied();
        }
        if values.len() == 1 {
            return values.first().copied();
        }

        let current = solution.assignment().value(variable);
        let statistics = solution.conflict_statistics().cloned();
        let mut best: Vec<ValueId> = Vec::new();
        let mut best_sum = f64::INFINITY;
        for &value in values {
            if self.tabu.contains(&value) || Some(value) == current {
                continue;
            }
            let conflicts = model.conflict_values(solution.assignment(), value);
            if conflicts.contains(&value) {
                continue;
            }
            let mut delta_initial = 0;
            if self.mpp && self.weight_delta_initial != 0.0 {
                delta_initial = self.delta_initial(solution, variable, value, &conflicts);
                let count = match perturbed {
                    Some(count) => count,
                    None => solution.perturbed_variables().len(),
                };
                if self
                    .mpp_limit
                    .is_some_and(|limit| count as i64 + delta_initial > limit as i64)
                {
                    continue;
                }
            }
            let sum = self.weight_delta_initial * delta_initial as f64
                + self.weight_conflicts * conflicts.len() as f64
                + self.weight_value * model.value(value).to_double(solution.assignment())
                + self.conflict_terms(statistics.as_deref(), solution, value, &conflicts);
            if sum < best_sum {
                best_sum = sum;
                best.clear();
                best.push(value);
            } else if sum == best_sum {
                best.push(value);
            }
        }

        let selected = best.choose(solution.rng()).copied();
        if let Some(value) = selected {
            if self.tabu_size > 0 {
                if self.tabu.len() >= self.tabu_size {
                    self.tabu.pop_front();
                }
                self.tabu.push_back(value);
            }
        }
        selected
    }
}

impl<P: ValueData> NeighbourSelection<P> for StandardNeighbourSelection {
    fn name(&self) -> &str {
        "StandardNeighbourSelection"
    }

    fn init(&mut self, solution: &Solution<P>) {
        self.tabu.clear();
        if self.mpp && self.weight_delta_initial != 0.0 && self.violated.is_none() {
            self.violated = Some(Arc::new(ViolatedInitials::init(solution.model())));
        }
    }

    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        let Some(variable) = self.select_variable(solution) else {
            debug!("No variable selected");
            return None;
        };
        let Some(value) = self.select_value(solution, variable) else {
            debug!(
                variable = solution.model().variable(variable).name(),
                "No value selected"
            );
            return None;
        };
        let conflicts = solution.model().conflict_values(solution.assignment(), value);
        Some(Box::new(SimpleNeighbour::with_conflicts(variable, value, conflicts)))
    }

    fn info(&self, _solution: &Solution<P>, info: &mut BTreeMap<String, String>) {
        if self.tabu_size > 0 {
            info.insert("Tabu".to_string(), format!("{}/{}", self.tabu.len(), self.tabu_size));
        }
    }
}

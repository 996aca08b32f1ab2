//! Standard variable selection followed by a complete backtrack over the
//! values of the variables it bumps.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace};

use ifs_config::DataProperties;
use ifs_core::{Assignment, ConflictSet, Model, Trail, ValueData, ValueId, VariableId};

use super::{NeighbourSelection, StandardNeighbourSelection, TimeBudget};
use crate::neighbour::{Neighbour, SwapNeighbour};
use crate::solution::Solution;

/// Picks a variable like [`StandardNeighbourSelection`], then tries every
/// value of it and, recursively, of every variable each value pushes out.
///
/// A branch is cut when the variables still to resolve plus the new
/// conflicts exceed the remaining depth, or when a value would bump a
/// variable already resolved in the branch. A leaf where everything is
/// resolved counts if it assigns more variables than before, or as many at
/// a lower total value; the lowest total wins, later leaves winning ties.
/// The assignment is left as it was.
///
/// Properties: `Neighbour.BackTrackDepth` (4), `Neighbour.BackTrackTimeout`
/// (5000 ms, 0 for none) and `Neighbour.BackTrackMaxIters` (-1 for none)
/// search nodes per selection.
#[derive(Debug, Clone)]
pub struct BacktrackNeighbourSelection {
    standard: StandardNeighbourSelection,
    depth: usize,
    timeout: Duration,
    max_iters: Option<u64>,
}

impl BacktrackNeighbourSelection {
    pub fn new(properties: &DataProperties) -> Self {
        Self {
            standard: StandardNeighbourSelection::new(properties),
            depth: properties.get_usize("Neighbour.BackTrackDepth", 4),
            timeout: Duration::from_millis(properties.get_u64("Neighbour.BackTrackTimeout", 5000)),
            max_iters: u64::try_from(properties.get_i64("Neighbour.BackTrackMaxIters", -1))
                .ok()
                .filter(|&max| max > 0),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    /// Backtracks from `variable` and returns the best neighbour found.
    pub fn select_neighbour_for<P: ValueData>(
        &self,
        solution: &mut Solution<P>,
        variable: VariableId,
    ) -> Option<SwapNeighbour> {
        let iteration = solution.iteration();
        let (model, assignment, _) = solution.split_mut();
        debug!(
            variable = model.variable(variable).name(),
            assigned = assignment.nr_assigned_variables(),
            "Backtrack start"
        );
        let mut search = Search {
            model,
            initial_value: model.total_value(assignment),
            initial_assigned: assignment.nr_assigned_variables(),
            assignment,
            trail: Trail::new(),
            iteration,
            budget: TimeBudget::start(self.timeout),
            max_iters: self.max_iters,
            nodes: 0,
            timeout_reached: false,
            max_iters_reached: false,
            best: None,
        };
        search.backtrack(&[variable], 0, self.depth);
        search.trail.rollback_all(model, search.assignment);

        let Search {
            best,
            nodes,
            initial_value,
            ..
        } = search;
        let (values, total) = best?;
        debug!(nodes, total, "Backtrack found a neighbour");
        Some(SwapNeighbour::new(values, total - initial_value))
    }
}

struct Search<'a, P: ValueData> {
    model: &'a Model<P>,
    assignment: &'a mut Assignment,
    trail: Trail,
    iteration: u64,
    budget: TimeBudget,
    max_iters: Option<u64>,
    nodes: u64,
    timeout_reached: bool,
    max_iters_reached: bool,
    initial_value: f64,
    initial_assigned: usize,
    best: Option<(Vec<(VariableId, ValueId)>, f64)>,
}

impl<P: ValueData> Search<'_, P> {
    fn visit(&mut self) {
        if !self.timeout_reached && self.budget.exhausted() {
            trace!("Backtrack timeout reached");
            self.timeout_reached = true;
        }
        if self.max_iters.is_some_and(|max| self.nodes > max) {
            self.max_iters_reached = true;
        }
        self.nodes += 1;
    }

    fn stopped(&self) -> bool {
        self.timeout_reached || self.max_iters_reached
    }

    fn save_best(&mut self, resolved: &[VariableId]) {
        let assigned = self.assignment.nr_assigned_variables();
        let total = self.model.total_value(self.assignment);
        let improves = assigned > self.initial_assigned
            || (assigned == self.initial_assigned && total < self.initial_value);
        if !improves || self.best.as_ref().is_some_and(|(_, best)| *best < total) {
            return;
        }
        let values = resolved
            .iter()
            .filter_map(|&variable| self.assignment.value(variable).map(|value| (variable, value)))
            .collect();
        self.best = Some((values, total));
    }

    fn within_bound(
        &self,
        resolve: &[VariableId],
        idx: usize,
        depth: usize,
        value: ValueId,
        conflicts: &ConflictSet,
    ) -> bool {
        if resolve.len() - idx + conflicts.len() > depth || conflicts.contains(&value) {
            return false;
        }
        !conflicts.iter().any(|&conflict| {
            let variable = self.model.value(conflict).variable();
            resolve[..=idx].contains(&variable)
        })
    }

    fn backtrack(&mut self, resolve: &[VariableId], idx: usize, depth: usize) {
        self.visit();
        if idx == resolve.len() {
            self.save_best(resolve);
            return;
        }
        if depth == 0 || self.stopped() {
            return;
        }

        let model = self.model;
        let variable = resolve[idx];
        for &value in model.variable(variable).values() {
            if self.stopped() {
                break;
            }
            if self.assignment.value(variable) == Some(value) {
                continue;
            }
            let conflicts = model.conflict_values(self.assignment, value);
            if !self.within_bound(resolve, idx, depth, value, &conflicts) {
                continue;
            }

            let mut next = resolve.to_vec();
            let mark = self.trail.mark();
            for &conflict in &conflicts {
                let bumped = model.value(conflict).variable();
                self.trail.unassign(model, self.assignment, self.iteration, bumped);
                if !next.contains(&bumped) {
                    next.push(bumped);
                }
            }
            self.trail.assign(model, self.assignment, self.iteration, value);
            self.backtrack(&next, idx + 1, depth - 1);
            self.trail.rollback(model, self.assignment, mark);
        }
    }
}

impl<P: ValueData> NeighbourSelection<P> for BacktrackNeighbourSelection {
    fn name(&self) -> &str {
        "BacktrackNeighbourSelection"
    }

    fn init(&mut self, solution: &Solution<P>) {
        NeighbourSelection::<P>::init(&mut self.standard, solution);
    }

    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        let variable = self.standard.select_variable(solution)?;
        self.select_neighbour_for(solution, variable)
            .map(|neighbour| Box::new(neighbour) as Box<dyn Neighbour<P>>)
    }

    fn info(&self, solution: &Solution<P>, info: &mut BTreeMap<String, String>) {
        info.insert("Backtrack depth".to_string(), self.depth.to_string());
        NeighbourSelection::<P>::info(&self.standard, solution, info);
    }
}

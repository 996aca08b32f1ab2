//! Neighbour searches: local search over a set of movers.
//!
//! A [`NeighbourSearch`] repeatedly picks one of its movers (weighted by
//! bonus, by adaptive points, or uniformly), asks it for a neighbour and
//! lets a [`SearchPolicy`] decide whether to accept it. The policy owns the
//! acceptance rule and the schedule: when to stop, when to cool down or
//! reheat, when to fall back to the best solution.
//!
//! Lazy neighbours are applied before the policy sees them; the delta is
//! the change of the total value, and rejected ones are undone at once.
//! Accepted lazy neighbours are handed out as [`AppliedNeighbour`]s.
//!
//! Movers are configured per search with `<Base>.Neighbours` and
//! `<Base>.AdditionalNeighbours`, `;`-separated `name[@bonus]` entries:
//!
//! ```
//! use ifs_config::DataProperties;
//! use ifs_solver::search::HillClimber;
//! use ifs_solver::selection::SelectionRegistry;
//!
//! let properties = DataProperties::new()
//!     .with("HillClimber.Neighbours", "RandomMove;RandomSwapMove@0.5");
//! let registry = SelectionRegistry::<usize>::new();
//! let search = HillClimber::new(&properties, &registry);
//! assert_eq!(search.movers().len(), 2);
//! ```

mod great_deluge;
mod hill_climbing;
mod selector;
mod simple;
mod simulated_annealing;

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::time::Instant;

use rand::Rng;
use tracing::{debug, error, warn};

use ifs_config::DataProperties;
use ifs_core::ValueData;

use crate::neighbour::{AppliedNeighbour, Neighbour};
use crate::selection::{NeighbourSelection, SelectionRegistry};
use crate::solution::Solution;

pub use great_deluge::DelugeSchedule;
pub use hill_climbing::HillClimbingAcceptance;
pub use selector::NeighbourSelector;
pub use simple::{Phase, SimpleSearch};
pub use simulated_annealing::AnnealingSchedule;

/// Movers used when `<Base>.Neighbours` is not set.
pub const DEFAULT_NEIGHBOURS: &str = "RandomMove;RandomSwapMove@0.01;SuggestionMove@0.01";

/// Hill climbing over the configured movers.
pub type HillClimber<P> = NeighbourSearch<P, HillClimbingAcceptance>;

/// Simulated annealing over the configured movers.
pub type SimulatedAnnealing<P> = NeighbourSearch<P, AnnealingSchedule>;

/// Great deluge over the configured movers.
pub type GreatDeluge<P> = NeighbourSearch<P, DelugeSchedule>;

/// Iteration counter and clock of an active search.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub iteration: u64,
    pub started: Instant,
}

impl SearchState {
    fn new() -> Self {
        Self {
            iteration: 0,
            started: Instant::now(),
        }
    }

    /// Restarts the counter and the clock.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Iterations per second since the search was (re)started.
    pub fn speed(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.iteration as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Acceptance rule and schedule of a [`NeighbourSearch`].
pub trait SearchPolicy: Send + Debug {
    /// Prefix of the properties configuring the search, also its name.
    const BASE_NAME: &'static str;

    /// Mover list used when `<Base>.Neighbours` is not set.
    const DEFAULT_NEIGHBOURS: &'static str = DEFAULT_NEIGHBOURS;

    /// Whether movers are switched to hill-climbing mode.
    const HC_MODE: bool = false;

    fn from_properties(properties: &DataProperties) -> Self;

    /// Called when the search starts or resumes after having given up.
    fn activate<P: ValueData>(&mut self, _state: &SearchState, _solution: &Solution<P>) {}

    /// False ends the current run of the search.
    fn can_continue<P: ValueData>(&self, _state: &SearchState, _solution: &Solution<P>) -> bool {
        true
    }

    /// Advances the schedule after the iteration counter was incremented.
    /// Returns true when the schedule changed, e.g. on cooling.
    fn inc_iteration<P: ValueData>(&mut self, state: &mut SearchState, solution: &mut Solution<P>) -> bool;

    /// Decides on a neighbour with delta `value` leading to a total value
    /// of `total`.
    fn accept<P: ValueData>(
        &mut self,
        state: &SearchState,
        solution: &mut Solution<P>,
        value: f64,
        total: f64,
    ) -> bool;

    fn best_saved<P: ValueData>(&mut self, _state: &SearchState, _solution: &Solution<P>) {}

    fn info(&self, _state: &SearchState, _info: &mut BTreeMap<String, String>) {}
}

/// Local search driver, parameterised by its acceptance policy.
pub struct NeighbourSearch<P: ValueData, S: SearchPolicy> {
    policy: S,
    movers: Vec<NeighbourSelector<P>>,
    random_selection: bool,
    update_points: bool,
    state: SearchState,
    active: bool,
}

impl<P: ValueData, S: SearchPolicy> NeighbourSearch<P, S> {
    /// Creates the search and its movers from `properties`. Movers the
    /// registry does not know are logged and skipped.
    pub fn new(properties: &DataProperties, registry: &SelectionRegistry<P>) -> Self {
        let base = S::BASE_NAME;
        let update_points = properties.get_bool(&format!("{base}.Update"), false);
        let mut neighbours = properties.get_str(&format!("{base}.Neighbours"), S::DEFAULT_NEIGHBOURS);
        neighbours.push(';');
        neighbours.push_str(&properties.get_str(&format!("{base}.AdditionalNeighbours"), ""));

        let mut movers = Vec::new();
        for entry in neighbours.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, bonus) = match entry.split_once('@') {
                Some((name, bonus)) => match bonus.trim().parse::<f64>() {
                    Ok(bonus) => (name.trim(), bonus),
                    Err(e) => {
                        error!("Unable to use {entry}: invalid bonus ({e})");
                        continue;
                    }
                },
                None => (entry, 1.0),
            };
            match registry.create(name, properties) {
                Ok(selection) => movers.push(NeighbourSelector::new(selection, bonus, update_points)),
                Err(e) => error!("Unable to use {name}: {e}"),
            }
        }

        Self {
            policy: S::from_properties(properties),
            movers,
            random_selection: properties.get_bool(&format!("{base}.Random"), false),
            update_points,
            state: SearchState::new(),
            active: false,
        }
    }

    /// Adds a mover with the given bonus.
    pub fn add_mover(&mut self, selection: Box<dyn NeighbourSelection<P>>, bonus: f64) {
        self.movers.push(NeighbourSelector::new(selection, bonus, self.update_points));
    }

    pub fn movers(&self) -> &[NeighbourSelector<P>] {
        &self.movers
    }

    pub fn policy(&self) -> &S {
        &self.policy
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn next_mover(&self, solution: &mut Solution<P>) -> usize {
        let rng = solution.rng();
        if self.random_selection {
            return rng.random_range(0..self.movers.len());
        }
        let total: f64 = self.movers.iter().map(NeighbourSelector::weight).sum();
        let mut points = rng.random::<f64>() * total;
        for (index, mover) in self.movers.iter().enumerate() {
            points -= mover.weight();
            if points <= 0.0 {
                return index;
            }
        }
        self.movers.len() - 1
    }

    fn log_movers(&self) {
        if self.update_points {
            for mover in &self.movers {
                debug!("  {mover}");
            }
        }
    }

    fn activate(&mut self, solution: &Solution<P>) {
        self.state.reset();
        self.active = true;
        self.policy.activate(&self.state, solution);
        solution.progress().set_phase(&format!("{}...", S::BASE_NAME), 100);
    }

    /// Prices `neighbour` and asks the policy. Lazy neighbours are applied
    /// here and left applied only when accepted.
    fn try_accept(
        &mut self,
        solution: &mut Solution<P>,
        mut neighbour: Box<dyn Neighbour<P>>,
    ) -> Option<Box<dyn Neighbour<P>>> {
        let before = solution.total_value();
        if neighbour.is_lazy() {
            solution.apply(neighbour.as_mut());
            let total = solution.total_value();
            let value = total - before;
            if self.policy.accept(&self.state, solution, value, total) {
                return Some(Box::new(AppliedNeighbour::new(neighbour, value)));
            }
            solution.undo(neighbour.as_mut());
            return None;
        }
        let value = neighbour.value(solution.model(), solution.assignment());
        if self.policy.accept(&self.state, solution, value, before + value) {
            Some(neighbour)
        } else {
            None
        }
    }
}

impl<P: ValueData, S: SearchPolicy> NeighbourSelection<P> for NeighbourSearch<P, S> {
    fn name(&self) -> &str {
        S::BASE_NAME
    }

    fn init(&mut self, solution: &Solution<P>) {
        if self.movers.is_empty() {
            warn!("{} has no usable neighbours", S::BASE_NAME);
        }
        for mover in &mut self.movers {
            mover.selection_mut().init(solution);
            if S::HC_MODE {
                mover.selection_mut().set_hc_mode(true);
            }
        }
        self.active = false;
    }

    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        if self.movers.is_empty() {
            return None;
        }
        if !self.active {
            self.activate(solution);
        }
        while self.policy.can_continue(&self.state, solution) {
            if solution.is_stopped() {
                return None;
            }
            self.state.iteration += 1;
            if self.policy.inc_iteration(&mut self.state, solution) {
                self.log_movers();
            }
            let index = self.next_mover(solution);
            let Some(neighbour) = self.movers[index].select(solution) else {
                continue;
            };
            if let Some(accepted) = self.try_accept(solution, neighbour) {
                let value = accepted.value(solution.model(), solution.assignment());
                self.movers[index].accepted(value);
                return Some(accepted);
            }
        }
        debug!(
            iterations = self.state.iteration,
            "{} finished",
            S::BASE_NAME
        );
        self.active = false;
        None
    }

    fn set_hc_mode(&mut self, hc_mode: bool) {
        for mover in &mut self.movers {
            mover.selection_mut().set_hc_mode(hc_mode);
        }
    }

    fn solution_updated(&mut self, solution: &Solution<P>) {
        for mover in &mut self.movers {
            mover.selection_mut().solution_updated(solution);
        }
    }

    fn best_saved(&mut self, solution: &Solution<P>) {
        self.policy.best_saved(&self.state, solution);
        for mover in &mut self.movers {
            mover.selection_mut().best_saved(solution);
        }
    }

    fn best_restored(&mut self, solution: &Solution<P>) {
        for mover in &mut self.movers {
            mover.selection_mut().best_restored(solution);
        }
    }

    fn best_cleared(&mut self, solution: &Solution<P>) {
        for mover in &mut self.movers {
            mover.selection_mut().best_cleared(solution);
        }
    }

    fn info(&self, solution: &Solution<P>, info: &mut BTreeMap<String, String>) {
        self.policy.info(&self.state, info);
        for mover in &self.movers {
            mover.selection().info(solution, info);
            info.insert(
                format!("{}: {}", S::BASE_NAME, mover.name()),
                mover.to_string(),
            );
        }
    }
}

impl<P: ValueData, S: SearchPolicy> Debug for NeighbourSearch<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighbourSearch")
            .field("policy", &self.policy)
            .field("movers", &self.movers)
            .field("random_selection", &self.random_selection)
            .field("update_points", &self.update_points)
            .field("state", &self.state)
            .field("active", &self.active)
            .finish()
    }
}

/// Cooling rate of the assignment with the given index: `rate` times the
/// adjustment at `index - 1`, if there is one.
pub(crate) fn adjusted_rate(rate: f64, adjustments: Option<&[Option<f64>]>, index: usize) -> f64 {
    let adjustment = index
        .checked_sub(1)
        .and_then(|i| adjustments.and_then(|a| a.get(i).copied().flatten()));
    match adjustment {
        Some(adjustment) => rate * adjustment,
        None => rate,
    }
}

/// Best value if a best snapshot exists, else the current total.
pub(crate) fn best_or_current<P: ValueData>(solution: &Solution<P>) -> f64 {
    solution.best_value().unwrap_or_else(|| solution.total_value())
}

#[cfg(test)]
mod tests;

//! Neighbour selections: strategies proposing the next move.
//!
//! A [`NeighbourSelection`] looks at a [`Solution`] and proposes a
//! [`Neighbour`], or nothing. [`StandardNeighbourSelection`] and
//! [`BacktrackNeighbourSelection`] drive plain IFS. Simple movers
//! ([`RandomMove`], [`RandomSwapMove`], [`SuggestionMove`]) are combined by
//! the neighbour searches in [`crate::search`], which are selections
//! themselves.
//!
//! Selections are created by name through a [`SelectionRegistry`], so mover
//! lists can be configured with properties such as
//! `HillClimber.Neighbours = "RandomMove;RandomSwapMove@0.01"`.

mod backtrack;
mod random_move;
mod random_swap;
mod standard;
mod suggestion;

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

use ifs_config::DataProperties;
use ifs_core::{Assignment, IfsError, Model, Result, ValueData, VariableId};

use crate::neighbour::Neighbour;
use crate::search::{GreatDeluge, HillClimber, SimpleSearch, SimulatedAnnealing};
use crate::solution::Solution;

pub use backtrack::BacktrackNeighbourSelection;
pub use random_move::RandomMove;
pub use random_swap::RandomSwapMove;
pub use standard::StandardNeighbourSelection;
pub use suggestion::SuggestionMove;

/// Proposes neighbours for a solution.
///
/// Besides selecting, a selection receives the solution's best-solution
/// events from whoever drives it, so adaptive strategies can track progress.
pub trait NeighbourSelection<P: ValueData>: Send + Debug {
    /// Name used in logs and statistics.
    fn name(&self) -> &str;

    /// Prepares the selection for a run on `solution`.
    fn init(&mut self, _solution: &Solution<P>) {}

    /// Proposes the next neighbour, or `None` when nothing suitable exists.
    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>>;

    /// In hill-climbing mode only non-worsening neighbours are proposed.
    fn set_hc_mode(&mut self, _hc_mode: bool) {}

    fn solution_updated(&mut self, _solution: &Solution<P>) {}

    fn best_saved(&mut self, _solution: &Solution<P>) {}

    fn best_restored(&mut self, _solution: &Solution<P>) {}

    fn best_cleared(&mut self, _solution: &Solution<P>) {}

    /// Adds entries to an info map.
    fn info(&self, _solution: &Solution<P>, _info: &mut BTreeMap<String, String>) {}
}

/// Builds a selection from properties, with access to the registry for
/// nested selections.
pub type SelectionFactory<P> = Box<
    dyn Fn(&DataProperties, &SelectionRegistry<P>) -> Box<dyn NeighbourSelection<P>> + Send + Sync,
>;

/// Named constructors of neighbour selections.
///
/// Lookups accept qualified names and match on the last `.`-separated
/// segment, so `org.example.RandomMove` resolves to `RandomMove`.
pub struct SelectionRegistry<P: ValueData> {
    factories: BTreeMap<String, SelectionFactory<P>>,
}

impl<P: ValueData> SelectionRegistry<P> {
    /// A registry without any selection.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry with the built-in movers and searches.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("RandomMove", |p, _| Box::new(RandomMove::new(p)));
        registry.register("RandomSwapMove", |p, _| Box::new(RandomSwapMove::new(p)));
        registry.register("SuggestionMove", |p, _| Box::new(SuggestionMove::new(p)));
        registry.register("StandardNeighbourSelection", |p, _| {
            Box::new(StandardNeighbourSelection::new(p))
        });
        registry.register("BacktrackNeighbourSelection", |p, _| {
            Box::new(BacktrackNeighbourSelection::new(p))
        });
        registry.register("HillClimber", |p, r| Box::new(HillClimber::new(p, r)));
        registry.register("SimulatedAnnealing", |p, r| {
            Box::new(SimulatedAnnealing::new(p, r))
        });
        registry.register("GreatDeluge", |p, r| Box::new(GreatDeluge::new(p, r)));
        registry.register("SimpleSearch", |p, r| Box::new(SimpleSearch::new(p, r)));
        registry
    }

    /// Registers a constructor, replacing any previous one of that name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&DataProperties, &SelectionRegistry<P>) -> Box<dyn NeighbourSelection<P>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(short_name(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Creates the selection registered as `name`.
    pub fn create(
        &self,
        name: &str,
        properties: &DataProperties,
    ) -> Result<Box<dyn NeighbourSelection<P>>> {
        let factory = self
            .factories
            .get(short_name(name.trim()))
            .ok_or_else(|| IfsError::Config(format!("unknown neighbour selection '{name}'")))?;
        Ok(factory(properties, self))
    }
}

impl<P: ValueData> Default for SelectionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ValueData> Debug for SelectionRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Wall-clock budget of a single repair search; zero means unlimited.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeBudget {
    started: Instant,
    limit: Duration,
}

impl TimeBudget {
    pub(crate) fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub(crate) fn exhausted(&self) -> bool {
        !self.limit.is_zero() && self.started.elapsed() > self.limit
    }
}

/// A random unassigned variable, or any variable once all are assigned.
pub(crate) fn random_variable<P: ValueData>(
    model: &Model<P>,
    assignment: &Assignment,
    rng: &mut StdRng,
) -> Option<VariableId> {
    let unassigned = assignment.unassigned_variables();
    if !unassigned.is_empty() {
        return unassigned.get(rng.random_range(0..unassigned.len()));
    }
    model.variables().choose(rng).map(|variable| variable.id())
}

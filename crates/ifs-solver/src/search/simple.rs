//! Construction followed by local search, in one selection.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, error};

use ifs_config::DataProperties;
use ifs_core::ValueData;

use super::{GreatDeluge, HillClimber, SimulatedAnnealing};
use crate::neighbour::Neighbour;
use crate::selection::{NeighbourSelection, SelectionRegistry, StandardNeighbourSelection};
use crate::solution::Solution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Optional `Construction.Class` selection.
    Construction,
    /// Standard IFS until the assignment is complete.
    Ifs,
    HillClimbing,
    /// Great deluge or simulated annealing until the solver stops.
    Improvement,
}

/// Gives up after a number of calls without a better best solution.
#[derive(Debug, Clone)]
struct IdleLimit {
    max: u64,
    calls: u64,
    last_improving: u64,
}

impl IdleLimit {
    fn new(max: u64) -> Self {
        Self {
            max,
            calls: 0,
            last_improving: 0,
        }
    }

    fn exhausted(&mut self) -> bool {
        if self.calls - self.last_improving > self.max {
            return true;
        }
        self.calls += 1;
        false
    }

    fn improved(&mut self) {
        self.last_improving = self.calls;
    }
}

/// Runs the phases construction, IFS, hill climbing and then great deluge
/// or simulated annealing, moving on whenever a phase has nothing left to
/// propose.
///
/// The IFS phase uses a [`StandardNeighbourSelection`] and ends once the
/// assignment is complete, or after `Search.MaxIdleIterations` (1000, -1
/// for none) iterations without a new best solution. Before local search
/// starts, the best solution is restored if it has fewer unassigned
/// variables than the current one, unless `Suggestion.AllowUnassignments`
/// is set. `Search.GreatDeluge` (true) chooses great deluge over simulated
/// annealing for the last phase.
pub struct SimpleSearch<P: ValueData> {
    construction: Option<Box<dyn NeighbourSelection<P>>>,
    construction_until_complete: bool,
    standard: StandardNeighbourSelection,
    hill_climber: HillClimber<P>,
    great_deluge: GreatDeluge<P>,
    annealing: SimulatedAnnealing<P>,
    use_great_deluge: bool,
    max_idle: Option<u64>,
    standard_idle: Option<IdleLimit>,
    construction_idle: Option<IdleLimit>,
    allow_unassignments: bool,
    phase: Option<Phase>,
}

impl<P: ValueData> SimpleSearch<P> {
    pub fn new(properties: &DataProperties, registry: &SelectionRegistry<P>) -> Self {
        let construction = properties.get("Construction.Class").and_then(|name| {
            registry
                .create(name, properties)
                .map_err(|e| error!("Unable to use {name}: {e}"))
                .ok()
        });
        let construction_until_complete = properties.get_bool("Construction.UntilComplete", false);
        let max_idle = u64::try_from(properties.get_i64("Search.MaxIdleIterations", 1000)).ok();
        let construction_idle = match (&construction, max_idle) {
            (Some(_), Some(max)) if !construction_until_complete => Some(IdleLimit::new(max)),
            _ => None,
        };
        Self {
            construction,
            construction_until_complete,
            standard: StandardNeighbourSelection::new(properties),
            hill_climber: HillClimber::new(properties, registry),
            great_deluge: GreatDeluge::new(properties, registry),
            annealing: SimulatedAnnealing::new(properties, registry),
            use_great_deluge: properties.get_bool("Search.GreatDeluge", true),
            max_idle,
            standard_idle: max_idle.map(IdleLimit::new),
            construction_idle,
            allow_unassignments: properties.get_bool("Suggestion.AllowUnassignments", false),
            phase: None,
        }
    }

    /// The phase the search is in, `None` before the first call.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    fn enter(&mut self, phase: Phase, solution: &Solution<P>) {
        self.phase = Some(phase);
        debug!(phase = ?phase, iteration = solution.iteration(), "Simple search phase");
        match phase {
            Phase::Construction | Phase::Ifs => solution.progress().set_phase(
                "Searching for initial solution ...",
                solution.model().nr_variables() as u64,
            ),
            Phase::HillClimbing | Phase::Improvement => {
                solution.progress().set_phase("Improving found solution ...", 100)
            }
        }
    }

    fn restore_if_fewer_unassigned(&mut self, solution: &mut Solution<P>) {
        let unassigned = solution.assignment().nr_unassigned_variables();
        if solution.best_unassigned().is_some_and(|best| best < unassigned) && solution.restore_best() {
            self.for_each_child(|child| child.best_restored(solution));
        }
    }

    fn construct(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        if self.construction_idle.as_mut().is_some_and(IdleLimit::exhausted) {
            return None;
        }
        self.construction.as_mut()?.select_neighbour(solution)
    }

    fn standard(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        if self.standard_idle.as_mut().is_some_and(IdleLimit::exhausted) {
            return None;
        }
        self.standard.select_neighbour(solution)
    }

    /// Construction (or IFS) fallback while variables remain unassigned
    /// and idle limits are off.
    fn complete_first(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        if self.max_idle.is_some() || solution.is_complete() {
            return None;
        }
        if self.construction.is_some() {
            self.construct(solution)
        } else {
            self.standard(solution)
        }
    }

    fn children(&mut self) -> [&mut dyn NeighbourSelection<P>; 4] {
        [
            &mut self.standard,
            &mut self.hill_climber,
            &mut self.great_deluge,
            &mut self.annealing,
        ]
    }

    fn for_each_child(&mut self, mut f: impl FnMut(&mut dyn NeighbourSelection<P>)) {
        if let Some(construction) = self.construction.as_deref_mut() {
            f(construction);
        }
        for child in self.children() {
            f(child);
        }
    }
}

impl<P: ValueData> NeighbourSelection<P> for SimpleSearch<P> {
    fn name(&self) -> &str {
        "SimpleSearch"
    }

    fn init(&mut self, solution: &Solution<P>) {
        self.phase = None;
        self.for_each_child(|child| child.init(solution));
    }

    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        if self.phase.is_none() {
            let first = if self.construction.is_some() {
                Phase::Construction
            } else {
                Phase::Ifs
            };
            self.enter(first, solution);
        }

        if self.phase == Some(Phase::Construction) {
            if !solution.is_complete() {
                let neighbour = self.construct(solution);
                if neighbour.is_some() || self.construction_until_complete {
                    return neighbour;
                }
            }
            self.enter(Phase::Ifs, solution);
        }

        if self.phase == Some(Phase::Ifs) {
            if !solution.is_complete() {
                if let Some(neighbour) = self.standard(solution) {
                    return Some(neighbour);
                }
            }
            self.enter(Phase::HillClimbing, solution);
            self.restore_if_fewer_unassigned(solution);
        }

        if self.phase == Some(Phase::HillClimbing) {
            if let Some(neighbour) = self.complete_first(solution) {
                return Some(neighbour);
            }
            if self.max_idle.is_some() && !self.allow_unassignments {
                self.restore_if_fewer_unassigned(solution);
            }
            if let Some(neighbour) = self.hill_climber.select_neighbour(solution) {
                return Some(neighbour);
            }
            self.enter(Phase::Improvement, solution);
        }

        if let Some(neighbour) = self.complete_first(solution) {
            return Some(neighbour);
        }
        if self.max_idle.is_some() && !self.allow_unassignments {
            self.restore_if_fewer_unassigned(solution);
        }
        if self.use_great_deluge {
            self.great_deluge.select_neighbour(solution)
        } else {
            self.annealing.select_neighbour(solution)
        }
    }

    fn solution_updated(&mut self, solution: &Solution<P>) {
        self.for_each_child(|child| child.solution_updated(solution));
    }

    fn best_saved(&mut self, solution: &Solution<P>) {
        for idle in [&mut self.standard_idle, &mut self.construction_idle].into_iter().flatten() {
            idle.improved();
        }
        self.for_each_child(|child| child.best_saved(solution));
    }

    fn best_restored(&mut self, solution: &Solution<P>) {
        self.for_each_child(|child| child.best_restored(solution));
    }

    fn best_cleared(&mut self, solution: &Solution<P>) {
        self.for_each_child(|child| child.best_cleared(solution));
    }

    fn info(&self, solution: &Solution<P>, info: &mut BTreeMap<String, String>) {
        if let Some(phase) = self.phase {
            info.insert("Phase".to_string(), format!("{phase:?}"));
        }
        match self.phase {
            Some(Phase::Construction) => {
                if let Some(construction) = &self.construction {
                    construction.info(solution, info);
                }
            }
            Some(Phase::Ifs) | None => self.standard.info(solution, info),
            Some(Phase::HillClimbing) => self.hill_climber.info(solution, info),
            Some(Phase::Improvement) if self.use_great_deluge => self.great_deluge.info(solution, info),
            Some(Phase::Improvement) => self.annealing.info(solution, info),
        }
    }
}

impl<P: ValueData> fmt::Debug for SimpleSearch<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleSearch")
            .field("phase", &self.phase)
            .field("construction", &self.construction.as_ref().map(|c| c.name().to_string()))
            .field("use_great_deluge", &self.use_great_deluge)
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

//! The iterative forward search loop.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use ifs_config::{DataProperties, GeneralConfig, TerminationConfig};
use ifs_core::{Assignment, Model, ValueData, ValueId};

use crate::comparator::{GeneralComparator, MppComparator, SolutionComparator};
use crate::event::SolverListener;
use crate::neighbour::Neighbour;
use crate::perturbations::{DefaultPerturbationsCounter, ViolatedInitials};
use crate::selection::{NeighbourSelection, SelectionRegistry, StandardNeighbourSelection};
use crate::solution::Solution;
use crate::statistics::{BestImprovement, ConflictStatistics, SolveStatistics};
use crate::termination::{AnyTermination, TerminationCondition};

/// Selection used when `Neighbour.Class` is not set.
pub const DEFAULT_SELECTION: &str = "StandardNeighbourSelection";

/// Extensions `Extensions.Classes` may list.
pub const KNOWN_EXTENSIONS: &[&str] = &["ConflictStatistics"];

/// Drives a solution: select a neighbour, apply it, update, save the best,
/// until a termination condition holds or the solver is stopped.
///
/// Components not set explicitly are built from the properties when
/// solving starts: the selection from `Neighbour.Class`, termination from
/// `Termination.*`, and the comparator from `General.MPP`. Listing
/// `ConflictStatistics` in `Extensions.Classes` registers a
/// [`ConflictStatistics`] listener, shared with every solution the solver
/// runs so that value selection can read it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ifs_config::DataProperties;
/// use ifs_solver::Solver;
/// use ifs_test::queens_model;
///
/// let properties = DataProperties::new()
///     .with("General.Seed", 7)
///     .with("Value.RandomWalkProb", 0.02)
///     .with("Termination.StopWhenComplete", true)
///     .with("Termination.MaxIters", 100_000);
/// let mut solver = Solver::new(properties);
/// let mut solution = solver.create_solution(Arc::new(queens_model(6)));
/// let statistics = solver.solve(&mut solution);
///
/// assert!(solution.is_complete());
/// assert!(statistics.iterations > 0);
/// ```
pub struct Solver<P: ValueData> {
    properties: DataProperties,
    general: GeneralConfig,
    termination_config: TerminationConfig,
    registry: Arc<SelectionRegistry<P>>,
    selection: Option<Box<dyn NeighbourSelection<P>>>,
    termination: Option<Box<dyn TerminationCondition<P>>>,
    comparator: Option<Box<dyn SolutionComparator<P>>>,
    listeners: Vec<Arc<dyn SolverListener<P>>>,
    violated_initials: Option<Arc<ViolatedInitials>>,
    conflict_statistics: Option<Arc<ConflictStatistics>>,
    terminate_early_flag: Arc<AtomicBool>,
    solving: Arc<AtomicBool>,
}

impl<P: ValueData> Solver<P> {
    /// Creates a solver with the built-in selections.
    pub fn new(properties: DataProperties) -> Self {
        Self::with_registry(properties, Arc::new(SelectionRegistry::new()))
    }

    /// Creates a solver resolving selection names through `registry`.
    pub fn with_registry(properties: DataProperties, registry: Arc<SelectionRegistry<P>>) -> Self {
        let general = GeneralConfig::from_properties(&properties);
        for extension in &general.extensions {
            if !KNOWN_EXTENSIONS.contains(&extension.as_str()) {
                warn!("Unknown extension {extension}, ignoring it");
            }
        }
        let conflict_statistics = general
            .has_extension("ConflictStatistics")
            .then(|| Arc::new(ConflictStatistics::new(&properties)));
        let mut listeners: Vec<Arc<dyn SolverListener<P>>> = Vec::new();
        if let Some(statistics) = &conflict_statistics {
            listeners.push(Arc::clone(statistics) as Arc<dyn SolverListener<P>>);
        }
        Self {
            general,
            termination_config: TerminationConfig::from_properties(&properties),
            properties,
            registry,
            selection: None,
            termination: None,
            comparator: None,
            listeners,
            violated_initials: None,
            conflict_statistics,
            terminate_early_flag: Arc::new(AtomicBool::new(false)),
            solving: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `selection` instead of `Neighbour.Class`.
    pub fn with_selection(mut self, selection: Box<dyn NeighbourSelection<P>>) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Uses `termination` instead of `Termination.*`.
    pub fn with_termination(mut self, termination: impl TerminationCondition<P> + 'static) -> Self {
        self.termination = Some(Box::new(termination));
        self
    }

    pub fn with_comparator(mut self, comparator: impl SolutionComparator<P> + 'static) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Shares a stop flag with other solvers.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.terminate_early_flag = flag;
        self
    }

    /// Reuses violated initials computed for the same model in MPP mode.
    pub fn with_violated_initials(mut self, violated: Arc<ViolatedInitials>) -> Self {
        self.violated_initials = Some(violated);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn SolverListener<P>>) {
        self.listeners.push(listener);
    }

    pub fn properties(&self) -> &DataProperties {
        &self.properties
    }

    pub fn general(&self) -> &GeneralConfig {
        &self.general
    }

    pub fn registry(&self) -> &Arc<SelectionRegistry<P>> {
        &self.registry
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminate_early_flag)
    }

    /// The conflict statistics, when the extension is enabled.
    pub fn conflict_statistics(&self) -> Option<&Arc<ConflictStatistics>> {
        self.conflict_statistics.as_ref()
    }

    /// Requests the running solve to stop after the current iteration.
    ///
    /// This method is thread-safe and can be called from another thread
    /// through a clone of [`stop_flag`](Self::stop_flag) as well.
    pub fn terminate_early(&self) -> bool {
        if self.solving.load(Ordering::SeqCst) {
            self.terminate_early_flag.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn is_solving(&self) -> bool {
        self.solving.load(Ordering::SeqCst)
    }

    /// Creates a solution over an empty assignment of `model`.
    pub fn create_solution(&self, model: Arc<Model<P>>) -> Solution<P> {
        let assignment = model.create_assignment(0);
        self.solution_for(model, assignment)
    }

    /// Wraps an existing assignment in a solution configured for this
    /// solver: seeded random generator, perturbation counter in MPP mode,
    /// conflict statistics and the solver's stop flag.
    pub fn solution_for(&self, model: Arc<Model<P>>, assignment: Assignment) -> Solution<P> {
        let mpp = self.general.mpp;
        let mut solution = Solution::with_assignment(Arc::clone(&model), assignment)
            .with_stop_flag(Arc::clone(&self.terminate_early_flag));
        if let Some(seed) = self.general.seed {
            let index = solution.assignment().index() as u64;
            solution = solution.with_seed(seed.wrapping_add(index));
        }
        if mpp {
            let violated = match &self.violated_initials {
                Some(violated) => Arc::clone(violated),
                None => Arc::new(ViolatedInitials::init(&model)),
            };
            solution = solution.with_perturbations_counter(Arc::new(
                DefaultPerturbationsCounter::with_violated_initials(violated),
            ));
        }
        if let Some(statistics) = &self.conflict_statistics {
            solution = solution.with_conflict_statistics(Arc::clone(statistics));
        }
        solution
    }

    /// Values each assignment of `neighbour` will push out, excluding
    /// variables the neighbour reassigns itself. Lazy neighbours report
    /// nothing.
    fn bumped_values(solution: &Solution<P>, neighbour: &dyn Neighbour<P>) -> Vec<(ValueId, Vec<ValueId>)> {
        if neighbour.is_lazy() {
            return Vec::new();
        }
        let model = solution.model();
        let assignments = neighbour.assignments();
        assignments
            .iter()
            .map(|&(_, value)| {
                let bumped = model
                    .conflict_values(solution.assignment(), value)
                    .into_iter()
                    .filter(|&conflict| {
                        let variable = model.value(conflict).variable();
                        !assignments.iter().any(|&(other, _)| other == variable)
                    })
                    .collect();
                (value, bumped)
            })
            .collect()
    }

    fn take_selection(&mut self) -> Box<dyn NeighbourSelection<P>> {
        if let Some(selection) = self.selection.take() {
            return selection;
        }
        let name = self.properties.get_str("Neighbour.Class", DEFAULT_SELECTION);
        match self.registry.create(&name, &self.properties) {
            Ok(selection) => selection,
            Err(e) => {
                error!("Unable to use {name}: {e}, falling back to {DEFAULT_SELECTION}");
                self.registry
                    .create(DEFAULT_SELECTION, &self.properties)
                    .unwrap_or_else(|_| Box::new(StandardNeighbourSelection::new(&self.properties)))
            }
        }
    }

    fn take_termination(&mut self) -> Box<dyn TerminationCondition<P>> {
        self.termination.take().unwrap_or_else(|| {
            Box::new(AnyTermination::from_config(
                &self.termination_config,
                self.general.mpp,
            ))
        })
    }

    fn take_comparator(&mut self) -> Box<dyn SolutionComparator<P>> {
        self.comparator.take().unwrap_or_else(|| {
            if self.general.mpp {
                Box::new(MppComparator)
            } else {
                Box::new(GeneralComparator)
            }
        })
    }

    fn may_save_best(&self, solution: &Solution<P>) -> bool {
        let limit = self.general.save_best_unassigned;
        limit < 0
            || i64::try_from(solution.assignment().nr_unassigned_variables())
                .is_ok_and(|unassigned| unassigned <= limit)
    }

    /// Runs the search on `solution` until termination and leaves the best
    /// solution found in its assignment.
    pub fn solve(&mut self, solution: &mut Solution<P>) -> SolveStatistics {
        self.solving.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let mut statistics = SolveStatistics::new(solution.assignment().index());

        let mut selection = self.take_selection();
        let termination = self.take_termination();
        let comparator = self.take_comparator();

        info!(
            event = "solve_start",
            index = statistics.index,
            variables = solution.model().nr_variables(),
            constraints = solution.model().constraints().len(),
            selection = selection.name(),
            mpp = self.general.mpp,
        );
        if solution.model().nr_variables() == 0 {
            warn!("Model has no variables");
        }

        if let Some(statistics) = &self.conflict_statistics {
            if solution.conflict_statistics().is_none() {
                solution.set_conflict_statistics(Arc::clone(statistics));
            }
        }
        selection.init(solution);
        if !solution.has_best() && self.may_save_best(solution) {
            solution.save_best();
            selection.best_saved(solution);
        }

        loop {
            if self.terminate_early_flag.load(Ordering::SeqCst) || solution.is_stopped() {
                statistics.stopped = true;
                break;
            }
            if termination.is_terminated(solution) {
                break;
            }

            let mut success = false;
            if let Some(mut neighbour) = selection.select_neighbour(solution) {
                let iteration = solution.iteration();
                let vetoed = self.listeners.iter().any(|listener| {
                    !listener.neighbour_selected(solution.assignment(), iteration, neighbour.as_ref())
                });
                if vetoed {
                    debug!(iteration, "Neighbour vetoed: {neighbour:?}");
                    solution.undo(neighbour.as_mut());
                } else {
                    let bumped = if self.listeners.is_empty() {
                        Vec::new()
                    } else {
                        Self::bumped_values(solution, neighbour.as_ref())
                    };
                    solution.apply(neighbour.as_mut());
                    success = true;
                    for (assigned, unassigned) in &bumped {
                        for listener in &self.listeners {
                            listener.neighbour_assigned(solution.model(), iteration, *assigned, unassigned);
                        }
                    }
                }
            }
            solution.update(started.elapsed().as_secs_f64(), success);
            selection.solution_updated(solution);

            if self.may_save_best(solution)
                && solution.save_best_if(|current, best| comparator.is_better_than_best(current, best))
            {
                selection.best_saved(solution);
                statistics.improvements.push(BestImprovement {
                    time_offset: started.elapsed(),
                    iteration: solution.iteration(),
                    unassigned: solution.assignment().nr_unassigned_variables(),
                    value: solution.total_value(),
                });
                debug!(
                    iteration = solution.iteration(),
                    unassigned = solution.assignment().nr_unassigned_variables(),
                    value = solution.total_value(),
                    "New best solution"
                );
            }
        }

        statistics.iterations = solution.iteration();
        statistics.failed_iterations = solution.failed_iterations();
        if solution.restore_best() {
            selection.best_restored(solution);
        }
        statistics.duration = started.elapsed();

        if !solution.is_complete() {
            warn!(
                unassigned = solution.assignment().nr_unassigned_variables(),
                "No complete solution found"
            );
        }
        info!(
            event = "solve_end",
            index = statistics.index,
            iterations = statistics.iterations,
            duration_ms = statistics.duration.as_millis() as u64,
            unassigned = solution.assignment().nr_unassigned_variables(),
            value = solution.total_value(),
            improvements = statistics.improvement_count(),
            stopped = statistics.stopped,
        );

        self.selection = Some(selection);
        self.solving.store(false, Ordering::SeqCst);
        statistics
    }
}

impl<P: ValueData> Debug for Solver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solver")
            .field("general", &self.general)
            .field("termination", &self.termination_config)
            .field("selection", &self.selection.as_ref().map(|s| s.name().to_string()))
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "solver_tests.rs"]
mod tests;

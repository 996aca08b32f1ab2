//! Several solvers racing on copies of one assignment.
//!
//! Every worker runs its own [`Solver`] on a scoped thread. Workers share the
//! immutable model, the best record and a stop flag; the first worker to
//! finish stops the others, and the best solution across all of them is
//! returned.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ifs_config::DataProperties;
//! use ifs_solver::ParallelSolver;
//! use ifs_test::queens_model;
//!
//! let properties = DataProperties::new()
//!     .with("General.Seed", 11)
//!     .with("Parallel.NrSolvers", 2)
//!     .with("Value.RandomWalkProb", 0.02)
//!     .with("Termination.MaxIters", 100_000)
//!     .with("Termination.StopWhenComplete", true);
//! let solver = ParallelSolver::new(properties);
//! let outcome = solver.solve(Arc::new(queens_model(6)), None).unwrap();
//!
//! assert!(outcome.solution.is_complete());
//! assert_eq!(outcome.statistics.len(), 2);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use ifs_config::{DataProperties, GeneralConfig};
use ifs_core::{Assignment, IfsError, Model, Result, ValueData};

use crate::event::SolverListener;
use crate::perturbations::ViolatedInitials;
use crate::selection::SelectionRegistry;
use crate::solution::{BestRecord, SharedBest, Solution};
use crate::solver::Solver;
use crate::statistics::SolveStatistics;

/// Result of a parallel run.
#[derive(Debug)]
pub struct ParallelOutcome<P: ValueData> {
    /// Solution of the worker that found the best assignment, with that
    /// assignment restored.
    pub solution: Solution<P>,
    /// Statistics of every worker, ordered by worker.
    pub statistics: Vec<SolveStatistics>,
}

/// Runs `Parallel.NrSolvers` solvers against a shared best record.
pub struct ParallelSolver<P: ValueData> {
    properties: DataProperties,
    general: GeneralConfig,
    registry: Arc<SelectionRegistry<P>>,
    listeners: Vec<Arc<dyn SolverListener<P>>>,
    stop: Arc<AtomicBool>,
}

impl<P: ValueData> ParallelSolver<P> {
    pub fn new(properties: DataProperties) -> Self {
        Self::with_registry(properties, Arc::new(SelectionRegistry::new()))
    }

    pub fn with_registry(properties: DataProperties, registry: Arc<SelectionRegistry<P>>) -> Self {
        Self {
            general: GeneralConfig::from_properties(&properties),
            properties,
            registry,
            listeners: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Adds a listener given to every worker.
    pub fn add_listener(&mut self, listener: Arc<dyn SolverListener<P>>) {
        self.listeners.push(listener);
    }

    pub fn nr_solvers(&self) -> usize {
        self.general.nr_solvers
    }

    /// Flag stopping all workers once set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Solves `model` starting from `initial`, or from an empty assignment.
    ///
    /// Worker `i` works on assignment index `i + 1`, seeded with
    /// `General.Seed + i + 1` when a seed is set.
    ///
    /// # Errors
    ///
    /// Returns [`IfsError::InvalidState`] if `initial` does not belong to
    /// `model`, and [`IfsError::Internal`] if a worker panicked.
    pub fn solve(&self, model: Arc<Model<P>>, initial: Option<&Assignment>) -> Result<ParallelOutcome<P>> {
        let base = match initial {
            Some(assignment) => model.copy_assignment(assignment, 0)?,
            None => model.create_assignment(0),
        };
        self.stop.store(false, Ordering::SeqCst);
        let best = BestRecord::shared();
        let nr_solvers = self.general.nr_solvers;

        let solutions = self.workers(&model, &base, &best)?;

        info!(
            event = "parallel_solve_start",
            nr_solvers,
            variables = model.nr_variables(),
        );

        let finished = thread::scope(|scope| {
            let handles: Vec<_> = solutions
                .into_iter()
                .map(|(mut solver, mut solution)| {
                    let stop = Arc::clone(&self.stop);
                    scope.spawn(move || {
                        let statistics = solver.solve(&mut solution);
                        if !stop.swap(true, Ordering::SeqCst) {
                            debug!(index = statistics.index, "First worker finished, stopping the others");
                        }
                        (solution, statistics)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| IfsError::Internal("solver worker panicked".to_string()))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let winner = best.index();
        let mut statistics = Vec::with_capacity(finished.len());
        let mut chosen = None;
        for (solution, stats) in finished {
            statistics.push(stats);
            let wins = Some(solution.assignment().index()) == winner;
            if chosen.is_none() || wins {
                chosen = Some(solution);
            }
        }
        let solution = chosen.ok_or_else(|| IfsError::Internal("no solver worker ran".to_string()))?;

        info!(
            event = "parallel_solve_end",
            winner = solution.assignment().index(),
            unassigned = solution.assignment().nr_unassigned_variables(),
            value = solution.total_value(),
        );
        Ok(ParallelOutcome { solution, statistics })
    }

    /// One solver and solution per worker. In MPP mode the violated
    /// initials are computed once and shared by all of them.
    fn workers(
        &self,
        model: &Arc<Model<P>>,
        base: &Assignment,
        best: &SharedBest,
    ) -> Result<Vec<(Solver<P>, Solution<P>)>> {
        let violated = self
            .general
            .mpp
            .then(|| Arc::new(ViolatedInitials::init(model)));
        let mut workers = Vec::with_capacity(self.general.nr_solvers);
        for index in 1..=self.general.nr_solvers {
            let assignment = model.copy_assignment(base, index)?;
            let solver = self.worker(violated.as_ref());
            let solution = solver
                .solution_for(Arc::clone(model), assignment)
                .with_best(Arc::clone(best));
            workers.push((solver, solution));
        }
        Ok(workers)
    }

    fn worker(&self, violated: Option<&Arc<ViolatedInitials>>) -> Solver<P> {
        let mut solver = Solver::with_registry(self.properties.clone(), Arc::clone(&self.registry))
            .with_stop_flag(Arc::clone(&self.stop));
        if let Some(violated) = violated {
            solver = solver.with_violated_initials(Arc::clone(violated));
        }
        for listener in &self.listeners {
            solver.add_listener(Arc::clone(listener));
        }
        solver
    }
}

impl<P: ValueData> std::fmt::Debug for ParallelSolver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelSolver")
            .field("nr_solvers", &self.general.nr_solvers)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifs_test::{coloring_model, count_attacks, cycle_edges, mpp_queens_model, queens_model};

    #[test]
    fn test_parallel_queens() {
        let properties = DataProperties::new()
            .with("General.Seed", 3)
            .with("Parallel.NrSolvers", 3)
            .with("Value.RandomWalkProb", 0.02)
            .with("Termination.StopWhenComplete", true)
            .with("Termination.MaxIters", 100_000);
        let solver = ParallelSolver::new(properties);
        let outcome = solver.solve(Arc::new(queens_model(8)), None).unwrap();

        assert!(outcome.solution.is_complete());
        assert_eq!(count_attacks(outcome.solution.model(), outcome.solution.assignment()), 0);
        assert_eq!(outcome.statistics.len(), 3);
        let indexes: Vec<_> = outcome.statistics.iter().map(|s| s.index).collect();
        assert_eq!(indexes, [1, 2, 3]);
        assert!(solver.stop_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_parallel_keeps_initial_assignment() {
        let model = Arc::new(queens_model(4));
        let mut initial = model.create_assignment(0);
        for (column, row) in [1, 3, 0, 2].into_iter().enumerate() {
            model.assign(&mut initial, 1, model.variables()[column].values()[row]);
        }
        let properties = DataProperties::new()
            .with("Parallel.NrSolvers", 2)
            .with("Termination.StopWhenComplete", true);
        let outcome = ParallelSolver::new(properties)
            .solve(Arc::clone(&model), Some(&initial))
            .unwrap();

        assert_eq!(outcome.solution.assignment().snapshot(), initial.snapshot());
        assert!(outcome.statistics.iter().all(|s| s.iterations == 0));
    }

    #[test]
    fn test_workers_share_violated_initials() {
        let model = Arc::new(mpp_queens_model(6, &[Some(1), Some(3), Some(5), None, None, None]));
        let properties = DataProperties::new()
            .with("General.MPP", true)
            .with("Parallel.NrSolvers", 3);
        let solver = ParallelSolver::<usize>::new(properties);
        let base = model.create_assignment(0);
        let workers = solver.workers(&model, &base, &BestRecord::shared()).unwrap();

        let shared: Vec<_> = workers
            .iter()
            .map(|(_, solution)| {
                let counter = solution.perturbations_counter().unwrap();
                Arc::clone(counter.violated_initials().unwrap())
            })
            .collect();
        assert_eq!(shared.len(), 3);
        assert!(shared.iter().all(|v| Arc::ptr_eq(v, &shared[0])));
    }

    #[test]
    fn test_shared_model_across_threads() {
        let model = Arc::new(coloring_model(12, 3, &cycle_edges(12)));
        let totals = std::sync::Mutex::new(Vec::new());
        rayon::scope(|s| {
            for index in 0..8usize {
                let model = &model;
                let totals = &totals;
                s.spawn(move |_| {
                    let mut assignment = model.create_assignment(index);
                    for (node, variable) in model.variables().iter().enumerate() {
                        model.assign(&mut assignment, 1, variable.values()[(node + index) % 2]);
                    }
                    let assigned = model.total_value(&assignment);
                    for variable in model.variables() {
                        model.unassign(&mut assignment, 2, variable.id());
                    }
                    let cleared = model.total_value(&assignment);
                    totals.lock().unwrap().push((assigned, cleared));
                });
            }
        });

        let totals = totals.into_inner().unwrap();
        assert_eq!(totals.len(), 8);
        assert!(totals.iter().all(|&(assigned, cleared)| assigned == 6.0 && cleared == 0.0));
    }
}

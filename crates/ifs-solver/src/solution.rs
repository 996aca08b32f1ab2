//! Solution: a model, a live assignment and the best snapshot found so far.
//!
//! The best snapshot lives in a [`BestRecord`] behind an `Arc`, so parallel
//! workers searching their own assignments can share one record. Saving,
//! restoring and clearing hold the record's lock for the whole operation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use ifs_core::{Assignment, Model, ValueData, ValueId, VariableId};

use crate::event::SolutionListener;
use crate::neighbour::Neighbour;
use crate::perturbations::PerturbationsCounter;
use crate::progress::{Progress, TracingProgress};
use crate::statistics::ConflictStatistics;

/// Snapshot of the best assignment and its figures.
#[derive(Debug, Clone)]
pub struct BestSolution {
    /// Value of every variable, indexed by variable.
    pub values: Vec<Option<ValueId>>,
    /// Iteration stamp of every variable when the snapshot was taken.
    pub stamps: Vec<u64>,
    pub info: BTreeMap<String, String>,
    pub iteration: u64,
    pub failed_iterations: u64,
    /// Seconds since the solver started.
    pub time: f64,
    pub complete: bool,
    pub unassigned: usize,
    pub value: f64,
    pub perturbations_penalty: f64,
    /// Index of the assignment that saved the snapshot.
    pub index: usize,
}

/// Lock-protected best snapshot, shared between solutions.
#[derive(Debug, Default)]
pub struct BestRecord {
    best: Mutex<Option<BestSolution>>,
}

/// Shared handle to a best record.
pub type SharedBest = Arc<BestRecord>;

impl BestRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedBest {
        Arc::new(Self::new())
    }

    /// Locks the record. A poisoned lock is recovered; the snapshot is
    /// replaced as a whole, so it is never left half-written.
    pub fn lock(&self) -> MutexGuard<'_, Option<BestSolution>> {
        self.best.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the snapshot.
    pub fn get(&self) -> Option<BestSolution> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    pub fn value(&self) -> Option<f64> {
        self.lock().as_ref().map(|best| best.value)
    }

    pub fn unassigned(&self) -> Option<usize> {
        self.lock().as_ref().map(|best| best.unassigned)
    }

    pub fn perturbations_penalty(&self) -> Option<f64> {
        self.lock().as_ref().map(|best| best.perturbations_penalty)
    }

    pub fn iteration(&self) -> Option<u64> {
        self.lock().as_ref().map(|best| best.iteration)
    }

    pub fn index(&self) -> Option<usize> {
        self.lock().as_ref().map(|best| best.index)
    }
}

/// A model coupled with a live assignment and search bookkeeping.
pub struct Solution<P: ValueData> {
    model: Arc<Model<P>>,
    assignment: Assignment,
    iteration: u64,
    failed_iterations: u64,
    time: f64,
    rng: StdRng,
    best: SharedBest,
    perturbations: Option<Arc<dyn PerturbationsCounter<P>>>,
    conflict_statistics: Option<Arc<ConflictStatistics>>,
    listeners: Vec<Arc<dyn SolutionListener<P>>>,
    progress: Arc<dyn Progress>,
    stop: Arc<AtomicBool>,
}

impl<P: ValueData> Solution<P> {
    /// Creates a solution with an empty assignment.
    pub fn new(model: Arc<Model<P>>) -> Self {
        let assignment = model.create_assignment(0);
        Self::with_assignment(model, assignment)
    }

    /// Creates a solution over an existing assignment of `model`.
    pub fn with_assignment(model: Arc<Model<P>>, assignment: Assignment) -> Self {
        Self {
            model,
            assignment,
            iteration: 0,
            failed_iterations: 0,
            time: 0.0,
            rng: StdRng::from_os_rng(),
            best: BestRecord::shared(),
            perturbations: None,
            conflict_statistics: None,
            listeners: Vec::new(),
            progress: Arc::new(TracingProgress::new()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seeds the random generator used by the search.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Shares a best record with other solutions.
    pub fn with_best(mut self, best: SharedBest) -> Self {
        self.best = best;
        self
    }

    pub fn with_perturbations_counter(mut self, counter: Arc<dyn PerturbationsCounter<P>>) -> Self {
        self.perturbations = Some(counter);
        self
    }

    pub fn with_conflict_statistics(mut self, statistics: Arc<ConflictStatistics>) -> Self {
        self.conflict_statistics = Some(statistics);
        self
    }

    pub fn set_conflict_statistics(&mut self, statistics: Arc<ConflictStatistics>) {
        self.conflict_statistics = Some(statistics);
    }

    /// Conflict statistics read by conflict-aware selections.
    pub fn conflict_statistics(&self) -> Option<&Arc<ConflictStatistics>> {
        self.conflict_statistics.as_ref()
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn set_stop_flag(&mut self, stop: Arc<AtomicBool>) {
        self.stop = stop;
    }

    pub fn add_listener(&mut self, listener: Arc<dyn SolutionListener<P>>) {
        self.listeners.push(listener);
    }

    pub fn model(&self) -> &Arc<Model<P>> {
        &self.model
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn assignment_mut(&mut self) -> &mut Assignment {
        &mut self.assignment
    }

    /// Model, assignment and random generator borrowed together.
    pub fn split_mut(&mut self) -> (&Model<P>, &mut Assignment, &mut StdRng) {
        (&*self.model, &mut self.assignment, &mut self.rng)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn into_assignment(self) -> Assignment {
        self.assignment
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn failed_iterations(&self) -> u64 {
        self.failed_iterations
    }

    /// Seconds since the solver started, as of the last update.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn progress(&self) -> &Arc<dyn Progress> {
        &self.progress
    }

    pub fn perturbations_counter(&self) -> Option<&Arc<dyn PerturbationsCounter<P>>> {
        self.perturbations.as_ref()
    }

    pub fn best_record(&self) -> &SharedBest {
        &self.best
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_complete(&self) -> bool {
        self.assignment.nr_unassigned_variables() == 0
    }

    pub fn total_value(&self) -> f64 {
        self.model.total_value(&self.assignment)
    }

    /// Penalty of the current assignment; zero without a counter.
    pub fn perturbation_penalty(&self) -> f64 {
        self.perturbations
            .as_ref()
            .map_or(0.0, |counter| counter.perturbation_penalty(&self.model, &self.assignment))
    }

    /// Variables moved away from their initial values.
    pub fn perturbed_variables(&self) -> Vec<VariableId> {
        self.model.perturb_variables(&self.assignment, false)
    }

    /// Applies a neighbour at the current iteration.
    pub fn apply(&mut self, neighbour: &mut dyn Neighbour<P>) {
        neighbour.assign(&self.model, &mut self.assignment, self.iteration);
    }

    /// Reverts a neighbour that recorded its change.
    pub fn undo(&mut self, neighbour: &mut dyn Neighbour<P>) {
        neighbour.undo(&self.model, &mut self.assignment);
    }

    /// Advances to the next iteration and notifies listeners.
    pub fn update(&mut self, time: f64, success: bool) {
        self.time = time;
        self.iteration += 1;
        if !success {
            self.failed_iterations += 1;
        }
        self.notify(|listener, solution| listener.solution_updated(solution));
    }

    fn notify(&self, f: impl Fn(&dyn SolutionListener<P>, &Self)) {
        for listener in &self.listeners {
            f(listener.as_ref(), self);
        }
    }

    fn base_info(&self) -> BTreeMap<String, String> {
        let mut info = self.model.info(&self.assignment);
        info.insert("Iteration".to_string(), self.iteration.to_string());
        info.insert("Time".to_string(), format!("{:.2} sec", self.time));
        if self.time > 0.0 {
            info.insert(
                "Speed".to_string(),
                format!("{:.2} it/s", self.iteration as f64 / self.time),
            );
        }
        if let Some(counter) = &self.perturbations {
            counter.info(&self.model, &self.assignment, &mut info);
        }
        info
    }

    /// Summary of the current state, including listener contributions.
    pub fn info(&self) -> BTreeMap<String, String> {
        let mut info = self.base_info();
        for listener in &self.listeners {
            listener.info(self, &mut info);
        }
        info
    }

    fn snapshot(&self) -> BestSolution {
        BestSolution {
            values: self.assignment.snapshot(),
            stamps: self
                .model
                .variables()
                .iter()
                .map(|v| self.assignment.iteration(v.id()))
                .collect(),
            info: self.base_info(),
            iteration: self.iteration,
            failed_iterations: self.failed_iterations,
            time: self.time,
            complete: self.is_complete(),
            unassigned: self.assignment.nr_unassigned_variables(),
            value: self.total_value(),
            perturbations_penalty: self.perturbation_penalty(),
            index: self.assignment.index(),
        }
    }

    /// Saves the current assignment as the best one.
    pub fn save_best(&mut self) {
        self.save_best_if(|_, _| true);
    }

    /// Saves the current assignment if `better` approves it against the
    /// current best. The check and the save happen under one lock, so
    /// `better` must not touch the best record itself.
    pub fn save_best_if<F>(&mut self, better: F) -> bool
    where
        F: FnOnce(&Self, Option<&BestSolution>) -> bool,
    {
        let record = Arc::clone(&self.best);
        let saved = {
            let mut best = record.lock();
            if better(self, best.as_ref()) {
                *best = Some(self.snapshot());
                true
            } else {
                false
            }
        };
        if saved {
            self.notify(|listener, solution| listener.best_saved(solution));
        }
        saved
    }

    /// Forgets the best snapshot.
    pub fn clear_best(&mut self) {
        *self.best.lock() = None;
        self.notify(|listener, solution| listener.best_cleared(solution));
    }

    /// Reverts the assignment to the best snapshot. Returns false when there
    /// is nothing to restore.
    ///
    /// Variables that differ are unassigned first; best values are then
    /// reassigned in the order they were originally assigned. Values that
    /// still conflict are retried in random order, bumping their conflicts,
    /// up to three times as many attempts as there were such values.
    pub fn restore_best(&mut self) -> bool {
        let record = Arc::clone(&self.best);
        {
            let best = record.lock();
            let Some(best) = best.as_ref() else {
                return false;
            };
            self.restore_from(best);
            self.iteration = best.iteration;
            self.failed_iterations = best.failed_iterations;
            self.time = best.time;
        }
        self.notify(|listener, solution| listener.best_restored(solution));
        true
    }

    fn restore_from(&mut self, best: &BestSolution) {
        let model = Arc::clone(&self.model);
        let iteration = self.iteration;
        let mut order: Vec<VariableId> = Vec::new();
        for variable in model.variables() {
            let id = variable.id();
            let target = best.values.get(id.index()).copied().flatten();
            match self.assignment.value(id) {
                Some(current) if Some(current) == target => {}
                Some(_) => {
                    model.unassign(&mut self.assignment, iteration, id);
                    if target.is_some() {
                        order.push(id);
                    }
                }
                None => {
                    if target.is_some() {
                        order.push(id);
                    }
                }
            }
        }
        let stamp = |v: VariableId| best.stamps.get(v.index()).copied().unwrap_or(0);
        order.sort_by_key(|&v| (stamp(v), v));

        let mut problems: Vec<ValueId> = Vec::new();
        for variable in order {
            let Some(value) = best.values[variable.index()] else {
                continue;
            };
            if model.in_conflict(&self.assignment, value) {
                warn!("Restore best problem: {}", model.value_name(value));
                problems.push(value);
            } else {
                model.assign(&mut self.assignment, stamp(variable), value);
            }
        }

        let max_attempts = 3 * problems.len();
        let mut attempt = 0;
        while !problems.is_empty() && attempt <= max_attempts {
            attempt += 1;
            let pick = self.rng.random_range(0..problems.len());
            let value = problems.swap_remove(pick);
            let variable = model.value(value).variable();
            let conflicts = model.conflict_values(&self.assignment, value);
            if !conflicts.is_empty() {
                warn!(
                    "Restore best problem (again, attempt {attempt}): {}",
                    model.value_name(value)
                );
                for &conflict in &conflicts {
                    model.unassign(&mut self.assignment, iteration, model.value(conflict).variable());
                    if !problems.contains(&conflict) {
                        problems.push(conflict);
                    }
                }
            }
            model.assign(&mut self.assignment, stamp(variable), value);
        }
        if !problems.is_empty() {
            debug!(left = problems.len(), "Best solution only partially restored");
        }
    }

    /// Objective value of the best snapshot.
    pub fn best_value(&self) -> Option<f64> {
        self.best.value()
    }

    /// Unassigned variables in the best snapshot.
    pub fn best_unassigned(&self) -> Option<usize> {
        self.best.unassigned()
    }

    pub fn best_iteration(&self) -> Option<u64> {
        self.best.iteration()
    }

    pub fn best_perturbations_penalty(&self) -> Option<f64> {
        self.best.perturbations_penalty()
    }

    pub fn best_info(&self) -> Option<BTreeMap<String, String>> {
        self.best.lock().as_ref().map(|best| best.info.clone())
    }

    pub fn has_best(&self) -> bool {
        !self.best.is_empty()
    }
}

impl<P: ValueData> std::fmt::Debug for Solution<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solution")
            .field("iteration", &self.iteration)
            .field("assigned", &self.assignment.nr_assigned_variables())
            .field("unassigned", &self.assignment.nr_unassigned_variables())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "solution_tests.rs"]
mod tests;

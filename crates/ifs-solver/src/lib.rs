//! Iterative forward search engine.
//!
//! This crate provides the search side of the IFS engine:
//! - [`Solution`] coupling a model with a live assignment and a best snapshot
//! - [`Solver`] and [`ParallelSolver`] running the select/apply/update loop
//! - Neighbour selections: standard IFS, backtracking, random moves, swaps
//!   and suggestions
//! - Neighbour searches: hill climbing, great deluge, simulated annealing
//!   and the phased [`SimpleSearch`](search::SimpleSearch)
//! - Minimal perturbation counting
//! - Termination conditions, comparators, listeners and statistics,
//!   including conflict-based statistics

pub mod comparator;
pub mod event;
pub mod neighbour;
pub mod parallel;
pub mod perturbations;
pub mod progress;
pub mod search;
pub mod selection;
pub mod solution;
pub mod solver;
pub mod statistics;
pub mod termination;

pub use comparator::{GeneralComparator, MppComparator, SolutionComparator};
pub use event::{CountingListener, LoggingListener, SolutionListener, SolverListener};
pub use neighbour::{AppliedNeighbour, LazyChange, Neighbour, SimpleNeighbour, SwapNeighbour};
pub use parallel::{ParallelOutcome, ParallelSolver};
pub use perturbations::{
    DefaultPerturbationsCounter, PerturbationPenalty, PerturbationsCounter, UnitPenalty,
    ViolatedInitials,
};
pub use progress::{Progress, TracingProgress};
pub use search::{GreatDeluge, HillClimber, SimpleSearch, SimulatedAnnealing};
pub use selection::{
    BacktrackNeighbourSelection, NeighbourSelection, RandomMove, RandomSwapMove, SelectionRegistry,
    StandardNeighbourSelection, SuggestionMove,
};
pub use solution::{BestRecord, BestSolution, SharedBest, Solution};
pub use solver::Solver;
pub use statistics::{BestImprovement, ConflictStatistics, SelectorStatistics, SolveStatistics};
pub use termination::{AnyTermination, TerminationCondition};

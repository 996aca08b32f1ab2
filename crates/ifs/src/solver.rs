//! One-call entry points.

use std::sync::Arc;

use tracing::debug;

use ifs_config::{DataProperties, GeneralConfig};
use ifs_core::{Model, Result, ValueData};
use ifs_solver::{ParallelSolver, Solution, Solver};

/// Solves `model` with properties from `solver.toml`, or defaults when the
/// file is missing or invalid.
///
/// # Errors
///
/// See [`run_solver_with`].
pub fn run_solver<P: ValueData>(model: Arc<Model<P>>) -> Result<Solution<P>> {
    let properties = DataProperties::load("solver.toml").unwrap_or_default();
    run_solver_with(model, properties)
}

/// Solves `model` and returns the best solution found.
///
/// More than one `Parallel.NrSolvers` runs a [`ParallelSolver`], otherwise
/// a single [`Solver`] works on an empty assignment.
///
/// # Errors
///
/// Fails only when a parallel worker panics.
pub fn run_solver_with<P: ValueData>(model: Arc<Model<P>>, properties: DataProperties) -> Result<Solution<P>> {
    #[cfg(feature = "console")]
    crate::console::init();

    if GeneralConfig::from_properties(&properties).nr_solvers > 1 {
        let outcome = ParallelSolver::new(properties).solve(model, None)?;
        debug!(workers = outcome.statistics.len(), "Parallel solve finished");
        return Ok(outcome.solution);
    }
    let mut solver = Solver::new(properties);
    let mut solution = solver.create_solution(model);
    let statistics = solver.solve(&mut solution);
    debug!(
        iterations = statistics.iterations,
        speed = statistics.speed(),
        "Solve finished"
    );
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifs_test::{count_attacks, queens_model};

    #[test]
    fn test_run_solver_with_queens() {
        let properties = DataProperties::new()
            .with("General.Seed", 8)
            .with("Value.RandomWalkProb", 0.02)
            .with("Termination.StopWhenComplete", true)
            .with("Termination.MaxIters", 100_000);
        let solution = run_solver_with(Arc::new(queens_model(8)), properties).unwrap();
        assert!(solution.is_complete());
        assert_eq!(count_attacks(solution.model(), solution.assignment()), 0);
    }

    #[test]
    fn test_run_solver_with_parallel() {
        let properties = DataProperties::new()
            .with("General.Seed", 8)
            .with("Parallel.NrSolvers", 2)
            .with("Value.RandomWalkProb", 0.02)
            .with("Termination.StopWhenComplete", true)
            .with("Termination.MaxIters", 100_000);
        let solution = run_solver_with(Arc::new(queens_model(6)), properties).unwrap();
        assert!(solution.is_complete());
        assert!(solution.assignment().index() >= 1);
    }
}

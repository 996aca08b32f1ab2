//! Solution comparators deciding when the best snapshot is replaced.

use std::fmt::Debug;

use ifs_core::ValueData;

use crate::solution::{BestSolution, Solution};

/// Judges the current assignment of a solution against the best snapshot.
pub trait SolutionComparator<P: ValueData>: Send + Sync + Debug {
    /// Returns true if `solution` should replace `best`.
    fn is_better_than_best(&self, solution: &Solution<P>, best: Option<&BestSolution>) -> bool;
}

/// Fewer unassigned variables first, then a lower total value.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralComparator;

impl<P: ValueData> SolutionComparator<P> for GeneralComparator {
    fn is_better_than_best(&self, solution: &Solution<P>, best: Option<&BestSolution>) -> bool {
        let Some(best) = best else {
            return true;
        };
        let unassigned = solution.assignment().nr_unassigned_variables();
        if unassigned != best.unassigned {
            return unassigned < best.unassigned;
        }
        solution.total_value() < best.value
    }
}

/// Minimal perturbation order: fewer unassigned variables, then a lower
/// perturbation penalty, then a lower total value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MppComparator;

impl<P: ValueData> SolutionComparator<P> for MppComparator {
    fn is_better_than_best(&self, solution: &Solution<P>, best: Option<&BestSolution>) -> bool {
        let Some(best) = best else {
            return true;
        };
        let unassigned = solution.assignment().nr_unassigned_variables();
        if unassigned != best.unassigned {
            return unassigned < best.unassigned;
        }
        let penalty = solution.perturbation_penalty();
        if penalty != best.perturbations_penalty {
            return penalty < best.perturbations_penalty;
        }
        solution.total_value() < best.value
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::perturbations::DefaultPerturbationsCounter;
    use ifs_test::{mpp_queens_model, queens_model};

    fn assign(solution: &mut Solution<usize>, column: usize, row: usize) {
        let model = Arc::clone(solution.model());
        let value = model.variables()[column].values()[row];
        model.assign(solution.assignment_mut(), 1, value);
    }

    fn better<C: SolutionComparator<usize>>(comparator: &C, solution: &mut Solution<usize>) -> bool {
        solution.save_best_if(|s, best| comparator.is_better_than_best(s, best))
    }

    #[test]
    fn test_general_prefers_fewer_unassigned() {
        let mut solution = Solution::new(Arc::new(queens_model(4)));
        assert!(better(&GeneralComparator, &mut solution));

        assign(&mut solution, 0, 3);
        assert!(better(&GeneralComparator, &mut solution));

        // same unassigned count, lower total value
        assign(&mut solution, 0, 0);
        assert!(better(&GeneralComparator, &mut solution));

        // same unassigned count, higher total value
        assign(&mut solution, 0, 2);
        assert!(!better(&GeneralComparator, &mut solution));
    }

    #[test]
    fn test_mpp_prefers_lower_penalty() {
        let model = Arc::new(mpp_queens_model(4, &[Some(3), None, None, None]));
        let mut solution = Solution::new(model)
            .with_perturbations_counter(Arc::new(DefaultPerturbationsCounter::new()));

        assign(&mut solution, 0, 0);
        assert!(better(&MppComparator, &mut solution));
        assert_eq!(solution.best_perturbations_penalty(), Some(1.0));

        // higher total value but back at the initial row
        assign(&mut solution, 0, 3);
        assert!(!better(&GeneralComparator, &mut solution));
        assert!(better(&MppComparator, &mut solution));
        assert_eq!(solution.best_perturbations_penalty(), Some(0.0));
    }
}

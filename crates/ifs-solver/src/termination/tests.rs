//! Tests for termination conditions.

use std::sync::Arc;
use std::time::Duration;

use super::*;
use ifs_config::DataProperties;
use ifs_test::{mpp_queens_model, queens_model};

fn complete_queens(solution: &mut Solution<usize>) {
    let model = Arc::clone(solution.model());
    for (column, row) in [1, 3, 0, 2].into_iter().enumerate() {
        let value = model.variables()[column].values()[row];
        model.assign(solution.assignment_mut(), 1, value);
    }
}

#[test]
fn test_max_iterations() {
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    let term = MaxIterations::new(3);

    assert!(!term.is_terminated(&solution));
    solution.update(0.0, true);
    solution.update(0.0, true);
    assert!(!term.is_terminated(&solution));
    solution.update(0.0, true);
    assert!(term.is_terminated(&solution));
}

#[test]
fn test_time_out() {
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    let term = TimeOut::seconds(1.5);

    solution.update(1.0, true);
    assert!(!term.is_terminated(&solution));
    solution.update(2.0, true);
    assert!(term.is_terminated(&solution));
}

#[test]
fn test_time_out_without_finite_limit() {
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    solution.update(1.0e9, true);
    for seconds in [f64::INFINITY, f64::NAN] {
        let term = TimeOut::seconds(seconds);
        assert_eq!(term.limit(), Duration::MAX);
        assert!(!term.is_terminated(&solution));
    }
}

#[test]
fn test_from_config_ignores_non_finite_time_out() {
    for raw in ["inf", "NaN"] {
        let properties = DataProperties::new()
            .with("Termination.TimeOut", raw)
            .with("Termination.MaxIters", 5);
        let config = TerminationConfig::from_properties(&properties);
        let term = AnyTermination::<usize>::from_config(&config, false);

        assert_eq!(term.len(), 1);
    }
}

#[test]
fn test_stop_when_complete() {
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    assert!(!StopWhenComplete.is_terminated(&solution));
    complete_queens(&mut solution);
    assert!(StopWhenComplete.is_terminated(&solution));
}

#[test]
fn test_min_perturbances() {
    let model = Arc::new(mpp_queens_model(4, &[Some(1), Some(3), Some(0), Some(2)]));
    let mut solution = Solution::new(model);
    let term = MinPerturbances::new(0);

    assert!(!term.is_terminated(&solution));
    complete_queens(&mut solution);
    assert!(term.is_terminated(&solution));
}

#[test]
fn test_from_config_defaults_to_completion() {
    let config = TerminationConfig::from_properties(&DataProperties::new());
    let term = AnyTermination::<usize>::from_config(&config, false);
    assert_eq!(term.len(), 1);

    let mut solution = Solution::new(Arc::new(queens_model(4)));
    assert!(!term.is_terminated(&solution));
    complete_queens(&mut solution);
    assert!(term.is_terminated(&solution));
}

#[test]
fn test_from_config_any_limit() {
    let properties = DataProperties::new()
        .with("Termination.MaxIters", 2)
        .with("Termination.TimeOut", 10.0)
        .with("Termination.MinPerturbances", 0);
    let config = TerminationConfig::from_properties(&properties);

    assert_eq!(AnyTermination::<usize>::from_config(&config, false).len(), 2);
    let term = AnyTermination::<usize>::from_config(&config, true);
    assert_eq!(term.len(), 3);

    let mut solution = Solution::new(Arc::new(queens_model(4)));
    solution.update(0.1, true);
    assert!(!term.is_terminated(&solution));
    solution.update(0.2, true);
    assert!(term.is_terminated(&solution));
}

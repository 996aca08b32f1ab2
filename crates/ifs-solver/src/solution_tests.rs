//! Tests for solutions and the best record.

use super::*;
use crate::event::CountingListener;
use ifs_test::{queens_model, PairScenario};

fn place(solution: &mut Solution<usize>, rows: &[usize], iteration: u64) {
    let model = Arc::clone(solution.model());
    for (column, &row) in rows.iter().enumerate() {
        let value = model.variables()[column].values()[row];
        model.assign(solution.assignment_mut(), iteration, value);
    }
}

#[test]
fn test_update_counts_iterations() {
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    solution.update(0.5, true);
    solution.update(1.0, false);

    assert_eq!(solution.iteration(), 2);
    assert_eq!(solution.failed_iterations(), 1);
    assert_eq!(solution.time(), 1.0);
    assert_eq!(solution.info().get("Iteration").map(String::as_str), Some("2"));
    assert!(solution.info().contains_key("Speed"));
}

#[test]
fn test_save_and_restore_best() {
    let listener = Arc::new(CountingListener::new());
    let mut solution = Solution::new(Arc::new(queens_model(4))).with_seed(7);
    solution.add_listener(listener.clone());

    place(&mut solution, &[1, 3, 0, 2], 1);
    solution.update(0.1, true);
    solution.save_best();
    let saved = solution.assignment().snapshot();
    assert_eq!(solution.best_unassigned(), Some(0));
    assert!(solution.best_info().is_some());

    place(&mut solution, &[0, 0, 0], 2);
    solution.update(0.2, true);
    assert_ne!(solution.assignment().snapshot(), saved);

    assert!(solution.restore_best());
    assert_eq!(solution.assignment().snapshot(), saved);
    assert_eq!(solution.iteration(), 1);
    assert_eq!(listener.saved_count(), 1);
    assert_eq!(listener.restored_count(), 1);
}

#[test]
fn test_restore_without_best() {
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    assert!(!solution.has_best());
    assert!(!solution.restore_best());
}

#[test]
fn test_restore_best_reassigns_in_stamp_order() {
    let pair = PairScenario::new();
    let (a, b) = (pair.a, pair.b);
    let (a1, b0, b1) = (pair.value(a, 1), pair.value(b, 0), pair.value(b, 1));
    let mut solution = Solution::new(Arc::new(pair.model)).with_seed(3);
    let model = Arc::clone(solution.model());

    model.assign(solution.assignment_mut(), 1, a1);
    model.assign(solution.assignment_mut(), 2, b0);
    solution.save_best();

    model.unassign(solution.assignment_mut(), 3, a);
    model.assign(solution.assignment_mut(), 4, b1);

    assert!(solution.restore_best());
    assert_eq!(solution.assignment().value(a), Some(a1));
    assert_eq!(solution.assignment().value(b), Some(b0));
    assert_eq!(solution.assignment().iteration(a), 1);
}

#[test]
fn test_save_best_if_rejects() {
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    solution.save_best();

    place(&mut solution, &[1], 1);
    let saved = solution.save_best_if(|current, best| {
        best.is_some_and(|b| current.assignment().nr_unassigned_variables() > b.unassigned)
    });
    assert!(!saved);
    assert_eq!(solution.best_unassigned(), Some(4));
}

#[test]
fn test_shared_best_between_solutions() {
    let model = Arc::new(queens_model(4));
    let record = BestRecord::shared();
    let mut first = Solution::new(Arc::clone(&model)).with_best(Arc::clone(&record));
    let second_assignment = model.create_assignment(2);
    let mut second =
        Solution::with_assignment(Arc::clone(&model), second_assignment).with_best(Arc::clone(&record));

    place(&mut first, &[1, 3, 0, 2], 1);
    first.save_best();
    assert_eq!(record.index(), Some(0));

    assert!(second.restore_best());
    assert_eq!(second.assignment().snapshot(), first.assignment().snapshot());
    assert_eq!(second.assignment().index(), 2);
}

#[test]
fn test_clear_best() {
    let listener = Arc::new(CountingListener::new());
    let mut solution = Solution::new(Arc::new(queens_model(4)));
    solution.add_listener(listener.clone());

    solution.save_best();
    solution.clear_best();

    assert!(!solution.has_best());
    assert_eq!(listener.cleared_count(), 1);
}

#[test]
fn test_stop_flag_is_shared() {
    let stop = Arc::new(AtomicBool::new(false));
    let solution = Solution::new(Arc::new(queens_model(4))).with_stop_flag(Arc::clone(&stop));
    assert!(!solution.is_stopped());
    stop.store(true, Ordering::SeqCst);
    assert!(solution.is_stopped());
}

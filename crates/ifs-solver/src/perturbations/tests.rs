//! Tests for the perturbation penalties.

use super::*;
use ifs_test::mpp_queens_model;

fn value_at(model: &Model<usize>, column: usize, row: usize) -> ValueId {
    model.variables()[column].values()[row]
}

#[test]
fn test_zero_penalty_at_initial_values() {
    let initial = [Some(1), Some(3), Some(0), Some(2)];
    let model = mpp_queens_model(4, &initial);
    let mut assignment = model.create_assignment(0);
    for (column, row) in initial.iter().enumerate() {
        if let Some(row) = *row {
            model.assign(&mut assignment, 1, value_at(&model, column, row));
        }
    }

    let counter = DefaultPerturbationsCounter::new();
    assert_eq!(counter.perturbation_penalty(&model, &assignment), 0.0);
    assert!(model.perturb_variables(&assignment, true).is_empty());
}

#[test]
fn test_unassigned_is_not_perturbed() {
    let model = mpp_queens_model(4, &[Some(1), Some(3), Some(0), Some(2)]);
    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, value_at(&model, 0, 1));

    let counter = DefaultPerturbationsCounter::new();
    assert_eq!(counter.perturbation_penalty(&model, &assignment), 0.0);

    model.assign(&mut assignment, 2, value_at(&model, 1, 0));
    assert_eq!(counter.perturbation_penalty(&model, &assignment), 1.0);
    assert_eq!(
        counter.perturbation_penalty_of(&model, &assignment, &[model.variables()[0].id()]),
        0.0
    );
}

#[test]
fn test_candidate_penalty_terms() {
    // Q0 and Q1 start in rows 0 and 2; Q2 has no initial value.
    let model = mpp_queens_model(3, &[Some(0), Some(2), None]);
    let violated = Arc::new(ViolatedInitials::init(&model));
    let counter = DefaultPerturbationsCounter::with_violated_initials(violated.clone());
    let mut assignment = model.create_assignment(0);

    // Q2 = row 1 attacks Q1's initial (row 2) on a diagonal but not Q0's
    // initial (row 0), two columns away.
    let q2_row1 = value_at(&model, 2, 1);
    let violations = violated.violated_initials(q2_row1).cloned().unwrap_or_default();
    assert!(violations.contains(&value_at(&model, 1, 2)));
    assert!(!violations.contains(&value_at(&model, 0, 0)));

    // (A): Q1 is unassigned, so its violated initial counts.
    let penalty = counter.candidate_penalty(&model, &assignment, q2_row1, &ConflictSet::new());
    assert_eq!(penalty, 1.0);

    // (B): a conflict sitting at its initial value costs one.
    let q0_row0 = value_at(&model, 0, 0);
    model.assign(&mut assignment, 1, q0_row0);
    let q1_row0 = value_at(&model, 1, 0);
    let conflicts = model.conflict_values(&assignment, q1_row0);
    assert!(conflicts.contains(&q0_row0));
    // (D) adds one because row 0 is not Q1's initial.
    assert_eq!(
        counter.candidate_penalty(&model, &assignment, q1_row0, &conflicts),
        2.0
    );

    // (C): a conflict away from its initial value gives one back. Q1 = row 2
    // is Q1's initial and consistent with Q0's initial, so nothing else counts.
    model.assign(&mut assignment, 2, value_at(&model, 0, 2));
    let q1_row2 = value_at(&model, 1, 2);
    let conflicts = model.conflict_values(&assignment, q1_row2);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(
        counter.candidate_penalty(&model, &assignment, q1_row2, &conflicts),
        -1.0
    );
}

#[test]
fn test_info_reports_penalty() {
    let model = mpp_queens_model(4, &[Some(1), None, None, None]);
    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, value_at(&model, 0, 2));

    let mut info = BTreeMap::new();
    PerturbationsCounter::<usize>::info(&DefaultPerturbationsCounter::new(), &model, &assignment, &mut info);
    assert_eq!(
        info.get("Perturbations: Total penalty").map(String::as_str),
        Some("1.00")
    );
}

/// Charges more the further a queen moved from its initial row.
#[derive(Debug)]
struct RowDistance;

impl PerturbationPenalty<usize> for RowDistance {
    fn penalty(
        &self,
        model: &Model<usize>,
        _assignment: &Assignment,
        assigned: Option<ValueId>,
        initial: ValueId,
    ) -> f64 {
        match assigned {
            Some(assigned) => {
                1.0 + model.value(assigned).data().abs_diff(*model.value(initial).data()) as f64
            }
            None => 0.5,
        }
    }
}

#[test]
fn test_custom_penalty_per_deviation() {
    let model = mpp_queens_model(4, &[Some(1), Some(3), Some(0), Some(2)]);
    let counter = DefaultPerturbationsCounter::with_penalty(RowDistance);
    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, value_at(&model, 0, 3));
    model.assign(&mut assignment, 1, value_at(&model, 1, 3));
    assert_eq!(counter.perturbation_penalty(&model, &assignment), 3.0);

    let model = mpp_queens_model(3, &[Some(0), Some(2), None]);
    let counter = DefaultPerturbationsCounter::with_penalty(RowDistance)
        .violated_initials_from(Arc::new(ViolatedInitials::init(&model)));
    let mut assignment = model.create_assignment(0);

    // Unassigned Q1 keeps its violated initial at the flat rate.
    let q2_row1 = value_at(&model, 2, 1);
    assert_eq!(
        counter.candidate_penalty(&model, &assignment, q2_row1, &ConflictSet::new()),
        0.5
    );

    // Q0 bumped off its initial row costs 1, Q1 two rows away costs 3.
    model.assign(&mut assignment, 1, value_at(&model, 0, 0));
    let q1_row0 = value_at(&model, 1, 0);
    let conflicts = model.conflict_values(&assignment, q1_row0);
    assert_eq!(
        counter.candidate_penalty(&model, &assignment, q1_row0, &conflicts),
        4.0
    );
}

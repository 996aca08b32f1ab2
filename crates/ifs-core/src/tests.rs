//! Tests for the model, assignment protocol and undo trail.

use super::*;

/// Counts assigned values per constraint; used to observe context updates.
#[derive(Debug, Default, PartialEq)]
struct Counter {
    assigned: usize,
    total: i64,
}

#[derive(Debug)]
struct CountingConstraint {
    variables: Vec<VariableId>,
}

impl Constraint<i64> for CountingConstraint {
    fn name(&self) -> &str {
        "counting"
    }

    fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    fn is_hard(&self) -> bool {
        false
    }

    fn compute_conflicts(&self, _: &Model<i64>, _: &Assignment, _: ValueId, _: &mut ConflictSet) {}

    fn create_context(&self, _model: &Model<i64>, _assignment: &Assignment) -> ContextSlot {
        ContextSlot::new(Counter::default())
    }

    fn after_assigned(
        &self,
        model: &Model<i64>,
        _assignment: &Assignment,
        context: &mut ContextSlot,
        _iteration: u64,
        value: ValueId,
    ) {
        if let Some(counter) = context.get_mut::<Counter>() {
            counter.assigned += 1;
            counter.total += *model.value(value).data();
        }
    }

    fn after_unassigned(
        &self,
        model: &Model<i64>,
        _assignment: &Assignment,
        context: &mut ContextSlot,
        _iteration: u64,
        value: ValueId,
    ) {
        if let Some(counter) = context.get_mut::<Counter>() {
            counter.assigned -= 1;
            counter.total -= *model.value(value).data();
        }
    }
}

/// At most one variable may take value 0.
#[derive(Debug)]
struct SingleZero;

impl Constraint<i64> for SingleZero {
    fn variables(&self) -> &[VariableId] {
        &[]
    }

    fn compute_conflicts(
        &self,
        model: &Model<i64>,
        assignment: &Assignment,
        value: ValueId,
        conflicts: &mut ConflictSet,
    ) {
        if *model.value(value).data() != 0 {
            return;
        }
        let variable = model.value(value).variable();
        for other in assignment.assigned_values() {
            if model.value(other).variable() != variable && *model.value(other).data() == 0 {
                conflicts.insert(other);
            }
        }
    }
}

/// Sum of assigned payloads.
#[derive(Debug)]
struct PayloadSum;

impl Criterion<i64> for PayloadSum {
    fn name(&self) -> &str {
        "Payload sum"
    }

    fn weight(&self) -> f64 {
        2.0
    }

    fn value(&self, model: &Model<i64>, _: &Assignment, value: ValueId, _: Option<&ConflictSet>) -> f64 {
        *model.value(value).data() as f64
    }
}

struct Pair {
    model: Model<i64>,
    a: VariableId,
    b: VariableId,
    c: VariableId,
}

fn pair_model() -> Pair {
    let mut builder = ModelBuilder::<i64>::new();
    let a = builder.add_variable("A", [0, 1]);
    let b = builder.add_variable("B", [0, 1]);
    let c = builder.add_variable("C", [0, 1]);
    builder.add_constraint(BinaryConstraint::new("not both", a, b, |x: &i64, y: &i64| {
        !(*x == 1 && *y == 1)
    }));
    builder.add_constraint(CountingConstraint {
        variables: vec![a, b, c],
    });
    Pair {
        model: builder.build().unwrap(),
        a,
        b,
        c,
    }
}

fn value_of(model: &Model<i64>, variable: VariableId, data: i64) -> ValueId {
    *model
        .variable(variable)
        .values()
        .iter()
        .find(|&&v| *model.value(v).data() == data)
        .unwrap()
}

#[test]
fn test_conflict_values_pair_scenario() {
    let Pair { model, a, b, c } = pair_model();
    let mut assignment = model.create_assignment(0);

    let a1 = value_of(&model, a, 1);
    let b1 = value_of(&model, b, 1);
    model.assign(&mut assignment, 1, a1);

    let conflicts = model.conflict_values(&assignment, b1);
    assert_eq!(conflicts.into_iter().collect::<Vec<_>>(), vec![a1]);
    assert!(model.in_conflict(&assignment, b1));

    let c0 = value_of(&model, c, 0);
    assert!(model.conflict_values(&assignment, c0).is_empty());
    assert!(!model.in_conflict(&assignment, c0));
}

#[test]
fn test_conflict_symmetry() {
    let Pair { model, a, b, .. } = pair_model();
    let a1 = value_of(&model, a, 1);
    let b1 = value_of(&model, b, 1);
    assert!(!model.constraint(ConstraintId::new(0)).is_consistent(&model, a1, b1));

    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, a1);
    assert!(model.conflict_values(&assignment, b1).contains(&a1));

    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, b1);
    assert!(model.conflict_values(&assignment, a1).contains(&b1));
}

#[test]
fn test_assign_unassign_is_inverse() {
    let Pair { model, a, c, .. } = pair_model();
    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, value_of(&model, c, 1));

    let total_before = model.total_value(&assignment);
    let snapshot = assignment.snapshot();
    let counter = |asg: &Assignment| {
        let slot = asg.context(ConstraintId::new(1));
        let counter = slot.get::<Counter>().unwrap();
        (counter.assigned, counter.total)
    };
    let context_before = counter(&assignment);

    model.assign(&mut assignment, 2, value_of(&model, a, 1));
    assert_eq!(counter(&assignment), (2, 2));
    model.unassign(&mut assignment, 3, a);

    assert_eq!(assignment.snapshot(), snapshot);
    assert_eq!(model.total_value(&assignment), total_before);
    assert_eq!(counter(&assignment), context_before);
}

#[test]
fn test_reassign_unassigns_previous_value() {
    let Pair { model, a, .. } = pair_model();
    let mut assignment = model.create_assignment(0);
    let a0 = value_of(&model, a, 0);
    let a1 = value_of(&model, a, 1);

    assert_eq!(model.assign(&mut assignment, 1, a0), None);
    assert_eq!(model.assign(&mut assignment, 2, a1), Some(a0));
    assert_eq!(assignment.value(a), Some(a1));
    assert_eq!(assignment.iteration(a), 2);
    assert_eq!(assignment.nr_assigned_variables(), 1);

    let slot = assignment.context(ConstraintId::new(1));
    assert_eq!(slot.get::<Counter>().unwrap().assigned, 1);

    // Assigning the same value again is a no-op.
    assert_eq!(model.assign(&mut assignment, 5, a1), Some(a1));
    assert_eq!(assignment.iteration(a), 2);
}

#[test]
fn test_global_constraint() {
    let mut builder = ModelBuilder::<i64>::new();
    let x = builder.add_variable("x", [0, 1]);
    let y = builder.add_variable("y", [0, 1]);
    builder.add_global_constraint(SingleZero);
    let model = builder.build().unwrap();
    assert_eq!(model.global_constraints().len(), 1);

    let mut assignment = model.create_assignment(0);
    let x0 = value_of(&model, x, 0);
    let y0 = value_of(&model, y, 0);
    model.assign(&mut assignment, 1, x0);

    assert!(model.conflict_values(&assignment, y0).contains(&x0));
    let resolved = model.assign_resolving(&mut assignment, 2, y0);
    assert!(resolved.contains(&x0));
    assert_eq!(assignment.value(x), None);
    assert_eq!(assignment.value(y), Some(y0));
}

#[test]
fn test_criterion_totals() {
    let mut builder = ModelBuilder::<i64>::new();
    let x = builder.add_variable("x", [3, 5]);
    let y = builder.add_variable("y", [7]);
    let sum = builder.add_criterion(PayloadSum);
    let model = builder.build().unwrap();

    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, value_of(&model, x, 3));
    model.assign(&mut assignment, 2, value_of(&model, y, 7));
    assert_eq!(assignment.criterion_total(sum), 10.0);
    assert_eq!(model.total_value(&assignment), 20.0);

    model.assign(&mut assignment, 3, value_of(&model, x, 5));
    assert_eq!(assignment.criterion_total(sum), 12.0);

    let bounds = model.criteria()[0].bounds(&model, &assignment);
    assert_eq!(bounds, (10.0, 12.0));

    let info = model.info(&assignment);
    assert_eq!(info.get("Payload sum").map(String::as_str), Some("12.00"));
}

#[test]
fn test_total_value_without_criteria() {
    let Pair { model, a, b, .. } = pair_model();
    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, value_of(&model, a, 1));
    model.assign(&mut assignment, 2, value_of(&model, b, 0));
    assert_eq!(model.total_value(&assignment), 1.0);
}

#[test]
fn test_build_rejects_unknown_variable() {
    let mut builder = ModelBuilder::<i64>::new();
    let a = builder.add_variable("A", [0]);
    builder.add_constraint(BinaryConstraint::new("dangling", a, VariableId::new(7), |_: &i64, _: &i64| true));
    let err = builder.build().unwrap_err();
    assert!(matches!(err, IfsError::Model(_)));
}

#[test]
fn test_build_rejects_foreign_initial_value() {
    let mut builder = ModelBuilder::<i64>::new();
    let a = builder.add_variable("A", [0]);
    let b = builder.add_variable("B", [1]);
    let foreign = builder.values_of(b)[0];
    builder.set_initial_value(a, Some(foreign));
    assert!(matches!(builder.build(), Err(IfsError::Model(_))));
}

#[test]
fn test_perturb_variables() {
    let mut builder = ModelBuilder::<i64>::new();
    let a = builder.add_variable("A", [0, 1]);
    let b = builder.add_variable("B", [0, 1]);
    let a_init = builder.values_of(a)[1];
    let b_init = builder.values_of(b)[1];
    builder.set_initial_value(a, Some(a_init));
    builder.set_initial_value(b, Some(b_init));
    builder.add_constraint(BinaryConstraint::new("not both", a, b, |x: &i64, y: &i64| {
        !(*x == 1 && *y == 1)
    }));
    let model = builder.build().unwrap();
    assert_eq!(model.variables_with_initial_value(), &[a, b]);

    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, a_init);
    assert!(model.perturb_variables(&assignment, false).is_empty());
    // B is unassigned and its initial value is blocked by A.
    assert_eq!(model.perturb_variables(&assignment, true), vec![b]);

    model.assign(&mut assignment, 2, value_of(&model, a, 0));
    assert_eq!(model.perturb_variables(&assignment, false), vec![a]);
}

#[test]
fn test_trail_rollback_restores_values_and_stamps() {
    let Pair { model, a, b, c } = pair_model();
    let mut assignment = model.create_assignment(0);
    model.assign(&mut assignment, 1, value_of(&model, a, 1));
    model.assign(&mut assignment, 2, value_of(&model, c, 0));
    let snapshot = assignment.snapshot();
    let stamps: Vec<u64> = [a, b, c].iter().map(|&v| assignment.iteration(v)).collect();

    let mut trail = Trail::new();
    let mark = trail.mark();
    let conflicts = trail.assign_resolving(&model, &mut assignment, 10, value_of(&model, b, 1));
    assert_eq!(conflicts.len(), 1);
    trail.assign(&model, &mut assignment, 11, value_of(&model, c, 1));
    trail.assign(&model, &mut assignment, 12, value_of(&model, a, 0));
    assert_eq!(trail.len(), 4);

    trail.rollback(&model, &mut assignment, mark);
    assert!(trail.is_empty());
    assert_eq!(assignment.snapshot(), snapshot);
    let restored: Vec<u64> = [a, b, c].iter().map(|&v| assignment.iteration(v)).collect();
    assert_eq!(restored, stamps);
}

#[test]
fn test_trail_partial_rollback() {
    let Pair { model, a, b, .. } = pair_model();
    let mut assignment = model.create_assignment(0);
    let mut trail = Trail::new();
    trail.assign(&model, &mut assignment, 1, value_of(&model, a, 0));
    let mark = trail.mark();
    trail.assign(&model, &mut assignment, 2, value_of(&model, b, 1));
    trail.rollback(&model, &mut assignment, mark);

    assert_eq!(assignment.value(a), Some(value_of(&model, a, 0)));
    assert_eq!(assignment.value(b), None);
    trail.commit();
}

#[test]
fn test_copy_assignment_rebuilds_contexts() {
    let Pair { model, a, c, .. } = pair_model();
    let mut source = model.create_assignment(0);
    model.assign(&mut source, 4, value_of(&model, c, 1));
    model.assign(&mut source, 7, value_of(&model, a, 1));

    let copy = model.copy_assignment(&source, 2).unwrap();
    assert_eq!(copy.index(), 2);
    assert_eq!(copy.snapshot(), source.snapshot());
    assert_eq!(copy.iteration(a), 7);
    let counter = copy.context(ConstraintId::new(1)).get::<Counter>().unwrap();
    assert_eq!(counter, &Counter { assigned: 2, total: 2 });
}

#[test]
fn test_copy_assignment_rejects_foreign_assignment() {
    let Pair { model, .. } = pair_model();
    let mut builder = ModelBuilder::<i64>::new();
    builder.add_variable("only", [0]);
    let other = builder.build().unwrap();
    let foreign = other.create_assignment(0);
    assert!(matches!(
        model.copy_assignment(&foreign, 1),
        Err(IfsError::InvalidState(_))
    ));
}

#[test]
fn test_variable_set() {
    let mut set = VariableSet::with_capacity(4);
    assert!(set.insert(VariableId::new(2)));
    assert!(set.insert(VariableId::new(0)));
    assert!(!set.insert(VariableId::new(2)));
    assert!(set.insert(VariableId::new(9)));
    assert_eq!(set.len(), 3);

    assert!(set.remove(VariableId::new(2)));
    assert!(!set.remove(VariableId::new(2)));
    assert!(!set.contains(VariableId::new(2)));
    assert!(set.contains(VariableId::new(9)));
    let mut members: Vec<_> = set.iter().collect();
    members.sort();
    assert_eq!(members, vec![VariableId::new(0), VariableId::new(9)]);
}

#[test]
fn test_value_name() {
    let Pair { model, a, .. } = pair_model();
    assert_eq!(model.value_name(value_of(&model, a, 1)), "A = 1");
}

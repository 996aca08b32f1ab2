//! Tests for the neighbour searches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::neighbour::LazyChange;
use crate::selection::RandomMove;
use ifs_core::{Model, ValueId};
use ifs_test::{coloring_model, count_attacks, cycle_edges, queens_model};

fn colour(model: &Model<u32>, node: usize, colour: usize) -> ValueId {
    model.variables()[node].values()[colour]
}

/// A properly coloured six-cycle using the expensive colours 1 and 2.
fn coloured_cycle(seed: u64) -> Solution<u32> {
    let model = Arc::new(coloring_model(6, 3, &cycle_edges(6)));
    let mut solution = Solution::new(Arc::clone(&model)).with_seed(seed);
    for node in 0..6 {
        let value = colour(&model, node, 1 + node % 2);
        model.assign(solution.assignment_mut(), 1, value);
    }
    solution
}

/// Always proposes the same lazy change.
#[derive(Debug)]
struct LazyMover {
    value: ValueId,
}

impl NeighbourSelection<u32> for LazyMover {
    fn name(&self) -> &str {
        "LazyMover"
    }

    fn select_neighbour(&mut self, solution: &mut Solution<u32>) -> Option<Box<dyn Neighbour<u32>>> {
        Some(Box::new(LazyChange::new(solution.model(), [self.value])))
    }
}

#[test]
fn test_movers_from_properties() {
    let registry = SelectionRegistry::<usize>::new();

    let search = SimulatedAnnealing::new(&DataProperties::new(), &registry);
    let names: Vec<_> = search.movers().iter().map(|m| m.name().to_string()).collect();
    assert_eq!(names, ["RandomMove", "RandomSwapMove", "SuggestionMove"]);
    assert_eq!(search.movers()[1].bonus(), 0.01);

    let search = HillClimber::new(&DataProperties::new(), &registry);
    assert_eq!(search.movers().len(), 2);

    let properties = DataProperties::new()
        .with("GreatDeluge.Neighbours", "RandomMove@2;NoSuchMove;RandomSwapMove@x")
        .with("GreatDeluge.AdditionalNeighbours", "SuggestionMove@0.5");
    let search = GreatDeluge::new(&properties, &registry);
    let movers: Vec<_> = search.movers().iter().map(|m| (m.name().to_string(), m.bonus())).collect();
    assert_eq!(
        movers,
        [("RandomMove".to_string(), 2.0), ("SuggestionMove".to_string(), 0.5)]
    );
}

#[test]
fn test_selector_points() {
    let mut selector = NeighbourSelector::<usize>::new(Box::new(RandomMove::default()), 2.0, true);
    assert_eq!(selector.points(), 2.0);

    let mut solution = Solution::new(Arc::new(queens_model(4))).with_seed(1);
    assert!(selector.select(&mut solution).is_some());
    assert_eq!(selector.statistics().calls, 1);
    assert_eq!(selector.statistics().found, 1);
    assert_eq!(selector.points(), 1.0);

    selector.accepted(-1.0);
    assert_eq!(selector.points(), 2.0);
    assert_eq!(selector.statistics().total_value, -1.0);

    let fixed = NeighbourSelector::<usize>::new(Box::new(RandomMove::default()), 3.0, false);
    assert_eq!(fixed.weight(), 3.0);
}

#[test]
fn test_hill_climbing_never_worsens() {
    let registry = SelectionRegistry::<u32>::new();
    let properties = DataProperties::new().with("HillClimber.MaxIdle", 200);

    for seed in 0..5 {
        let mut solution = coloured_cycle(seed);
        let mut search = HillClimber::new(&properties, &registry);
        search.init(&solution);
        let start = solution.total_value();

        for _ in 0..500 {
            let before = solution.total_value();
            let Some(mut neighbour) = search.select_neighbour(&mut solution) else {
                break;
            };
            solution.apply(neighbour.as_mut());
            solution.update(0.0, true);
            assert!(solution.total_value() <= before, "seed {seed}");
            assert!(solution.is_complete(), "seed {seed}");
        }
        assert!(solution.total_value() <= start);
    }
}

#[test]
fn test_hill_climber_gives_up_when_idle() {
    let registry = SelectionRegistry::<usize>::new();
    let properties = DataProperties::new()
        .with("HillClimber.MaxIdle", 20)
        .with("HillClimber.Neighbours", "RandomMove");
    let model = Arc::new(queens_model(4));
    let mut solution = Solution::new(Arc::clone(&model)).with_seed(4);
    for (column, row) in [1, 3, 0, 2].into_iter().enumerate() {
        model.assign(solution.assignment_mut(), 1, model.variables()[column].values()[row]);
    }
    let mut search = HillClimber::new(&properties, &registry);
    search.init(&solution);

    assert!(search.select_neighbour(&mut solution).is_none());
    assert!(!search.is_active());
    assert_eq!(search.state().iteration, 19);
}

#[test]
fn test_search_honours_stop_flag() {
    let registry = SelectionRegistry::<u32>::new();
    let mut solution = coloured_cycle(0);
    let mut search = GreatDeluge::new(&DataProperties::new(), &registry);
    search.init(&solution);
    solution.request_stop();
    assert!(search.select_neighbour(&mut solution).is_none());
}

#[test]
fn test_lazy_neighbours_undone_when_rejected() {
    let registry = SelectionRegistry::<u32>::new();
    let properties = DataProperties::new()
        .with("HillClimber.Neighbours", "")
        .with("HillClimber.MaxIdle", 5);
    let model = Arc::new(coloring_model(2, 3, &[(0, 1)]));
    let mut solution = Solution::new(Arc::clone(&model)).with_seed(2);
    model.assign(solution.assignment_mut(), 1, colour(&model, 0, 2));
    model.assign(solution.assignment_mut(), 1, colour(&model, 1, 0));

    // Moving N0 from colour 2 to 1 improves and stays applied.
    let mut search = HillClimber::new(&properties, &registry);
    search.add_mover(Box::new(LazyMover { value: colour(&model, 0, 1) }), 1.0);
    search.init(&solution);
    let mut neighbour = search
        .select_neighbour(&mut solution)
        .expect("improving lazy change is accepted");
    assert_eq!(neighbour.value(solution.model(), solution.assignment()), -1.0);
    assert_eq!(solution.assignment().value(model.variables()[0].id()), Some(colour(&model, 0, 1)));
    solution.apply(neighbour.as_mut());
    assert_eq!(solution.total_value(), 1.0);

    // Moving N1 from colour 0 to 2 worsens and is rolled back every time.
    let snapshot = solution.assignment().snapshot();
    let mut search = HillClimber::new(&properties, &registry);
    search.add_mover(Box::new(LazyMover { value: colour(&model, 1, 2) }), 1.0);
    search.init(&solution);
    assert!(search.select_neighbour(&mut solution).is_none());
    assert_eq!(solution.assignment().snapshot(), snapshot);
    assert_eq!(solution.total_value(), 1.0);
}

#[test]
fn test_great_deluge_bound() {
    let mut solution = coloured_cycle(0);
    solution.save_best();
    assert_eq!(solution.best_value(), Some(9.0));

    let properties = DataProperties::new().with("GreatDeluge.CoolRate", 0.5);
    let mut schedule = DelugeSchedule::from_properties(&properties);
    let mut state = SearchState::new();
    schedule.activate(&state, &solution);
    assert!((schedule.bound() - 9.45).abs() < 1e-9);

    assert!(schedule.accept(&state, &mut solution, 0.3, 9.3));
    assert!(schedule.accept(&state, &mut solution, -1.0, 8.0));
    assert!(!schedule.accept(&state, &mut solution, 1.0, 10.0));

    // 9.45 halves below the lower bound 0.95·9 and is raised to 9 + 2.
    state.iteration += 1;
    assert!(schedule.inc_iteration(&mut state, &mut solution));
    assert_eq!(schedule.idle(), 1);
    assert_eq!(schedule.bound(), 11.0);
    assert!(schedule.accept(&state, &mut solution, 1.0, 10.0));
}

#[test]
fn test_annealing_probability() {
    let properties = DataProperties::new().with("SimulatedAnnealing.InitialTemperature", 1.0);
    let schedule = AnnealingSchedule::from_properties(&properties);
    assert!(!schedule.is_training());
    assert_eq!(schedule.probability(-1.0), 1.0);
    assert_eq!(schedule.probability(0.0), 1.0);
    assert!((schedule.probability(1.0) - (-1.0f64).exp()).abs() < 1e-12);

    let stochastic = AnnealingSchedule::from_properties(
        &properties.clone().with("SimulatedAnnealing.StochasticHC", true),
    );
    assert!((stochastic.probability(0.0) - 0.5).abs() < 1e-12);
}

#[test]
fn test_annealing_trains_temperature() {
    let mut solution = coloured_cycle(0);
    solution.save_best();
    let properties = DataProperties::new().with("SimulatedAnnealing.TrainingValues", 5);
    let mut schedule = AnnealingSchedule::from_properties(&properties);
    let mut state = SearchState::new();
    schedule.activate(&state, &solution);
    assert!(schedule.is_training());

    for _ in 0..5 {
        state.iteration += 1;
        assert!(!schedule.inc_iteration(&mut state, &mut solution));
        assert!(schedule.accept(&state, &mut solution, -1.0, 8.0));
        assert!(!schedule.accept(&state, &mut solution, 2.0, 11.0));
    }

    state.iteration += 1;
    schedule.inc_iteration(&mut state, &mut solution);
    assert!(!schedule.is_training());
    let expected = -2.0 / (0.01f64 * 0.00001).ln();
    assert!((schedule.temperature() - expected).abs() < 1e-9);
    assert!(schedule.probability(2.0) < 0.01);
}

#[test]
fn test_simple_search_solves_queens() {
    let registry = SelectionRegistry::<usize>::new();
    let properties = DataProperties::new().with("Search.MaxIdleIterations", -1);
    let mut solution = Solution::new(Arc::new(queens_model(8))).with_seed(17);
    let mut search = SimpleSearch::new(&properties, &registry);
    search.init(&solution);

    for _ in 0..20_000 {
        if solution.is_complete() {
            break;
        }
        if let Some(mut neighbour) = search.select_neighbour(&mut solution) {
            solution.apply(neighbour.as_mut());
        }
        solution.update(0.0, true);
        let unassigned = solution.assignment().nr_unassigned_variables();
        if solution.best_unassigned().map_or(true, |best| unassigned < best) {
            solution.save_best();
            search.best_saved(&solution);
        }
    }
    assert!(solution.is_complete());
    assert_eq!(count_attacks(solution.model(), solution.assignment()), 0);
    assert_eq!(search.phase(), Some(Phase::Ifs));

    let _ = search.select_neighbour(&mut solution);
    assert!(search.phase() >= Some(Phase::HillClimbing));
}

/// Proposes nothing and counts restored best solutions.
#[derive(Debug)]
struct RestoreCounter {
    restored: Arc<AtomicUsize>,
}

impl NeighbourSelection<usize> for RestoreCounter {
    fn name(&self) -> &str {
        "RestoreCounter"
    }

    fn select_neighbour(&mut self, _solution: &mut Solution<usize>) -> Option<Box<dyn Neighbour<usize>>> {
        None
    }

    fn best_restored(&mut self, _solution: &Solution<usize>) {
        self.restored.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_simple_search_notifies_restored_best() {
    let restored = Arc::new(AtomicUsize::new(0));
    let mut registry = SelectionRegistry::<usize>::new();
    let counter = Arc::clone(&restored);
    registry.register("RestoreCounter", move |_, _| {
        Box::new(RestoreCounter {
            restored: Arc::clone(&counter),
        })
    });
    let properties = DataProperties::new()
        .with("Construction.Class", "RestoreCounter")
        .with("Search.MaxIdleIterations", 0);

    let model = Arc::new(queens_model(4));
    let mut solution = Solution::new(Arc::clone(&model)).with_seed(5);
    for (column, row) in [1, 3, 0, 2].into_iter().enumerate() {
        model.assign(solution.assignment_mut(), 1, model.variables()[column].values()[row]);
    }
    solution.save_best();
    model.unassign(solution.assignment_mut(), 2, model.variables()[0].id());

    let mut search = SimpleSearch::new(&properties, &registry);
    search.init(&solution);
    // Construction yields nothing, IFS proposes one move and then idles out.
    assert!(search.select_neighbour(&mut solution).is_some());
    assert_eq!(restored.load(Ordering::SeqCst), 0);
    let _ = search.select_neighbour(&mut solution);

    assert!(search.phase() >= Some(Phase::HillClimbing));
    assert!(solution.is_complete());
    assert_eq!(restored.load(Ordering::SeqCst), 1);
}

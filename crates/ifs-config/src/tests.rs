//! Tests for the property bag.

use super::*;

#[test]
fn test_toml_parsing() {
    let toml = r#"
        "Search.GreatDeluge" = false

        [General]
        MPP = true
        Seed = 42

        [Termination]
        MaxIters = 1000

        [HillClimber]
        Neighbours = ["RandomMove", "RandomSwapMove@0.01"]
    "#;

    let properties = DataProperties::from_toml_str(toml).unwrap();
    assert!(properties.get_bool("General.MPP", false));
    assert!(!properties.get_bool("Search.GreatDeluge", true));
    assert_eq!(properties.get_i64("Termination.MaxIters", -1), 1000);
    assert_eq!(
        properties.get("HillClimber.Neighbours"),
        Some("RandomMove,RandomSwapMove@0.01")
    );

    let general = GeneralConfig::from_properties(&properties);
    assert_eq!(general.seed, Some(42));
    assert!(general.mpp);
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        General:
          MPP: true
          Seed: 7
        SimulatedAnnealing:
          CoolingRate: 0.8
          CoolingRateAdjustments: [1.0, 0.5]
    "#;

    let properties = DataProperties::from_yaml_str(yaml).unwrap();
    assert_eq!(properties.get_u64("General.Seed", 0), 7);
    assert_eq!(properties.get_f64("SimulatedAnnealing.CoolingRate", 0.95), 0.8);
    assert_eq!(
        properties.get_f64_list("SimulatedAnnealing.CoolingRateAdjustments"),
        Some(vec![Some(1.0), Some(0.5)])
    );
}

#[test]
fn test_yaml_rejects_scalar_document() {
    assert!(matches!(
        DataProperties::from_yaml_str("42"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_invalid_values_fall_back_to_defaults() {
    let properties = DataProperties::new()
        .with("RandomSwapMove.MaxAttempts", "three")
        .with("General.MPP", "maybe")
        .with("GreatDeluge.CoolRate", "");

    assert_eq!(properties.get_usize("RandomSwapMove.MaxAttempts", 3), 3);
    assert!(!properties.get_bool("General.MPP", false));
    assert_eq!(properties.get_f64("GreatDeluge.CoolRate", 0.5), 0.5);
}

#[test]
fn test_builder_and_prefix() {
    let mut properties: DataProperties = [
        ("HillClimber.MaxIdle", "100"),
        ("HillClimber.Random", "true"),
        ("General.Seed", "1"),
    ]
    .into_iter()
    .collect();
    properties.extend(&DataProperties::new().with("HillClimber.MaxIdle", 200));

    let keys: Vec<&str> = properties.keys_with_prefix("HillClimber.").collect();
    assert_eq!(keys, vec!["HillClimber.MaxIdle", "HillClimber.Random"]);
    assert_eq!(properties.get_u64("HillClimber.MaxIdle", 0), 200);
    assert_eq!(properties.remove("General.Seed").as_deref(), Some("1"));
    assert_eq!(properties.len(), 2);
}

#[test]
fn test_termination_config() {
    let properties = DataProperties::new()
        .with("Termination.StopWhenComplete", true)
        .with("Termination.TimeOut", 2.5);
    let termination = TerminationConfig::from_properties(&properties);

    assert!(termination.stop_when_complete);
    assert_eq!(termination.iteration_limit(), None);
    assert_eq!(termination.time_limit(), Some(Duration::from_millis(2500)));
}

#[test]
fn test_non_finite_time_out_disables_limit() {
    for raw in ["inf", "-inf", "NaN", "1e300"] {
        let properties = DataProperties::new().with("Termination.TimeOut", raw);
        let termination = TerminationConfig::from_properties(&properties);
        assert_eq!(termination.time_limit(), None, "{raw}");
    }
}

#[test]
fn test_general_config_defaults() {
    let general = GeneralConfig::from_properties(&DataProperties::new().with("Parallel.NrSolvers", 0));
    assert_eq!(general.seed, None);
    assert_eq!(general.save_best_unassigned, -1);
    assert_eq!(general.nr_solvers, 1);
}

#[test]
fn test_extensions_by_short_name() {
    let properties = DataProperties::new().with(
        "Extensions.Classes",
        "org.cpsolver.ifs.extension.ConflictStatistics; Other",
    );
    let general = GeneralConfig::from_properties(&properties);
    assert_eq!(general.extensions, ["ConflictStatistics", "Other"]);
    assert!(general.has_extension("ConflictStatistics"));
    assert!(!GeneralConfig::default().has_extension("ConflictStatistics"));
}

#[test]
fn test_serde_round_trip_is_flat() {
    let properties = DataProperties::new().with("General.MPP", true);
    let text = toml::to_string(&properties).unwrap();
    assert!(text.contains("\"General.MPP\" = \"true\""));
}

use itertools::Itertools;

use super::*;

#[test]
fn test_strategy_entries_every_build() {
    let entries = SweepSpec::new(SweepFamily::Strategy)
        .with_scratch(ScratchPolicy::EveryBuild)
        .entries();
    assert_eq!(entries.len(), 3 * (1 + 9));
    assert_eq!(entries[0].labels, vec!["Scratch", "", ""]);
    assert_eq!(entries[0].point.update_strategy, UpdateStrategy::Scratch);
    assert_eq!(entries[0].point.build_strategy, BuildStrategy::Random);
    assert_eq!(entries[1].labels, vec!["Random", "Minimal", "Minimal"]);
    assert_eq!(entries[2].labels, vec!["Random", "Minimal", "Maximum"]);
    assert_eq!(entries[10].labels, vec!["Scratch", "", ""]);
    assert_eq!(entries[10].point.build_strategy, BuildStrategy::Greedy);
    assert!(entries
        .iter()
        .filter(|e| e.labels[0] != "Scratch")
        .all(|e| e.point.update_strategy == UpdateStrategy::UseHistory));
}

#[test]
fn test_strategy_scratch_defaults_to_random_only() {
    let entries = SweepSpec::new(SweepFamily::Strategy).entries();
    assert_eq!(entries.len(), 1 + 3 * 9);
    let scratch = entries
        .iter()
        .filter(|e| e.point.update_strategy == UpdateStrategy::Scratch)
        .collect_vec();
    assert_eq!(scratch.len(), 1);
    assert_eq!(scratch[0].point.build_strategy, BuildStrategy::Random);
}

#[test]
fn test_meta_entries() {
    let entries = SweepSpec::new(SweepFamily::Meta).entries();
    let scan = LAMBDA_SCAN.len();
    assert_eq!(scan, 33);
    assert_eq!(entries.len(), 6 * (4 * scan + 2));

    // window 1, no aspiration, keep penalties: no dynamic point
    assert_eq!(entries[0].labels, vec!["0", "0", "0.1", "1"]);
    assert_eq!(entries[scan - 1].labels, vec!["0", "0", "9.7", "1"]);
    // penalty reset starts with the dynamic point
    assert_eq!(entries[scan].labels, vec!["0", "1", "dynamic", "1"]);
    assert!(entries[scan].point.dynamic_lambda);
    assert_eq!(entries[scan + 1].labels, vec!["0", "1", "0.1", "1"]);
    assert!(!entries[scan + 1].point.dynamic_lambda);
    assert_eq!(entries.last().unwrap().labels, vec!["1", "1", "9.7", "32"]);
}

#[test]
fn test_entries_are_deterministic_and_unique() {
    for family in [SweepFamily::Strategy, SweepFamily::Meta, SweepFamily::Moves] {
        let spec = SweepSpec::new(family);
        assert_eq!(spec.entries(), spec.entries());
        let entries = spec.entries();
        assert_eq!(
            entries.iter().map(|e| &e.slug).unique().count(),
            entries.len()
        );
        assert!(entries
            .iter()
            .all(|e| e.labels.len() == spec.label_columns().len()));
    }
}

#[test]
fn test_overrides_assign_every_key() {
    let entries = SweepSpec::new(SweepFamily::Meta).entries();
    let dynamic = entries.iter().find(|e| e.labels[2] == "dynamic").unwrap();
    let overrides = dynamic.point.overrides(17);
    let keys = overrides.iter().map(|(k, _)| *k).collect_vec();
    assert_eq!(
        keys,
        vec![
            "BUILD_STRATEGY",
            "UPDATE_STRATEGY",
            "SOURCE_TARGET",
            "DESTINATION_TARGET",
            "RESET_WEIGHTS",
            "ASPIRATION",
            "DYNAMIC_LAMBDA",
            "LAMBDA",
            "MAX_NO_IMPROVE",
            "LOWER_BOUND",
        ]
    );
    assert!(overrides.contains(&("DYNAMIC_LAMBDA", "1".to_string())));
    assert!(overrides.contains(&("LAMBDA", DEFAULT_LAMBDA.to_string())));
    assert!(overrides.contains(&("LOWER_BOUND", "17".to_string())));
}

#[test]
fn test_moves_entries() {
    let entries = SweepSpec::new(SweepFamily::Moves).entries();
    assert_eq!(entries.len(), 18);
    assert_eq!(entries[0].slug, "moves.0.clean");
    assert_eq!(entries[17].slug, "moves.2.asp_dynamic");
    assert_eq!(
        SweepSpec::new(SweepFamily::Moves).fixed_overrides(),
        vec![("DEBUG", "24".to_string())]
    );
}

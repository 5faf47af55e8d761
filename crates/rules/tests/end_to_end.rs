//! Full runs against in-memory and JSON-directory stores.

use std::fs;
use std::path::Path;

use ids_core::{Config, DataEntity, JsonStore, MemoryStore, Node};
use ids_rules::{validate, validate_store, CoverageRatio, EngineError, ConfigurationError, ValidateOptions};
use serde_json::json;
use tempfile::TempDir;

const WILDCARD: &str = r#"
fn always(ids) {
    check(true);
}
validator("always", ["*"]);
"#;

const POSITIVE: &str = r#"
/// `field` must be positive.
fn positive_field(cp) {
    check(cp.field > 0, "field is not positive");
}
validator("positive_field", ["core_profiles"]);
"#;

fn ruleset_root() -> TempDir {
    let dir = TempDir::new().expect("create tempdir");
    let ruleset = dir.path().join("demo");
    fs::create_dir_all(&ruleset).unwrap();
    fs::write(ruleset.join("wildcard.rhai"), WILDCARD).unwrap();
    fs::write(ruleset.join("positive.rhai"), POSITIVE).unwrap();
    dir
}

fn options(root: &Path) -> ValidateOptions {
    ValidateOptions {
        rulesets: vec!["demo".to_string()],
        apply_generic: false,
        use_bundled_rulesets: false,
        extra_rule_dirs: vec![root.to_path_buf()],
        ..ValidateOptions::default()
    }
}

fn entity(name: &str, data: serde_json::Value) -> DataEntity {
    DataEntity::new(name, 0, "3.40.0", Node::from_json(&data).unwrap())
}

#[test]
fn two_modules_against_two_entities() {
    let rules = ruleset_root();
    let store = MemoryStore::new("memory://demo")
        .with(entity("core_profiles", json!({"field": -1})))
        .with(entity("equilibrium", json!({"time": [0.0]})));

    let collection = validate_store(&store, &options(rules.path()), &Config::default(), None).unwrap();

    assert_eq!(collection.uri, "memory://demo");
    assert_eq!(collection.results.len(), 3);
    assert_eq!(collection.passed(), 2);
    assert_eq!(collection.failed(), 1);

    let failure = collection.results.iter().find(|r| !r.success).unwrap();
    assert_eq!(failure.rule.function, "positive_field");
    assert_eq!(failure.message, "field is not positive");
    assert_eq!(failure.location.line, Some(4));
    assert_eq!(failure.location.snippet, r#"check(cp.field > 0, "field is not positive");"#);

    let cp = &failure.bindings[0];
    assert_eq!(failure.touched[cp].iter().collect::<Vec<_>>(), vec!["field"]);
    assert_eq!(collection.coverage[cp].ratio(), CoverageRatio::Ratio(1.0));
}

#[test]
fn json_store_run_reports_schema_coverage() {
    let rules = ruleset_root();
    let data = TempDir::new().unwrap();
    let store = JsonStore::open(data.path()).unwrap();
    store
        .write(&entity("core_profiles", json!({"field": 2, "other": 1, "profiles_1d": [{"t": 1.0}]})))
        .unwrap();
    store
        .write_schema("core_profiles", ["field", "other", "profiles_1d/t", "unused"])
        .unwrap();

    let uri = format!("file://{}", data.path().display());
    let collection = validate(&uri, &options(rules.path()), &Config::default(), None).unwrap();

    assert!(collection.all_passed());
    let entry = collection.coverage.values().next().unwrap();
    assert_eq!(entry.filled, 3);
    assert_eq!(entry.visited, 1);
    assert_eq!(entry.total, Some(4));
    assert_eq!(entry.total_overlap, Some(1));
    assert_eq!(entry.total_ratio(), Some(CoverageRatio::Ratio(0.25)));
}

#[test]
fn unknown_ruleset_aborts_before_execution() {
    let rules = ruleset_root();
    let store = MemoryStore::new("memory://demo").with(entity("core_profiles", json!({"field": 1})));
    let options = ValidateOptions {
        rulesets: vec!["dmeo".to_string()],
        ..options(rules.path())
    };

    let err = validate_store(&store, &options, &Config::default(), None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Configuration(ConfigurationError::InvalidRulesetName { .. })
    ));
    assert!(err.to_string().contains("Did you mean 'demo'?"), "{err}");
}

#[test]
fn unsupported_uri_scheme_is_a_store_error() {
    let rules = ruleset_root();
    let err = validate("imas:hdf5?path=/tmp/x", &options(rules.path()), &Config::default(), None).unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[test]
fn bundled_generic_rules_run_cleanly_on_consistent_data() {
    let store = MemoryStore::new("memory://generic").with(entity(
        "core_profiles",
        json!({
            "ids_properties": {"homogeneous_time": 1},
            "time": [0.0, 0.5, 1.0],
            "global_quantities": {"ip": [1.0e6, 1.1e6, 1.2e6]},
            "profiles_1d": [
                {"time": 0.0, "t_i_average_min": 1.0, "t_i_average": 2.0, "t_i_average_max": 3.0},
                {"time": 0.5}
            ]
        }),
    ));
    let options = ValidateOptions {
        use_bundled_rulesets: true,
        ..ValidateOptions::default()
    };

    let collection = validate_store(&store, &options, &Config::default(), None).unwrap();
    let failures: Vec<String> = collection
        .results
        .iter()
        .filter(|r| !r.success)
        .map(|r| format!("{}: {}", r.rule.name, r.message))
        .collect();
    assert!(failures.is_empty(), "{failures:?}");
    assert!(collection.results.len() >= 5);
}

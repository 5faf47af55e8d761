use std::fs;
use std::path::Path;

use ids_core::Config;
use tempfile::TempDir;

use super::*;
use crate::options::RuleFilter;

const POSITIVE: &str = r#"//! Profile checks.

/// Field must be positive.
fn positive(cp) {
    check(cp.field > 0);
}
validator("positive", ["core_profiles"]);
"#;

const ANY_IDS: &str = r#"
fn always(ids) {
    check(true);
}
validator("always", ["*"]);
"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn options(root: &Path, rulesets: &[&str]) -> ValidateOptions {
    ValidateOptions {
        rulesets: rulesets.iter().map(|s| s.to_string()).collect(),
        use_bundled_rulesets: false,
        extra_rule_dirs: vec![root.to_path_buf()],
        ..ValidateOptions::default()
    }
}

fn fixture() -> TempDir {
    let dir = TempDir::new().expect("create tempdir");
    write(dir.path(), "generic/any.rhai", ANY_IDS);
    write(dir.path(), "generic/README.md", "Checks for every IDS.");
    write(dir.path(), "profiles/positive.rhai", POSITIVE);
    write(dir.path(), "profiles/notes.txt", "not a rule");
    write(dir.path(), "profiles/.hidden.rhai", ANY_IDS);
    write(dir.path(), "profiles/broken.rhai", "fn broken( {");
    write(dir.path(), "profiles/empty.rhai", "// nothing here\n");
    write(dir.path(), ".git/config.rhai", ANY_IDS);
    dir
}

#[test]
fn discovers_rulesets_skipping_hidden_directories() {
    let dir = fixture();
    let options = options(dir.path(), &[]);
    let config = RulesConfig::default();
    let found = RulesetLoader::new(&options, &config).discover().unwrap();
    let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["generic", "profiles"]);
}

#[test]
fn loads_generic_and_requested_rulesets() {
    let dir = fixture();
    let options = options(dir.path(), &["profiles"]);
    let config = RulesConfig::default();
    let loaded = RulesetLoader::new(&options, &config).load().unwrap();

    let names: Vec<&str> = loaded.rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["generic/any.rhai/always", "profiles/positive.rhai/positive"]);

    let status = |file: &str| {
        loaded
            .results
            .iter()
            .find(|r| r.path.ends_with(file))
            .map(|r| r.status.clone())
    };
    assert_eq!(status("any.rhai"), Some(LoadStatus::Loaded { rules: 1 }));
    assert_eq!(status("empty.rhai"), Some(LoadStatus::Loaded { rules: 0 }));
    assert!(matches!(status("broken.rhai"), Some(LoadStatus::Failed { .. })));
    assert!(matches!(status("notes.txt"), Some(LoadStatus::Skipped { .. })));
    assert_eq!(status(".hidden.rhai"), None);
    assert_eq!(status("README.md"), None);
}

#[test]
fn generic_can_be_disabled() {
    let dir = fixture();
    let options = ValidateOptions {
        apply_generic: false,
        ..options(dir.path(), &["profiles"])
    };
    let config = RulesConfig::default();
    let loaded = RulesetLoader::new(&options, &config).load().unwrap();
    assert!(loaded.rules.iter().all(|r| r.ruleset == "profiles"));
}

#[test]
fn unknown_ruleset_suggests_closest_name() {
    let dir = fixture();
    let options = options(dir.path(), &["profile"]);
    let config = RulesConfig::default();
    let err = RulesetLoader::new(&options, &config).load().unwrap_err();
    match err {
        ConfigurationError::InvalidRulesetName { name, hint } => {
            assert_eq!(name, "profile");
            assert_eq!(hint, "Did you mean 'profiles'?");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let options = options(&dir.path().join("absent"), &[]);
    let config = RulesConfig::default();
    let err = RulesetLoader::new(&options, &config).load().unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidRulesetPath(_)));
}

#[test]
fn name_filter_matching_nothing_leaves_no_rules() {
    let dir = fixture();
    let options = ValidateOptions {
        rule_filter: RuleFilter {
            name: vec!["does-not-exist".to_string()],
            entity: Vec::new(),
        },
        ..options(dir.path(), &["profiles"])
    };
    let config = RulesConfig::default();
    let loaded = RulesetLoader::new(&options, &config).load().unwrap();
    assert!(loaded.rules.is_empty());
}

#[test]
fn entity_filter_keeps_matching_patterns() {
    let dir = fixture();
    let options = ValidateOptions {
        rule_filter: RuleFilter {
            name: Vec::new(),
            entity: vec!["core_prof".to_string()],
        },
        ..options(dir.path(), &["profiles"])
    };
    let config = RulesConfig::default();
    let loaded = RulesetLoader::new(&options, &config).load().unwrap();
    let names: Vec<&str> = loaded.rules.iter().map(|r| r.function.as_str()).collect();
    assert_eq!(names, vec!["positive"]);
}

#[test]
fn ruleset_path_env_adds_roots() {
    let extra = fixture();
    std::env::set_var(
        "LOADERTEST_RULESET_PATH",
        format!("{}:", extra.path().display()),
    );
    let config = Config::for_profile("loadertest");
    std::env::remove_var("LOADERTEST_RULESET_PATH");

    let options = ValidateOptions {
        rulesets: vec!["profiles".to_string()],
        use_bundled_rulesets: false,
        ..ValidateOptions::default()
    };
    let loader = RulesetLoader::new(&options, &config.rules);
    assert_eq!(loader.search_roots(), vec![extra.path().to_path_buf()]);
    assert_eq!(loader.load().unwrap().rules.len(), 2);
}

#[test]
fn bundled_generic_ruleset_compiles() {
    let options = ValidateOptions::default();
    let config = RulesConfig::default();
    let loaded = RulesetLoader::new(&options, &config).load().unwrap();
    assert!(!loaded.rules.is_empty());
    assert!(loaded.rules.iter().all(|r| r.ruleset == GENERIC_RULESET));
    assert!(loaded
        .results
        .iter()
        .all(|r| matches!(r.status, LoadStatus::Loaded { .. })));
}

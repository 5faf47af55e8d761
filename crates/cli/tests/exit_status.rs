//! Runs the `ids-validator` binary and checks its exit status and output.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const RULES: &str = r#"//! Demo rules.

/// `field` must be positive.
fn positive_field(cp) {
    check(cp.field > 0, "field is not positive");
}
validator("positive_field", ["core_profiles"]);
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(field: i64) -> Self {
        let dir = TempDir::new().unwrap();
        let ruleset = dir.path().join("rules").join("demo");
        fs::create_dir_all(&ruleset).unwrap();
        fs::write(ruleset.join("positive.rhai"), RULES).unwrap();

        let entity = dir.path().join("store").join("core_profiles");
        fs::create_dir_all(&entity).unwrap();
        fs::write(
            entity.join("0.json"),
            format!(r#"{{"version": "3.40.0", "data": {{"field": {field}}}}}"#),
        )
        .unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }

    fn run(&self, args: &[&str]) -> Output {
        let config = self.path("config.toml");
        let rules = self.path("rules");
        let mut all = vec![args[0], "--config", config.as_str(), "--no-generic", "--no-bundled", "--extra-rule-dir", rules.as_str()];
        all.extend_from_slice(&args[1..]);
        Command::new(env!("CARGO_BIN_EXE_ids-validator"))
            .args(&all)
            .env_remove("RULESET_PATH")
            .env("RUST_LOG", "off")
            .output()
            .unwrap()
    }
}

fn reports_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn passing_run_exits_zero_and_writes_reports() {
    let fixture = Fixture::new(3);
    let store = fixture.path("store");
    let reports = fixture.path("reports");
    let out = fixture.run(&["validate", "-r", "demo", "--report-dir", &reports, &store]);

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    let names = reports_in(Path::new(&reports));
    assert_eq!(names.len(), 4, "{names:?}");
    assert!(names.iter().any(|n| n == "index.html"));
    assert!(names.iter().any(|n| n.starts_with("store_") && n.ends_with(".xml")));
}

#[test]
fn failing_check_exits_one() {
    let fixture = Fixture::new(-1);
    let store = fixture.path("store");
    let out = fixture.run(&["validate", "-r", "demo", "--no-report", &store]);

    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("field is not positive"), "{stdout}");
}

#[test]
fn unknown_ruleset_exits_two() {
    let fixture = Fixture::new(1);
    let store = fixture.path("store");
    let out = fixture.run(&["validate", "-r", "dmeo", "--no-report", &store]);

    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Did you mean 'demo'?"));
}

#[test]
fn explore_prints_rule_tree() {
    let fixture = Fixture::new(1);
    let out = fixture.run(&["explore", "-r", "demo", "--docstring-level", "2"]);

    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("demo"));
    assert!(stdout.contains("positive.rhai"));
    assert!(stdout.contains("positive_field"));
    assert!(stdout.contains("`field` must be positive."));
}

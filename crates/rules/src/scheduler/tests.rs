use std::path::Path;
use std::sync::Arc;

use ids_core::{DataEntity, EntityKey, MemoryStore, Node};

use super::*;
use crate::script::{compile_module, EngineLimits};

fn rules(source: &str) -> Vec<Arc<Rule>> {
    compile_module(source, Path::new("sched.rhai"), "test", EngineLimits::default())
        .unwrap()
        .into_iter()
        .map(Arc::new)
        .collect()
}

fn entity(name: &str, occurrence: u32, version: &str) -> DataEntity {
    DataEntity::new(name, occurrence, version, Node::structure([("x", Node::leaf(1_i64))]))
}

fn keys(tasks: &[ExecutionTask]) -> Vec<Vec<EntityKey>> {
    tasks.iter().map(ExecutionTask::bindings).collect()
}

#[test]
fn wildcard_rule_runs_once_per_entry() {
    let rules = rules(r#"fn any_ids(ids) { check(true); } validator("any_ids", ["*"]);"#);
    let catalog = EntityCatalog::from_entities([
        entity("core_profiles", 0, "3.40.0"),
        entity("core_profiles", 1, "3.40.0"),
        entity("equilibrium", 0, "3.40.0"),
    ]);
    let store = MemoryStore::new("memory://");

    let tasks = TaskScheduler::new(&store).schedule(&rules, &catalog).unwrap();
    assert_eq!(
        keys(&tasks),
        vec![
            vec![EntityKey::new("core_profiles", 0)],
            vec![EntityKey::new("core_profiles", 1)],
            vec![EntityKey::new("equilibrium", 0)],
        ]
    );
}

#[test]
fn pinned_rule_respects_version_specifier() {
    let rules = rules(
        r#"
        fn recent(x) { check(true); }
        validator("recent", ["x:0"], #{ version: ">=2.0" });
        "#,
    );
    let catalog = EntityCatalog::from_entities([entity("x", 0, "v1.0"), entity("x", 0, "2.1"), entity("x", 1, "2.1")]);
    let store = MemoryStore::new("memory://");

    let tasks = TaskScheduler::new(&store).schedule(&rules, &catalog).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].entities[0].version, "2.1");
}

#[test]
fn catalog_order_comes_before_rule_order() {
    let rules = rules(
        r#"
        fn rule_one(ids) { }
        fn rule_two(ids) { }
        validator("rule_one", ["*"]);
        validator("rule_two", ["*"]);
        "#,
    );
    let catalog = EntityCatalog::from_entities([entity("a", 0, "1"), entity("b", 0, "1")]);
    let store = MemoryStore::new("memory://");

    let tasks = TaskScheduler::new(&store).schedule(&rules, &catalog).unwrap();
    let order: Vec<(String, String)> = tasks
        .iter()
        .map(|t| (t.entities[0].name().to_string(), t.rule.function.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), "rule_one".to_string()),
            ("a".to_string(), "rule_two".to_string()),
            ("b".to_string(), "rule_one".to_string()),
            ("b".to_string(), "rule_two".to_string()),
        ]
    );
}

#[test]
fn additional_entities_are_fetched_from_store() {
    let rules = rules(
        r#"
        fn consistent(cp, eq) { check(true); }
        validator("consistent", ["core_profiles", "equilibrium:0"]);
        "#,
    );
    let catalog = EntityCatalog::from_entities([entity("core_profiles", 0, "3"), entity("core_profiles", 1, "3")]);
    let store = MemoryStore::new("memory://").with(entity("equilibrium", 0, "3"));

    let tasks = TaskScheduler::new(&store).schedule(&rules, &catalog).unwrap();
    assert_eq!(
        keys(&tasks),
        vec![
            vec![EntityKey::new("core_profiles", 0), EntityKey::new("equilibrium", 0)],
            vec![EntityKey::new("core_profiles", 1), EntityKey::new("equilibrium", 0)],
        ]
    );
    // Both tasks share the single fetched instance.
    assert!(Arc::ptr_eq(&tasks[0].entities[1], &tasks[1].entities[1]));
}

#[test]
fn missing_additional_entity_skips_candidate() {
    let rules = rules(
        r#"
        fn consistent(cp, eq) { check(true); }
        validator("consistent", ["core_profiles", "equilibrium:3"]);
        "#,
    );
    let catalog = EntityCatalog::from_entities([entity("core_profiles", 0, "3")]);
    let store = MemoryStore::new("memory://").with(entity("equilibrium", 0, "3"));

    let tasks = TaskScheduler::new(&store).schedule(&rules, &catalog).unwrap();
    assert!(tasks.is_empty());
}

#[test]
fn catalog_enumerates_store() {
    let store = MemoryStore::new("memory://")
        .with(entity("b", 1, "1"))
        .with(entity("a", 0, "1"))
        .with(entity("b", 0, "1"));
    let catalog = EntityCatalog::from_store(&store).unwrap();
    let keys: Vec<String> = catalog.entries().iter().map(|e| e.key.to_string()).collect();
    assert_eq!(keys, vec!["a/0", "b/0", "b/1"]);
}

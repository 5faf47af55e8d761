use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use ids_core::{CompareOp, DataEntity, EntityKey, MemoryStore, Node};
use serde_json::json;

use super::*;
use crate::proxy::{compare, FieldRef, Observed, TouchLog};
use crate::script::{compile_module, EngineLimits};

fn rule() -> Arc<Rule> {
    let rules = compile_module(
        "fn r(a, b) { } validator(\"r\", [\"core_profiles\", \"equilibrium:0\"]);",
        Path::new("/rules/test/pair.rhai"),
        "test",
        EngineLimits::default(),
    )
    .unwrap();
    Arc::new(rules.into_iter().next().unwrap())
}

fn core_profiles() -> DataEntity {
    let root = Node::from_json(&json!({
        "time": [0.0, 1.0],
        "a": {"x": 3, "y": 2, "z": null},
        "profiles_1d": [{"t": 1.0}, {"t": 2.0}]
    }))
    .unwrap();
    DataEntity::new("core_profiles", 0, "3.40.0", root)
}

fn equilibrium() -> DataEntity {
    DataEntity::new("equilibrium", 0, "3.40.0", Node::structure([("b", Node::leaf(1.5))]))
}

#[test]
fn record_partitions_touched_fields_by_binding() {
    let cp = core_profiles();
    let eq = equilibrium();
    let collector = ResultCollector::new();
    let context = collector.context(rule(), vec![cp.key.clone(), eq.key.clone()], None);

    let a = Observed::root(&cp, TouchLog::new()).child("a").unwrap();
    let b = Observed::root(&eq, TouchLog::new()).child("b").unwrap();
    let test = compare(&a.child("x").unwrap().into(), CompareOp::Gt, &b.into()).unwrap();
    context.record(&test, "x above b", context.location(Some(1))).unwrap();

    let results = collector.snapshot();
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].touched[&cp.key], BTreeSet::from(["a/x".to_string()]));
    assert_eq!(results[0].touched[&eq.key], BTreeSet::from(["b".to_string()]));
}

#[test]
fn unbound_fields_are_dropped() {
    let cp = core_profiles();
    let collector = ResultCollector::new();
    let context = collector.context(rule(), vec![cp.key.clone()], None);
    let stray = BTreeSet::from([FieldRef {
        entity: EntityKey::new("wall", 0),
        path: "x".to_string(),
    }]);
    let fault = RuleFault {
        message: "boom".to_string(),
        frames: vec![StackFrame {
            function: "r".to_string(),
            line: Some(1),
            snippet: String::new(),
        }],
    };
    context.add_error(fault, &stray);

    let results = collector.snapshot();
    assert!(results[0].touched.is_empty());
    assert!(results[0].is_error());
    assert_eq!(results[0].location.line, Some(1));
    assert!(results[0].traceback().unwrap().ends_with("boom"));
}

#[test]
fn collection_counts_and_entity_grouping() {
    let cp = core_profiles();
    let eq = equilibrium();
    let collector = ResultCollector::new();
    let cp_context = collector.context(rule(), vec![cp.key.clone()], None);
    let eq_context = collector.context(rule(), vec![eq.key.clone()], None);

    let yes = Observed::derived(true.into(), BTreeSet::new());
    let no = Observed::derived(false.into(), BTreeSet::new());
    cp_context.record(&yes, "", cp_context.location(None)).unwrap();
    cp_context.record(&no, "bad", cp_context.location(None)).unwrap();
    eq_context.record(&yes, "", eq_context.location(None)).unwrap();

    let collection = collector.finish("memory://", Default::default());
    assert_eq!(collection.results.len(), 3);
    assert_eq!(collection.passed(), 2);
    assert_eq!(collection.failed(), 1);
    assert_eq!(collection.errors(), 0);
    assert!(!collection.all_passed());
    assert_eq!(collection.failed_entities(), BTreeSet::from([&cp.key]));
    assert_eq!(collection.passed_entities(), BTreeSet::from([&eq.key]));
    assert_eq!(collection.by_entity()[&cp.key].len(), 2);
}

#[test]
fn coverage_counts_filled_visited_and_overlap() {
    let cp = Arc::new(core_profiles());
    let collector = ResultCollector::new();
    let context = collector.context(rule(), vec![cp.key.clone()], None);
    let root = Observed::root(&cp, TouchLog::new());
    let x = root.child("a").unwrap().child("x").unwrap();
    let t = root.child("profiles_1d").unwrap().index(1).unwrap().child("t").unwrap();
    let z = root.child("a").unwrap().child("z").unwrap();
    let test = compare(&x.into(), CompareOp::Gt, &t.into()).unwrap();
    context.record(&test, "", context.location(None)).unwrap();
    // An empty leaf counts as visited but is not filled.
    context.record(&crate::proxy::exists(&z), "", context.location(None)).unwrap();

    let store = MemoryStore::new("memory://").with_schema(
        "core_profiles",
        ["time", "a/x", "a/y", "a/z", "profiles_1d/t", "profiles_1d/u"],
    );
    let coverage = compute_coverage(&collector.snapshot(), [&cp], &store).unwrap();
    let entry = &coverage[&cp.key];

    // time, a/x, a/y, profiles_1d[0]/t, profiles_1d[1]/t
    assert_eq!(entry.filled, 5);
    assert_eq!(entry.visited, 3);
    assert_eq!(entry.overlap, 2);
    assert_eq!(entry.ratio(), CoverageRatio::Ratio(0.4));
    assert_eq!(entry.total, Some(6));
    assert_eq!(entry.total_overlap, Some(3));
}

#[test]
fn empty_entity_has_vacuous_ratio() {
    let empty = Arc::new(DataEntity::new("empty", 0, "1", Node::structure(Vec::<(String, Node)>::new())));
    let store = MemoryStore::new("memory://");
    let coverage = compute_coverage(&[], [&empty], &store).unwrap();
    let entry = &coverage[&empty.key];
    assert_eq!(entry.filled, 0);
    assert_eq!(entry.ratio(), CoverageRatio::Vacuous);
    assert_eq!(entry.ratio().to_string(), "n/a");
    assert_eq!(entry.total_ratio(), None);
}

#[test]
fn ratio_stays_within_unit_interval() {
    for (num, den) in [(0, 3), (3, 3), (1, 4)] {
        let value = CoverageRatio::new(num, den).value().unwrap();
        assert!((0.0..=1.0).contains(&value));
    }
    assert_eq!(CoverageRatio::new(1, 4).to_string(), "25.0%");
}

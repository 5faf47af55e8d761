//! Template context built from a finished validation run.
//!
//! Every result is listed once per entity it was bound to, so a rule
//! binding two entities shows up in both test suites, each time with the
//! nodes it touched in that entity.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local};
use ids_core::EntityKey;
use ids_rules::{AssertionResult, CoverageEntry, ResultCollection};
use serde::Serialize;

/// Everything the report templates can see.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub uri: String,
    /// Generation time, `%Y-%m-%d %H:%M:%S`.
    pub generated: String,
    pub tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub suites: Vec<SuiteContext>,
    pub passed_entities: Vec<EntityContext>,
    pub failed_entities: Vec<FailedEntityContext>,
    pub coverage: Vec<CoverageContext>,
}

/// One JUnit test suite: the results bound to one (entity, occurrence).
#[derive(Debug, Clone, Serialize)]
pub struct SuiteContext {
    /// `1.<n>`, numbered in entity key order.
    pub id: String,
    /// `<entity>-<occurrence>`.
    pub name: String,
    pub tests: usize,
    pub failures: usize,
    pub errors: usize,
    pub cases: Vec<CaseContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseContext {
    pub id: String,
    pub name: String,
    pub classname: String,
    pub success: bool,
    pub error: bool,
    pub message: String,
    /// `file:line in function`.
    pub location: String,
    pub snippet: String,
    pub nodes: Vec<String>,
    pub traceback: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityContext {
    pub name: String,
    pub occurrence: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedEntityContext {
    pub name: String,
    pub occurrence: u32,
    pub rules: Vec<FailedRuleContext>,
}

/// Failing results of one rule against one entity. Message and traceback
/// come from the first failure; nodes are merged over all of them.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRuleContext {
    pub rule: String,
    pub message: String,
    pub traceback: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageContext {
    pub entity: String,
    pub filled: usize,
    pub visited: usize,
    pub overlap: usize,
    pub ratio: String,
    pub total: Option<usize>,
    pub total_overlap: Option<usize>,
    pub total_ratio: Option<String>,
}

impl ReportContext {
    pub fn build(collection: &ResultCollection, generated: DateTime<Local>) -> Self {
        let grouped = group_by_binding(collection);

        let suites = grouped
            .iter()
            .enumerate()
            .map(|(i, (key, results))| suite(i + 1, key, results))
            .collect();

        let mut passed_entities = Vec::new();
        let mut failed_entities = Vec::new();
        for (key, results) in &grouped {
            if results.iter().all(|r| r.success) {
                passed_entities.push(EntityContext {
                    name: key.name.clone(),
                    occurrence: key.occurrence,
                });
            } else {
                failed_entities.push(FailedEntityContext {
                    name: key.name.clone(),
                    occurrence: key.occurrence,
                    rules: failed_rules(key, results),
                });
            }
        }

        Self {
            uri: collection.uri.clone(),
            generated: generated.format("%Y-%m-%d %H:%M:%S").to_string(),
            tests: collection.results.len(),
            passed: collection.passed(),
            failed: collection.failed(),
            errors: collection.errors(),
            suites,
            passed_entities,
            failed_entities,
            coverage: collection.coverage.iter().map(|(k, e)| coverage(k, e)).collect(),
        }
    }
}

fn group_by_binding(collection: &ResultCollection) -> BTreeMap<&EntityKey, Vec<&AssertionResult>> {
    let mut grouped: BTreeMap<&EntityKey, Vec<&AssertionResult>> = BTreeMap::new();
    for result in &collection.results {
        for key in &result.bindings {
            grouped.entry(key).or_default().push(result);
        }
    }
    grouped
}

fn nodes(result: &AssertionResult, key: &EntityKey) -> Vec<String> {
    result
        .touched
        .get(key)
        .map(|paths| paths.iter().cloned().collect())
        .unwrap_or_default()
}

/// The rule-file traceback of an error, or the failing check's location.
fn traceback(result: &AssertionResult) -> String {
    result
        .traceback()
        .unwrap_or_else(|| format!("{}\n    {}", result.location, result.location.snippet))
}

fn suite(n: usize, key: &EntityKey, results: &[&AssertionResult]) -> SuiteContext {
    let id = format!("1.{n}");
    let cases = results
        .iter()
        .enumerate()
        .map(|(i, r)| CaseContext {
            id: format!("{id}.{}", i + 1),
            name: r.rule.name.clone(),
            classname: r.rule.ruleset.clone(),
            success: r.success,
            error: r.is_error(),
            message: r.message.clone(),
            location: r.location.to_string(),
            snippet: r.location.snippet.clone(),
            nodes: nodes(r, key),
            traceback: traceback(r),
        })
        .collect();

    SuiteContext {
        name: format!("{}-{}", key.name, key.occurrence),
        tests: results.len(),
        failures: results.iter().filter(|r| !r.success && !r.is_error()).count(),
        errors: results.iter().filter(|r| r.is_error()).count(),
        id,
        cases,
    }
}

fn failed_rules(key: &EntityKey, results: &[&AssertionResult]) -> Vec<FailedRuleContext> {
    let mut rules: Vec<FailedRuleContext> = Vec::new();
    let mut merged: Vec<BTreeSet<String>> = Vec::new();
    for result in results.iter().filter(|r| !r.success) {
        let touched = nodes(result, key);
        match rules.iter().position(|r| r.rule == result.rule.name) {
            Some(i) => merged[i].extend(touched),
            None => {
                rules.push(FailedRuleContext {
                    rule: result.rule.name.clone(),
                    message: result.message.clone(),
                    traceback: traceback(result),
                    nodes: Vec::new(),
                });
                merged.push(touched.into_iter().collect());
            }
        }
    }
    for (rule, nodes) in rules.iter_mut().zip(merged) {
        rule.nodes = nodes.into_iter().collect();
    }
    rules
}

fn coverage(key: &EntityKey, entry: &CoverageEntry) -> CoverageContext {
    CoverageContext {
        entity: key.to_string(),
        filled: entry.filled,
        visited: entry.visited,
        overlap: entry.overlap,
        ratio: entry.ratio().to_string(),
        total: entry.total,
        total_overlap: entry.total_overlap,
        total_ratio: entry.total_ratio().map(|r| r.to_string()),
    }
}

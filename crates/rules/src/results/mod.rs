//! Assertion results, the per-run collector and coverage.

mod collector;
mod coverage;

#[cfg(test)]
mod tests;

pub use self::collector::{RecordingContext, ResultCollector};
pub use self::coverage::{compute_coverage, CoverageEntry, CoverageRatio};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ids_core::EntityKey;

use crate::rule::Rule;

/// Where a check (or the failing statement of a rule error) sits in its
/// rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub function: String,
    /// The trimmed source line.
    pub snippet: String,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line} in {}", self.file.display(), self.function),
            None => write!(f, "{} in {}", self.file.display(), self.function),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub line: Option<usize>,
    pub snippet: String,
}

/// An uncaught error raised by a rule body, with the stack trimmed to
/// frames inside the rule file (innermost last).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFault {
    pub message: String,
    pub frames: Vec<StackFrame>,
}

impl RuleFault {
    pub fn innermost(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    /// Multi-line traceback in the order the calls were made.
    pub fn traceback(&self, file: &std::path::Path) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in &self.frames {
            match frame.line {
                Some(line) => out.push_str(&format!(
                    "  File \"{}\", line {line}, in {}\n",
                    file.display(),
                    frame.function
                )),
                None => out.push_str(&format!("  File \"{}\", in {}\n", file.display(), frame.function)),
            }
            if !frame.snippet.is_empty() {
                out.push_str(&format!("    {}\n", frame.snippet));
            }
        }
        out.push_str(&self.message);
        out
    }
}

/// Outcome of one check, or of one uncaught rule error.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    pub success: bool,
    pub message: String,
    pub rule: Arc<Rule>,
    pub bindings: Vec<EntityKey>,
    pub location: SourceLocation,
    /// Field paths examined, per bound entity.
    pub touched: BTreeMap<EntityKey, BTreeSet<String>>,
    pub error: Option<RuleFault>,
}

impl AssertionResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn traceback(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.traceback(&self.location.file))
    }
}

/// All results of one run plus coverage per bound entity.
#[derive(Debug, Clone)]
pub struct ResultCollection {
    pub uri: String,
    pub results: Vec<AssertionResult>,
    pub coverage: BTreeMap<EntityKey, CoverageEntry>,
}

impl ResultCollection {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn errors(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// Results grouped by the first bound entity, in key order.
    pub fn by_entity(&self) -> BTreeMap<EntityKey, Vec<&AssertionResult>> {
        let mut grouped: BTreeMap<EntityKey, Vec<&AssertionResult>> = BTreeMap::new();
        for result in &self.results {
            if let Some(key) = result.bindings.first() {
                grouped.entry(key.clone()).or_default().push(result);
            }
        }
        grouped
    }

    /// Entities with at least one failing result.
    pub fn failed_entities(&self) -> BTreeSet<&EntityKey> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .flat_map(|r| r.bindings.iter())
            .collect()
    }

    /// Bound entities with no failing result.
    pub fn passed_entities(&self) -> BTreeSet<&EntityKey> {
        let failed = self.failed_entities();
        self.results
            .iter()
            .flat_map(|r| r.bindings.iter())
            .filter(|k| !failed.contains(k))
            .collect()
    }
}

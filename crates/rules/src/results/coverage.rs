//! Coverage of entity fields by the checks of one run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use ids_core::{strip_indices, CoreError, DataEntity, DataStore, EntityKey};
use tracing::debug;

use super::AssertionResult;

/// A coverage ratio; a zero denominator is vacuous rather than an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoverageRatio {
    Vacuous,
    Ratio(f64),
}

impl CoverageRatio {
    pub fn new(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            CoverageRatio::Vacuous
        } else {
            CoverageRatio::Ratio(numerator as f64 / denominator as f64)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            CoverageRatio::Vacuous => None,
            CoverageRatio::Ratio(r) => Some(*r),
        }
    }
}

impl fmt::Display for CoverageRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageRatio::Vacuous => write!(f, "n/a"),
            CoverageRatio::Ratio(r) => write!(f, "{:.1}%", r * 100.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageEntry {
    /// Leaf paths holding a value.
    pub filled: usize,
    /// Distinct paths touched by any result.
    pub visited: usize,
    /// Filled paths that were touched.
    pub overlap: usize,
    /// Schema paths, when the store knows the schema.
    pub total: Option<usize>,
    /// Schema paths touched (indices stripped).
    pub total_overlap: Option<usize>,
}

impl CoverageEntry {
    /// `overlap / filled`.
    pub fn ratio(&self) -> CoverageRatio {
        CoverageRatio::new(self.overlap, self.filled)
    }

    /// `total_overlap / total`.
    pub fn total_ratio(&self) -> Option<CoverageRatio> {
        Some(CoverageRatio::new(self.total_overlap?, self.total?))
    }
}

/// Coverage per bound entity.
pub fn compute_coverage<'a>(
    results: &[AssertionResult],
    entities: impl IntoIterator<Item = &'a Arc<DataEntity>>,
    store: &dyn DataStore,
) -> Result<BTreeMap<EntityKey, CoverageEntry>, CoreError> {
    let mut visited: BTreeMap<&EntityKey, BTreeSet<&str>> = BTreeMap::new();
    for result in results {
        for (key, paths) in &result.touched {
            visited
                .entry(key)
                .or_default()
                .extend(paths.iter().map(String::as_str));
        }
    }

    let mut schemas: BTreeMap<String, Option<BTreeSet<String>>> = BTreeMap::new();
    let mut coverage = BTreeMap::new();
    for entity in entities {
        if coverage.contains_key(&entity.key) {
            continue;
        }
        let filled = entity.root.filled_leaf_paths();
        let empty = BTreeSet::new();
        let seen = visited.get(&entity.key).unwrap_or(&empty);
        let overlap = filled.iter().filter(|p| seen.contains(p.as_str())).count();

        if !schemas.contains_key(entity.name()) {
            schemas.insert(entity.name().to_string(), store.schema_paths(entity.name())?);
        }
        let (total, total_overlap) = match schemas.get(entity.name()).and_then(Option::as_ref) {
            Some(schema) => {
                let stripped: BTreeSet<String> = seen.iter().map(|p| strip_indices(p)).collect();
                let hit = schema.iter().filter(|p| stripped.contains(*p)).count();
                (Some(schema.len()), Some(hit))
            }
            None => (None, None),
        };

        let entry = CoverageEntry {
            filled: filled.len(),
            visited: seen.len(),
            overlap,
            total,
            total_overlap,
        };
        debug!(entity = %entity.key, filled = entry.filled, visited = entry.visited, "coverage");
        coverage.insert(entity.key.clone(), entry);
    }
    Ok(coverage)
}

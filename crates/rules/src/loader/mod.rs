//! Ruleset discovery and rule-file loading.
//!
//! A search root holds one directory per ruleset; a ruleset directory holds
//! `*.rhai` rule files and an optional `README.md` describing the ruleset.
//! Roots are searched in order: explicit extra directories, the bundled
//! root, then every entry of `RULESET_PATH`.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ids_core::config::RulesConfig;
use tracing::{debug, info, warn};

use crate::error::ConfigurationError;
use crate::fuzzy::ruleset_hint;
use crate::options::ValidateOptions;
use crate::rule::Rule;
use crate::script::{compile_module, EngineLimits};

/// Name of the ruleset that is loaded unless disabled.
pub const GENERIC_RULESET: &str = "generic";

/// Ruleset docstring file; never treated as a rule source.
pub const RULESET_README: &str = "README.md";

const RULE_EXTENSION: &str = "rhai";

/// Outcome of loading a single rule file.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// The file compiled; `rules` may be zero.
    Loaded { rules: usize },
    /// Not a rule file.
    Skipped { reason: String },
    /// Syntax error or invalid registration.
    Failed { error: String },
}

/// A ruleset directory found under a search root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RulesetDir {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct LoadedRules {
    /// In registry order: rulesets by name, files by path, registrations in
    /// source order.
    pub rules: Vec<Arc<Rule>>,
    pub results: Vec<LoadResult>,
}

pub struct RulesetLoader<'a> {
    options: &'a ValidateOptions,
    config: &'a RulesConfig,
    limits: EngineLimits,
}

impl<'a> RulesetLoader<'a> {
    pub fn new(options: &'a ValidateOptions, config: &'a RulesConfig) -> Self {
        Self {
            options,
            config,
            limits: EngineLimits::from_config(config),
        }
    }

    /// Root of the rulesets shipped with this crate.
    pub fn bundled_root(config: &RulesConfig) -> PathBuf {
        config
            .bundled_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/rulesets")))
    }

    pub fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.options.extra_rule_dirs.clone();
        if self.options.use_bundled_rulesets {
            roots.push(Self::bundled_root(self.config));
        }
        roots.extend(self.config.ruleset_path.iter().cloned());
        roots
    }

    /// Every ruleset directory under every root, deduplicated and ordered
    /// by name. Hidden directories are ignored.
    pub fn discover(&self) -> Result<Vec<RulesetDir>, ConfigurationError> {
        let mut found = BTreeSet::new();
        for root in self.search_roots() {
            if !root.is_dir() {
                return Err(ConfigurationError::InvalidRulesetPath(root));
            }
            for entry in fs::read_dir(&root)? {
                let path = entry?.path();
                if !path.is_dir() {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                let path = path.canonicalize().unwrap_or(path);
                found.insert(RulesetDir { name, path });
            }
        }
        debug!(rulesets = found.len(), "rulesets discovered");
        Ok(found.into_iter().collect())
    }

    /// Requested rulesets plus `generic` when enabled. Unknown explicit
    /// names are fatal; a missing `generic` is not.
    pub fn select(&self) -> Result<Vec<RulesetDir>, ConfigurationError> {
        let available = self.discover()?;
        let names: BTreeSet<&str> = available.iter().map(|d| d.name.as_str()).collect();
        for requested in &self.options.rulesets {
            if !names.contains(requested.as_str()) {
                let candidates: Vec<&str> = names.iter().copied().collect();
                return Err(ConfigurationError::InvalidRulesetName {
                    name: requested.clone(),
                    hint: ruleset_hint(requested, &candidates),
                });
            }
        }

        let wanted = |name: &str| {
            (self.options.apply_generic && name == GENERIC_RULESET) || self.options.rulesets.iter().any(|r| r == name)
        };
        Ok(available.into_iter().filter(|d| wanted(&d.name)).collect())
    }

    /// Candidate files of one ruleset directory, ordered by path.
    pub fn rule_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigurationError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with('.') || name == RULESET_README {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    /// Compile every rule file of the selected rulesets and apply the rule
    /// filter.
    pub fn load(&self) -> Result<LoadedRules, ConfigurationError> {
        let mut loaded = LoadedRules::default();
        for ruleset in self.select()? {
            info!(ruleset = %ruleset.name, path = %ruleset.path.display(), "loading ruleset");
            for path in Self::rule_files(&ruleset.path)? {
                let status = self.load_file(&ruleset.name, &path, &mut loaded.rules)?;
                loaded.results.push(LoadResult { path, status });
            }
        }

        let filter = &self.options.rule_filter;
        if !filter.is_empty() {
            let before = loaded.rules.len();
            loaded.rules.retain(|rule| filter.is_selected(rule));
            debug!(before, after = loaded.rules.len(), "rule filter applied");
            if loaded.rules.is_empty() {
                warn!(filter = ?filter, "rule filter matched no rules");
            }
        }
        info!(rules = loaded.rules.len(), "rules loaded");
        Ok(loaded)
    }

    fn load_file(&self, ruleset: &str, path: &Path, rules: &mut Vec<Arc<Rule>>) -> Result<LoadStatus, ConfigurationError> {
        let is_rule_file = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == RULE_EXTENSION);
        if !is_rule_file {
            warn!(path = %path.display(), "ignoring file without .rhai extension");
            return Ok(LoadStatus::Skipped {
                reason: "not a .rhai file".to_string(),
            });
        }

        let source = fs::read_to_string(path).map_err(|source| ConfigurationError::UnreadableRuleFile {
            path: path.to_path_buf(),
            source,
        })?;

        match compile_module(&source, path, ruleset, self.limits) {
            Ok(compiled) => {
                if compiled.is_empty() {
                    warn!(path = %path.display(), "rule file registers no rules");
                }
                let count = compiled.len();
                rules.extend(compiled.into_iter().map(Arc::new));
                debug!(path = %path.display(), rules = count, "loaded rule file");
                Ok(LoadStatus::Loaded { rules: count })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping invalid rule file");
                Ok(LoadStatus::Failed { error: e.to_string() })
            }
        }
    }
}

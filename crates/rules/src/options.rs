//! Run options for validation and explore.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rule::Rule;

/// Substring filter on rules. Empty lists impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFilter {
    /// Every entry must appear in the rule name.
    #[serde(default)]
    pub name: Vec<String>,
    /// Every entry must appear in at least one of the rule's entity patterns.
    #[serde(default)]
    pub entity: Vec<String>,
}

impl RuleFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.entity.is_empty()
    }

    pub fn is_selected(&self, rule: &Rule) -> bool {
        let name_ok = self.name.iter().all(|needle| rule.name.contains(needle.as_str()));
        let entity_ok = self.entity.iter().all(|needle| {
            rule.selectors
                .iter()
                .any(|s| s.pattern.as_str().contains(needle.as_str()))
        });
        name_ok && entity_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateOptions {
    /// Ruleset names to load in addition to `generic`.
    pub rulesets: Vec<String>,
    /// Load the `generic` ruleset.
    pub apply_generic: bool,
    /// Search the bundled ruleset root.
    pub use_bundled_rulesets: bool,
    /// Extra ruleset roots, searched before the bundled root.
    pub extra_rule_dirs: Vec<PathBuf>,
    pub rule_filter: RuleFilter,
    /// Call the failure hook after every failing check.
    pub break_on_failure: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            rulesets: Vec::new(),
            apply_generic: true,
            use_bundled_rulesets: true,
            extra_rule_dirs: Vec::new(),
            rule_filter: RuleFilter::default(),
            break_on_failure: false,
        }
    }
}

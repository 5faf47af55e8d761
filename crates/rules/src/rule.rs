//! Registered rules and their entity selectors.

use std::fmt;
use std::sync::Arc;

use ids_core::EntityKey;

use crate::error::RuleDefinitionError;
use crate::script::RuleScript;
use crate::version::VersionSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPattern {
    /// `*`: any entity name.
    Any,
    Named(String),
}

impl EntityPattern {
    pub fn accepts(&self, name: &str) -> bool {
        match self {
            EntityPattern::Any => true,
            EntityPattern::Named(n) => n == name,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityPattern::Any => "*",
            EntityPattern::Named(n) => n,
        }
    }
}

/// One rule parameter: an entity pattern with an optional pinned occurrence.
/// Written `name`, `*`, `name:occurrence` or `*:occurrence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySelector {
    pub pattern: EntityPattern,
    pub occurrence: Option<u32>,
}

impl EntitySelector {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (name, occurrence) = match raw.split_once(':') {
            Some((name, occ)) => {
                let occ = occ
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("occurrence '{occ}' is not a non-negative integer"))?;
                (name.trim(), Some(occ))
            }
            None => (raw, None),
        };
        let pattern = match name {
            "" => return Err("entity name is empty".to_string()),
            "*" => EntityPattern::Any,
            name if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                EntityPattern::Named(name.to_string())
            }
            name => return Err(format!("'{name}' is not a valid entity name")),
        };
        Ok(Self { pattern, occurrence })
    }

    pub fn accepts(&self, key: &EntityKey) -> bool {
        self.pattern.accepts(&key.name) && self.occurrence.map_or(true, |occ| occ == key.occurrence)
    }
}

impl fmt::Display for EntitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.occurrence {
            Some(occ) => write!(f, "{}:{occ}", self.pattern.as_str()),
            None => write!(f, "{}", self.pattern.as_str()),
        }
    }
}

/// A validation rule: one script function bound to one or more entities.
///
/// Only the first selector may be a wildcard or unpinned; every further
/// selector names a literal entity with a pinned occurrence, so it can be
/// fetched directly from the store.
#[derive(Debug, Clone)]
pub struct Rule {
    /// `ruleset/file/function`.
    pub name: String,
    pub ruleset: String,
    pub function: String,
    pub selectors: Vec<EntitySelector>,
    pub version: VersionSpec,
    pub doc: String,
    pub script: Arc<RuleScript>,
}

impl Rule {
    pub fn new(
        script: Arc<RuleScript>,
        function: &str,
        patterns: &[String],
        version: &str,
        doc: String,
    ) -> Result<Self, RuleDefinitionError> {
        if patterns.is_empty() {
            return Err(RuleDefinitionError::NoPatterns {
                function: function.to_string(),
            });
        }

        let mut selectors = Vec::with_capacity(patterns.len());
        for (i, raw) in patterns.iter().enumerate() {
            let invalid = |reason: String| RuleDefinitionError::InvalidPattern {
                function: function.to_string(),
                pattern: raw.clone(),
                reason,
            };
            let selector = EntitySelector::parse(raw).map_err(invalid)?;
            if i > 0 && (selector.pattern == EntityPattern::Any || selector.occurrence.is_none()) {
                return Err(invalid(
                    "only the first entity may be a wildcard or unpinned; write 'name:occurrence'".to_string(),
                ));
            }
            selectors.push(selector);
        }

        let version = VersionSpec::parse(version).map_err(|e| RuleDefinitionError::InvalidVersion {
            function: function.to_string(),
            spec: version.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            name: format!("{}/{}/{function}", script.ruleset, script.file_name()),
            ruleset: script.ruleset.clone(),
            function: function.to_string(),
            selectors,
            version,
            doc,
            script,
        })
    }

    pub fn entity_patterns(&self) -> Vec<&str> {
        self.selectors.iter().map(|s| s.pattern.as_str()).collect()
    }

    pub fn occurrence_pins(&self) -> Vec<Option<u32>> {
        self.selectors.iter().map(|s| s.occurrence).collect()
    }

    pub fn arity(&self) -> usize {
        self.selectors.len()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selectors() {
        let s = EntitySelector::parse("core_profiles:1").unwrap();
        assert_eq!(s.pattern, EntityPattern::Named("core_profiles".into()));
        assert_eq!(s.occurrence, Some(1));
        assert_eq!(s.to_string(), "core_profiles:1");

        let s = EntitySelector::parse("*").unwrap();
        assert_eq!(s.pattern, EntityPattern::Any);
        assert!(s.accepts(&EntityKey::new("anything", 7)));

        let s = EntitySelector::parse("*:0").unwrap();
        assert!(s.accepts(&EntityKey::new("wall", 0)));
        assert!(!s.accepts(&EntityKey::new("wall", 1)));
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(EntitySelector::parse("").is_err());
        assert!(EntitySelector::parse("core_profiles:x").is_err());
        assert!(EntitySelector::parse("core_profiles:-1").is_err());
        assert!(EntitySelector::parse("core profiles").is_err());
    }
}

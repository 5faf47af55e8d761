//! Error types shared across the rule engine.

use std::path::PathBuf;

use ids_core::CoreError;

/// Problems with the requested rulesets or their files. Always fatal and
/// raised before any rule executes.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Ruleset root does not exist: {}", .0.display())]
    InvalidRulesetPath(PathBuf),

    #[error("Ruleset '{name}' not found. {hint}")]
    InvalidRulesetName { name: String, hint: String },

    #[error("Cannot read rule file {}: {source}", path.display())]
    UnreadableRuleFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rule file that compiles but registers an invalid rule, or does not
/// compile at all. The file is skipped with a warning.
#[derive(Debug, thiserror::Error)]
pub enum RuleDefinitionError {
    #[error("syntax error: {0}")]
    Parse(String),

    #[error("module-level code failed: {0}")]
    Registration(String),

    #[error("rule '{function}': no function with {arity} parameter(s) named '{function}'")]
    UnknownFunction { function: String, arity: usize },

    #[error("rule '{function}': at least one entity pattern is required")]
    NoPatterns { function: String },

    #[error("rule '{function}': invalid entity pattern '{pattern}': {reason}")]
    InvalidPattern {
        function: String,
        pattern: String,
        reason: String,
    },

    #[error("rule '{function}': invalid version specifier '{spec}': {reason}")]
    InvalidVersion {
        function: String,
        spec: String,
        reason: String,
    },

    #[error("rule '{function}' registered more than once")]
    Duplicate { function: String },
}

/// Fatal errors that end a validation run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Store error: {0}")]
    Store(#[from] CoreError),
}

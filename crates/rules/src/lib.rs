//! Rule engine for validating entity stores.
//!
//! This crate provides:
//! - Ruleset discovery and Rhai rule-file loading with `validator(...)` registration
//! - Observing entity handles that record every leaf a check reads
//! - Rule-to-entity matching with version specifiers
//! - Sequential task execution with `check(...)` result capture and a failure hook
//! - Result collection and field coverage

pub mod error;
pub mod executor;
pub mod explore;
mod fuzzy;
pub mod loader;
pub mod options;
pub mod proxy;
pub mod results;
pub mod rule;
pub mod scheduler;
pub mod script;
pub mod validate;
pub mod version;

pub use error::{ConfigurationError, EngineError, RuleDefinitionError};
pub use executor::{FailureEvent, FailureHook, HookAction, LocalVariable};
pub use explore::{explore, ModuleDocs, RuleDocs, RulesetDocs};
pub use options::{RuleFilter, ValidateOptions};
pub use results::{AssertionResult, CoverageEntry, CoverageRatio, ResultCollection};
pub use rule::Rule;
pub use validate::{validate, validate_store};

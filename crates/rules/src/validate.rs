//! One validation run: load rules, match them to the store's entities,
//! execute and compute coverage.

use std::sync::Arc;

use ids_core::{Config, DataStore, StoreSession};
use tracing::info;

use crate::error::EngineError;
use crate::executor::{FailureHook, RuleExecutor};
use crate::loader::RulesetLoader;
use crate::options::ValidateOptions;
use crate::results::{compute_coverage, ResultCollection, ResultCollector};
use crate::scheduler::{EntityCatalog, TaskScheduler};
use crate::script::EngineLimits;

/// Validate the store at `uri`. The store is opened before anything else
/// and closed when the run ends, whether or not it succeeded.
///
/// `hook` is only installed when `options.break_on_failure` is set.
pub fn validate(
    uri: &str,
    options: &ValidateOptions,
    config: &Config,
    hook: Option<Arc<dyn FailureHook>>,
) -> Result<ResultCollection, EngineError> {
    let session = StoreSession::open(uri)?;
    let outcome = validate_store(session.store(), options, config, hook);
    let closed = session.close();
    let collection = outcome?;
    closed?;
    Ok(collection)
}

/// Validate an already opened store.
pub fn validate_store(
    store: &dyn DataStore,
    options: &ValidateOptions,
    config: &Config,
    hook: Option<Arc<dyn FailureHook>>,
) -> Result<ResultCollection, EngineError> {
    info!(uri = %store.uri(), rulesets = ?options.rulesets, "starting validation");

    let loaded = RulesetLoader::new(options, &config.rules).load()?;
    let catalog = EntityCatalog::from_store(store)?;
    let tasks = TaskScheduler::new(store).schedule(&loaded.rules, &catalog)?;

    let mut executor = RuleExecutor::new(EngineLimits::from_config(&config.rules));
    if let (true, Some(hook)) = (options.break_on_failure, hook) {
        executor = executor.with_hook(hook);
    }
    let collector = ResultCollector::new();
    executor.run_all(&tasks, &collector);

    let mut collection = collector.finish(store.uri(), Default::default());
    let bound = tasks.iter().flat_map(|t| t.entities.iter());
    collection.coverage = compute_coverage(&collection.results, bound, store)?;

    info!(
        uri = %collection.uri,
        passed = collection.passed(),
        failed = collection.failed(),
        errors = collection.errors(),
        "validation finished"
    );
    Ok(collection)
}

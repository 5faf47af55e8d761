use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use ids_core::EntityKey;
use tracing::debug;

use crate::executor::{FailureEvent, FailureHook, HookAction};
use crate::proxy::{FieldRef, Observed, ProxyError};
use crate::rule::Rule;
use crate::script::ScopeSnapshot;

use super::{AssertionResult, CoverageEntry, ResultCollection, RuleFault, SourceLocation};

/// Append-only sink for the results of one run.
#[derive(Debug, Clone, Default)]
pub struct ResultCollector {
    results: Arc<Mutex<Vec<AssertionResult>>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recording context for one task.
    pub fn context(
        &self,
        rule: Arc<Rule>,
        bindings: Vec<EntityKey>,
        hook: Option<Arc<dyn FailureHook>>,
    ) -> RecordingContext {
        RecordingContext {
            rule,
            bindings,
            sink: self.clone(),
            hook,
            scope: ScopeSnapshot::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<AssertionResult> {
        self.lock().clone()
    }

    pub fn finish(self, uri: impl Into<String>, coverage: BTreeMap<EntityKey, CoverageEntry>) -> ResultCollection {
        let results = std::mem::take(&mut *self.lock());
        ResultCollection {
            uri: uri.into(),
            results,
            coverage,
        }
    }

    fn push(&self, result: AssertionResult) {
        self.lock().push(result);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AssertionResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything a check needs to record a result for the running task.
/// Created per task and passed explicitly into the script call.
#[derive(Clone)]
pub struct RecordingContext {
    rule: Arc<Rule>,
    bindings: Vec<EntityKey>,
    sink: ResultCollector,
    hook: Option<Arc<dyn FailureHook>>,
    scope: ScopeSnapshot,
}

impl std::fmt::Debug for RecordingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingContext")
            .field("rule", &self.rule.name)
            .field("bindings", &self.bindings)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl RecordingContext {
    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn bindings(&self) -> &[EntityKey] {
        &self.bindings
    }

    /// Local variables of the running rule. Only filled while a failure
    /// hook is installed.
    pub fn scope(&self) -> &ScopeSnapshot {
        &self.scope
    }

    /// Source location for a line of the rule file.
    pub fn location(&self, line: Option<usize>) -> SourceLocation {
        SourceLocation {
            file: self.rule.script.path.clone(),
            line,
            function: self.rule.function.clone(),
            snippet: line.and_then(|l| self.rule.script.line(l)).unwrap_or_default().to_string(),
        }
    }

    /// Record one check. The test's truthiness decides success and its
    /// provenance becomes the touched set.
    pub fn record(
        &self,
        test: &Observed,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Result<HookAction, ProxyError> {
        let success = test.truthy()?;
        let result = AssertionResult {
            success,
            message: message.into(),
            rule: Arc::clone(&self.rule),
            bindings: self.bindings.clone(),
            location,
            touched: self.partition(&test.provenance()),
            error: None,
        };
        debug!(rule = %self.rule.name, success, line = ?result.location.line, "check recorded");
        self.sink.push(result.clone());

        if success {
            return Ok(HookAction::Continue);
        }
        Ok(self.notify(FailureEvent::Assertion(&result)))
    }

    /// Record an uncaught rule error with everything read so far.
    pub fn add_error(&self, fault: RuleFault, touched: &BTreeSet<FieldRef>) -> HookAction {
        let line = fault.innermost().and_then(|f| f.line);
        let mut location = self.location(line);
        if let Some(frame) = fault.innermost() {
            location.function = frame.function.clone();
        }
        let result = AssertionResult {
            success: false,
            message: fault.message.clone(),
            rule: Arc::clone(&self.rule),
            bindings: self.bindings.clone(),
            location,
            touched: self.partition(touched),
            error: Some(fault),
        };
        self.sink.push(result.clone());
        self.notify(FailureEvent::Fault(&result))
    }

    fn notify(&self, event: FailureEvent<'_>) -> HookAction {
        match &self.hook {
            Some(hook) => hook.on_failure(event, &self.scope.render()),
            None => HookAction::Continue,
        }
    }

    /// Split leaf references by bound entity, dropping anything unbound.
    fn partition(&self, fields: &BTreeSet<FieldRef>) -> BTreeMap<EntityKey, BTreeSet<String>> {
        let mut touched: BTreeMap<EntityKey, BTreeSet<String>> = BTreeMap::new();
        for field in fields {
            if self.bindings.contains(&field.entity) {
                touched
                    .entry(field.entity.clone())
                    .or_default()
                    .insert(field.path.clone());
            }
        }
        touched
    }
}

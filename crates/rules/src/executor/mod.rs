//! Runs scheduled tasks one at a time and records their results.
//!
//! Each task moves through `pending → bound → running → completed | errored`.
//! Binding wraps every entity root in an observing handle with its own touch
//! log and creates the task's [`RecordingContext`](crate::results::RecordingContext).
//! An uncaught error from the rule body ends only that task: it becomes one
//! failing result and the run continues with the next task.

mod fault;
mod hook;


pub use self::hook::{FailureEvent, FailureHook, HookAction, LocalVariable};

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::proxy::{Observed, TouchLog};
use crate::results::ResultCollector;
use crate::scheduler::ExecutionTask;
use crate::script::{is_skip_signal, observed_argument, EngineLimits, ScriptEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Bound,
    Running,
    Completed,
    Errored,
}

/// Outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    pub state: TaskState,
    /// The failure hook asked to skip the rest of the task.
    pub skipped: bool,
}

/// Counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub tasks: usize,
    pub completed: usize,
    pub errored: usize,
    pub skipped: usize,
}

pub struct RuleExecutor {
    engine: ScriptEngine,
    limits: EngineLimits,
    hook: Option<Arc<dyn FailureHook>>,
}

impl RuleExecutor {
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            engine: ScriptEngine::new(limits),
            limits,
            hook: None,
        }
    }

    /// Install a hook called after every failing result. The engine then
    /// steps through rule bodies to keep their local variables at hand.
    pub fn with_hook(mut self, hook: Arc<dyn FailureHook>) -> Self {
        self.engine = ScriptEngine::with_scope_tracking(self.limits);
        self.hook = Some(hook);
        self
    }

    pub fn run(&self, task: &ExecutionTask, collector: &ResultCollector) -> TaskReport {
        let rule = &task.rule;
        let mut state = TaskState::Pending;
        debug!(rule = %rule.name, bindings = ?task.bindings(), ?state, "task");

        let logs: Vec<TouchLog> = task.entities.iter().map(|_| TouchLog::new()).collect();
        let args = task
            .entities
            .iter()
            .zip(&logs)
            .map(|(entity, log)| observed_argument(Observed::root(entity, log.clone())))
            .collect();
        let context = collector.context(Arc::clone(rule), task.bindings(), self.hook.clone());
        state = TaskState::Bound;
        debug!(rule = %rule.name, ?state, "task");

        state = TaskState::Running;
        debug!(rule = %rule.name, ?state, "task");
        let outcome = self.engine.call_rule(rule, args, context.clone());

        let report = match outcome {
            Ok(()) => TaskReport {
                state: TaskState::Completed,
                skipped: false,
            },
            Err(err) if is_skip_signal(&err) => {
                info!(rule = %rule.name, "task skipped from failure hook");
                TaskReport {
                    state: TaskState::Completed,
                    skipped: true,
                }
            }
            Err(err) => {
                let fault = fault::rule_fault(&err, &rule.script, &rule.function);
                let line = fault.innermost().and_then(|f| f.line);
                warn!(rule = %rule.name, line = ?line, error = %fault.message, "rule raised an error");

                let touched: BTreeSet<_> = logs.iter().flat_map(|log| log.snapshot()).collect();
                let action = context.add_error(fault, &touched);
                TaskReport {
                    state: TaskState::Errored,
                    skipped: action == HookAction::SkipTask,
                }
            }
        };
        debug!(rule = %rule.name, state = ?report.state, "task");
        report
    }

    /// Run every task in order. A failing task never stops the run.
    pub fn run_all(&self, tasks: &[ExecutionTask], collector: &ResultCollector) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();
        for task in tasks {
            let report = self.run(task, collector);
            summary.tasks += 1;
            match report.state {
                TaskState::Errored => summary.errored += 1,
                _ => summary.completed += 1,
            }
            if report.skipped {
                summary.skipped += 1;
            }
        }
        info!(
            tasks = summary.tasks,
            completed = summary.completed,
            errored = summary.errored,
            results = collector.len(),
            "execution finished"
        );
        summary
    }
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

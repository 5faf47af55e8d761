use crate::results::AssertionResult;

/// What the engine does after the failure hook returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Keep running the rule body.
    Continue,
    /// Abandon the current task and move to the next one.
    SkipTask,
}

/// A freshly recorded failure handed to the hook.
#[derive(Debug, Clone, Copy)]
pub enum FailureEvent<'a> {
    /// A check whose condition was false.
    Assertion(&'a AssertionResult),
    /// An uncaught error from the rule body. The task has already ended.
    Fault(&'a AssertionResult),
}

impl<'a> FailureEvent<'a> {
    pub fn result(&self) -> &'a AssertionResult {
        match self {
            FailureEvent::Assertion(r) | FailureEvent::Fault(r) => r,
        }
    }
}

/// A variable in the rule's scope at the failing statement, rendered for
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub value: String,
}

/// Called synchronously after every failing result when break-on-failure
/// is enabled. `locals` is the scope of the innermost running function.
pub trait FailureHook: Send + Sync {
    fn on_failure(&self, event: FailureEvent<'_>, locals: &[LocalVariable]) -> HookAction;
}

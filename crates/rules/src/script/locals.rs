//! Snapshots of a rule's local variables for break-on-failure sessions.

use std::sync::{Arc, Mutex, PoisonError};

use rhai::debugger::{DebuggerCommand, DebuggerEvent};
use rhai::{Dynamic, Engine, Scope};

use crate::executor::LocalVariable;
use crate::proxy::Observed;
use crate::results::RecordingContext;

const MAX_VALUE_LEN: usize = 120;

/// The variables in scope at the last statement the rule started.
/// Shared by every clone of a task's recording context.
#[derive(Debug, Clone, Default)]
pub struct ScopeSnapshot(Arc<Mutex<Vec<(String, Dynamic)>>>);

impl ScopeSnapshot {
    pub fn capture(&self, scope: &Scope) {
        let vars = scope.iter().map(|(name, _, value)| (name.to_string(), value)).collect();
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = vars;
    }

    /// Render the snapshot without reading through observed handles, so
    /// showing it never adds to a touch log.
    pub fn render(&self) -> Vec<LocalVariable> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, value)| LocalVariable {
                name: name.clone(),
                value: render_value(value),
            })
            .collect()
    }
}

fn render_value(value: &Dynamic) -> String {
    let text = match value.clone().try_cast::<Observed>() {
        Some(observed) => observed.to_string(),
        None if value.is_string() => format!("{:?}", value.to_string()),
        None => value.to_string(),
    };
    if text.chars().count() > MAX_VALUE_LEN {
        let cut: String = text.chars().take(MAX_VALUE_LEN).collect();
        format!("{cut}...")
    } else {
        text
    }
}

/// Step through rule bodies and keep the task's scope snapshot current.
#[allow(deprecated)]
pub(super) fn register_scope_tracking(engine: &mut Engine) {
    engine.register_debugger(
        |_, debugger| debugger,
        |context, event, _node, _source, _pos| {
            // `End` fires after the call has rewound its scope.
            if !matches!(event, DebuggerEvent::End) {
                if let Some(recording) = context.tag().read_lock::<RecordingContext>() {
                    recording.scope().capture(context.scope());
                }
            }
            Ok(DebuggerCommand::StepInto)
        },
    );
}

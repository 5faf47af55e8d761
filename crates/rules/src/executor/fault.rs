//! Turn a script evaluation error into a [`RuleFault`].

use rhai::EvalAltResult;

use crate::results::{RuleFault, StackFrame};
use crate::script::RuleScript;

/// Build the trimmed stack of a failed rule call.
///
/// Rhai strips the wrapper for the called function itself, so the rule
/// function always contributes the first frame, at the position of the
/// outermost error. Each nested function-call error then adds one frame
/// whose line is where the next level failed. The innermost error supplies
/// the message.
pub(crate) fn rule_fault(err: &EvalAltResult, script: &RuleScript, function: &str) -> RuleFault {
    let mut frames = vec![frame(script, function, err.position().line())];
    let mut current = err;
    while let EvalAltResult::ErrorInFunctionCall(name, _, inner, _) = current {
        frames.push(frame(script, name, inner.position().line()));
        current = inner.as_ref();
    }
    RuleFault {
        message: without_position(&current.to_string()),
        frames,
    }
}

fn frame(script: &RuleScript, function: &str, line: Option<usize>) -> StackFrame {
    StackFrame {
        function: function.to_string(),
        line,
        snippet: line.and_then(|l| script.line(l)).unwrap_or_default().to_string(),
    }
}

/// Drop the trailing ` (line N, position M)` Rhai appends to messages.
fn without_position(message: &str) -> String {
    match message.rfind(" (line ") {
        Some(i) if message.ends_with(')') => message[..i].to_string(),
        _ => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_suffix_is_removed() {
        assert_eq!(without_position("Runtime error: boom (line 3, position 5)"), "Runtime error: boom");
        assert_eq!(without_position("Runtime error: boom"), "Runtime error: boom");
    }
}

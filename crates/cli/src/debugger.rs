//! Interactive break-on-failure hook for `validate --debug`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use ids_rules::{FailureEvent, FailureHook, HookAction, LocalVariable};
use tracing::warn;

use crate::terminal::Terminal;

const HELP: &str = "  c, continue   keep running this rule (default)\n  \
                    s, skip       abandon the current task\n  \
                    r, run        stop breaking and finish the run\n  \
                    w, where      show the failure again\n  \
                    l, list       show the source around the failing line\n  \
                    v, vars       show the rule's local variables\n  \
                    h, help       this text\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Continue,
    Skip,
    Run,
    Where,
    List,
    Vars,
    Help,
}

fn parse_command(input: &str) -> Option<Command> {
    match input.trim().to_lowercase().as_str() {
        "" | "c" | "continue" => Some(Command::Continue),
        "s" | "skip" => Some(Command::Skip),
        "r" | "run" => Some(Command::Run),
        "w" | "where" => Some(Command::Where),
        "l" | "list" => Some(Command::List),
        "v" | "vars" => Some(Command::Vars),
        "h" | "help" | "?" => Some(Command::Help),
        _ => None,
    }
}

const CONTEXT_LINES: usize = 3;

/// Numbered source lines around `line`, the line itself marked with `>`.
fn source_context(source: &str, line: usize, radius: usize) -> String {
    let first = line.saturating_sub(radius).max(1);
    source
        .lines()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .skip(first - 1)
        .take_while(|(n, _)| *n <= line + radius)
        .map(|(n, text)| {
            let marker = if n == line { ">" } else { " " };
            format!("{marker}{n:>5} | {text}\n")
        })
        .collect()
}

fn format_locals(locals: &[LocalVariable]) -> String {
    if locals.is_empty() {
        return "  (no local variables)".to_string();
    }
    let width = locals.iter().map(|v| v.name.len()).max().unwrap_or(0);
    locals
        .iter()
        .map(|v| format!("  {:<width$} = {}", v.name, v.value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_context(file: &Path, line: Option<usize>) -> Option<String> {
    let source = std::fs::read_to_string(file).ok()?;
    Some(source_context(&source, line?, CONTEXT_LINES))
}

/// Stops at every failing result, shows it, and asks what to do next.
pub struct Debugger {
    terminal: Terminal,
    detached: AtomicBool,
}

impl Debugger {
    pub fn new() -> Self {
        Self {
            terminal: Terminal::new(),
            detached: AtomicBool::new(false),
        }
    }

    fn list(&self, result: &ids_rules::AssertionResult) -> anyhow::Result<()> {
        match read_context(&result.location.file, result.location.line) {
            Some(context) => self.terminal.print_info(context.trim_end()),
            None => self.terminal.print_info("  (source not available)"),
        }
    }

    fn session(&self, event: FailureEvent<'_>, locals: &[LocalVariable]) -> anyhow::Result<HookAction> {
        let result = event.result();
        let kind = match event {
            FailureEvent::Assertion(_) => "check failed",
            FailureEvent::Fault(_) => "rule error",
        };
        self.terminal.print_info(&format!("\n-- break: {kind} --"))?;
        self.terminal.print_result(result)?;
        self.list(result)?;
        self.terminal.print_info(&format_locals(locals))?;

        loop {
            let Some(input) = self.terminal.prompt("(debug) [c/s/r/w/l/v/h] ")? else {
                self.detached.store(true, Ordering::SeqCst);
                return Ok(HookAction::Continue);
            };
            match parse_command(&input) {
                Some(Command::Continue) => return Ok(HookAction::Continue),
                Some(Command::Skip) => return Ok(HookAction::SkipTask),
                Some(Command::Run) => {
                    self.detached.store(true, Ordering::SeqCst);
                    return Ok(HookAction::Continue);
                }
                Some(Command::Where) => self.terminal.print_result(result)?,
                Some(Command::List) => self.list(result)?,
                Some(Command::Vars) => self.terminal.print_info(&format_locals(locals))?,
                Some(Command::Help) => self.terminal.print_info(HELP)?,
                None => self.terminal.print_info(&format!("unknown command '{input}', try 'h'"))?,
            }
        }
    }
}

impl FailureHook for Debugger {
    fn on_failure(&self, event: FailureEvent<'_>, locals: &[LocalVariable]) -> HookAction {
        if self.detached.load(Ordering::SeqCst) {
            return HookAction::Continue;
        }
        match self.session(event, locals) {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "debugger terminal failed, continuing without it");
                self.detached.store(true, Ordering::SeqCst);
                HookAction::Continue
            }
        }
    }
}

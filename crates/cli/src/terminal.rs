use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use ids_report::WrittenReports;
use ids_rules::{AssertionResult, ResultCollection, RulesetDocs};
use std::io::{self, Write};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const RULESET: Color = Color::Magenta;
    const FILE: Color = Color::Cyan;
    const RULE: Color = Color::Yellow;
    const PASS: Color = Color::Green;
    const FAIL: Color = Color::Red;
    const PROMPT: Color = Color::Green;
    const DIM: Color = Color::DarkGrey;
}

/// Docstring text to print at `level`: nothing, the first line, or all of it.
pub fn docstring_text(doc: &str, level: u8) -> Option<String> {
    match level {
        0 => None,
        1 => doc.lines().find(|l| !l.trim().is_empty()).map(|l| l.trim().to_string()),
        _ => Some(doc.trim().to_string()).filter(|d| !d.is_empty()),
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|l| format!("{prefix}{l}\n"))
        .collect()
}

/// Terminal output for both subcommands and the debugger.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Print explored rulesets as a tree.
    pub fn print_explore(&self, rulesets: &[RulesetDocs], docstring_level: u8) -> Result<()> {
        let mut stdout = io::stdout();
        if rulesets.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No rules found.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        for ruleset in rulesets {
            execute!(
                stdout,
                SetForegroundColor(Colors::RULESET),
                Print(format!("{}", ruleset.name)),
                SetForegroundColor(Colors::DIM),
                Print(format!("  ({})\n", ruleset.path.display())),
                ResetColor,
            )?;
            if let Some(doc) = docstring_text(&ruleset.doc, docstring_level) {
                execute!(stdout, Print(indent(&doc, "  ")))?;
            }

            for file in &ruleset.files {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::FILE),
                    Print(format!("  └─ {}\n", file.file_name)),
                    ResetColor,
                )?;
                if let Some(doc) = docstring_text(&file.doc, docstring_level) {
                    execute!(stdout, Print(indent(&doc, "     ")))?;
                }

                for rule in &file.rules {
                    execute!(
                        stdout,
                        SetForegroundColor(Colors::RULE),
                        Print(format!("     • {}", rule.function)),
                        SetForegroundColor(Colors::DIM),
                        Print(format!("  [{}] version {}\n", rule.patterns.join(", "), rule.version)),
                        ResetColor,
                    )?;
                    if let Some(doc) = docstring_text(&rule.doc, docstring_level) {
                        execute!(stdout, Print(indent(&doc, "       ")))?;
                    }
                }
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print the counts and failing results of one run.
    pub fn print_summary(&self, collection: &ResultCollection) -> Result<()> {
        let mut stdout = io::stdout();
        let color = if collection.all_passed() { Colors::PASS } else { Colors::FAIL };
        execute!(
            stdout,
            Print(format!("{}: ", collection.uri)),
            SetForegroundColor(color),
            Print(format!(
                "{} checks, {} passed, {} failed ({} rule errors)\n",
                collection.results.len(),
                collection.passed(),
                collection.failed(),
                collection.errors()
            )),
            ResetColor,
        )?;

        for result in collection.results.iter().filter(|r| !r.success) {
            self.print_result(result)?;
        }

        for (key, entry) in &collection.coverage {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print(format!(
                    "  coverage {key}: {} of {} filled fields ({})\n",
                    entry.overlap,
                    entry.filled,
                    entry.ratio()
                )),
                ResetColor,
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print one failing result with its location and touched fields.
    pub fn print_result(&self, result: &AssertionResult) -> Result<()> {
        let mut stdout = io::stdout();
        let label = if result.is_error() { "ERROR" } else { "FAIL" };
        let bindings: Vec<String> = result.bindings.iter().map(ToString::to_string).collect();
        execute!(
            stdout,
            SetForegroundColor(Colors::FAIL),
            Print(format!("  {label} ")),
            ResetColor,
            Print(format!("{} [{}]", result.rule.name, bindings.join(", "))),
            Print(if result.message.is_empty() {
                "\n".to_string()
            } else {
                format!(": {}\n", result.message)
            }),
            SetForegroundColor(Colors::DIM),
        )?;
        match result.traceback() {
            Some(tb) => execute!(stdout, Print(indent(&tb, "    ")))?,
            None => execute!(
                stdout,
                Print(format!("    {}\n      {}\n", result.location, result.location.snippet))
            )?,
        }
        for (key, paths) in &result.touched {
            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            execute!(stdout, Print(format!("    touched {key}: {}\n", paths.join(", "))))?;
        }
        execute!(stdout, ResetColor)?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_reports(&self, reports: &WrittenReports) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "  reports: {}, {}, {}\n",
                reports.junit.display(),
                reports.summary.display(),
                reports.html.display()
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a prompt and read one trimmed line. `None` on end of input.
    pub fn prompt(&self, message: &str) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::PROMPT),
            Print(message),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::FAIL),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}

mod cli;
mod config;
mod debugger;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use ids_core::Config;
use ids_report::{report_stem, ReportWriter};
use ids_rules::FailureHook;

use crate::cli::{CliArgs, Command, ExploreArgs, ValidateArgs};
use crate::config::CliConfig;
use crate::debugger::Debugger;
use crate::terminal::Terminal;

/// Outcome of a command, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    /// Every check passed.
    Passed = 0,
    /// The run finished with failing checks or rule errors.
    Failed = 1,
    /// Nothing could be run (bad rulesets, unreadable store, ...).
    Aborted = 2,
}

fn main() -> ExitCode {
    ids_core::config::load_dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let terminal = Terminal::new();

    match run(args, &terminal) {
        Ok(outcome) => ExitCode::from(outcome as u8),
        Err(e) => {
            error!(error = %e, "command failed");
            terminal.print_error(&format!("{:#}", e)).ok();
            ExitCode::from(Outcome::Aborted as u8)
        }
    }
}

fn run(args: CliArgs, terminal: &Terminal) -> Result<Outcome> {
    let cli_config = CliConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let config = Config::from_env();
    config.log_summary();

    match args.command {
        Command::Validate(v) => validate(v, &cli_config, &config, terminal),
        Command::Explore(e) => explore(e, &cli_config, &config, terminal),
    }
}

fn validate(args: ValidateArgs, cli_config: &CliConfig, config: &Config, terminal: &Terminal) -> Result<Outcome> {
    let options = cli_config.validate_options(&args.rules, args.debug);
    let hook: Option<Arc<dyn FailureHook>> = if args.debug {
        Some(Arc::new(Debugger::new()))
    } else {
        None
    };
    let writer = if args.no_report {
        None
    } else {
        let dir = cli_config.report_dir(args.report_dir.as_deref(), &config.report.dir);
        Some(ReportWriter::new(dir).context("failed to prepare report templates")?)
    };

    let mut outcome = Outcome::Passed;
    for uri in &args.uris {
        info!(uri = %uri, "validating");
        let collection = match ids_rules::validate(uri, &options, config, hook.clone()) {
            Ok(collection) => collection,
            Err(e) => {
                error!(uri = %uri, error = %e, "validation could not run");
                terminal.print_error(&format!("{uri}: {e}"))?;
                outcome = outcome.max(Outcome::Aborted);
                continue;
            }
        };

        terminal.print_summary(&collection)?;
        if let Some(writer) = &writer {
            let reports = writer
                .write(&collection, &report_stem(uri))
                .with_context(|| format!("failed to write reports for {uri}"))?;
            terminal.print_reports(&reports)?;
        }
        if !collection.all_passed() {
            outcome = outcome.max(Outcome::Failed);
        }
    }
    Ok(outcome)
}

fn explore(args: ExploreArgs, cli_config: &CliConfig, config: &Config, terminal: &Terminal) -> Result<Outcome> {
    let options = cli_config.validate_options(&args.rules, false);
    let rulesets = ids_rules::explore(&options, &config.rules, args.show_empty).context("failed to explore rulesets")?;
    terminal.print_explore(&rulesets, args.docstring_level)?;
    Ok(Outcome::Passed)
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Validate entity stores against rulesets.
///
/// Rule files are Rhai scripts grouped in ruleset directories. The
/// `generic` ruleset is applied unless `--no-generic` is given.
#[derive(Parser, Debug)]
#[command(name = "ids-validator", version, about = "Validate entity stores against rulesets")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/ids-validator/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the selected rules against one or more stores.
    Validate(ValidateArgs),
    /// List the rulesets, rule files and rules that would be loaded.
    Explore(ExploreArgs),
}

/// Ruleset selection shared by both subcommands.
#[derive(Args, Debug, Default, Clone)]
pub struct RulesetArgs {
    /// Ruleset to load in addition to `generic` (repeatable)
    #[arg(short = 'r', long = "ruleset")]
    pub rulesets: Vec<String>,

    /// Do not load the `generic` ruleset
    #[arg(long)]
    pub no_generic: bool,

    /// Do not search the bundled rulesets
    #[arg(long)]
    pub no_bundled: bool,

    /// Extra directory holding ruleset directories (repeatable)
    #[arg(long = "extra-rule-dir")]
    pub extra_rule_dirs: Vec<PathBuf>,

    /// Only keep rules whose name contains this text (repeatable, all must match)
    #[arg(long = "filter-name")]
    pub filter_name: Vec<String>,

    /// Only keep rules with an entity pattern containing this text (repeatable)
    #[arg(long = "filter-entity")]
    pub filter_entity: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Store URIs: directory paths, file:// or json:// URIs
    #[arg(required = true)]
    pub uris: Vec<String>,

    #[command(flatten)]
    pub rules: RulesetArgs,

    /// Stop at every failing check and open the interactive debugger
    #[arg(long)]
    pub debug: bool,

    /// Directory for JUnit, text and HTML reports
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Do not write reports
    #[arg(long)]
    pub no_report: bool,
}

#[derive(Args, Debug)]
pub struct ExploreArgs {
    #[command(flatten)]
    pub rules: RulesetArgs,

    /// Also list rule files and rulesets without rules
    #[arg(long)]
    pub show_empty: bool,

    /// Docstrings to print: 0 none, 1 first line, 2 full
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub docstring_level: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_flags() {
        let args = CliArgs::try_parse_from([
            "ids-validator",
            "validate",
            "/data/a",
            "json://b",
            "-r",
            "iter",
            "--ruleset",
            "scenarios",
            "--no-generic",
            "--filter-name",
            "time",
            "--debug",
            "--no-report",
        ])
        .unwrap();
        let Command::Validate(v) = args.command else {
            panic!("expected validate");
        };
        assert_eq!(v.uris, vec!["/data/a", "json://b"]);
        assert_eq!(v.rules.rulesets, vec!["iter", "scenarios"]);
        assert!(v.rules.no_generic);
        assert!(!v.rules.no_bundled);
        assert_eq!(v.rules.filter_name, vec!["time"]);
        assert!(v.debug);
        assert!(v.no_report);
    }

    #[test]
    fn validate_requires_a_uri() {
        assert!(CliArgs::try_parse_from(["ids-validator", "validate"]).is_err());
    }

    #[test]
    fn explore_docstring_level_is_bounded() {
        let args = CliArgs::try_parse_from(["ids-validator", "explore", "--docstring-level", "2"]).unwrap();
        let Command::Explore(e) = args.command else {
            panic!("expected explore");
        };
        assert_eq!(e.docstring_level, 2);
        assert!(!e.show_empty);

        assert!(CliArgs::try_parse_from(["ids-validator", "explore", "--docstring-level", "3"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let args = CliArgs::try_parse_from(["ids-validator", "explore", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("/tmp/c.toml"));
    }
}

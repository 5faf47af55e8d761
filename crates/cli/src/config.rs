use anyhow::{Context, Result};
use ids_rules::{RuleFilter, ValidateOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::RulesetArgs;

/// CLI defaults loaded from a TOML file. Command-line flags add to or
/// override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Rulesets always loaded in addition to `generic`
    #[serde(default)]
    pub rulesets: Vec<String>,

    /// Extra ruleset roots searched before the bundled rulesets
    #[serde(default)]
    pub extra_rule_dirs: Vec<PathBuf>,

    /// Load the `generic` ruleset
    #[serde(default = "default_true")]
    pub apply_generic: bool,

    /// Search the bundled rulesets
    #[serde(default = "default_true")]
    pub use_bundled_rulesets: bool,

    /// Report directory (overrides `IDS_VALIDATOR_REPORT_DIR`)
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            rulesets: Vec::new(),
            extra_rule_dirs: Vec::new(),
            apply_generic: true,
            use_bundled_rulesets: true,
            report_dir: None,
        }
    }
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/ids-validator/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("ids-validator");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// A missing file yields the defaults; an explicitly named file must exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                let p = PathBuf::from(p);
                anyhow::ensure!(p.exists(), "config file not found: {}", p.display());
                p
            }
            None => match Self::default_config_path() {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, "No config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Merge the config defaults with command-line ruleset flags.
    pub fn validate_options(&self, args: &RulesetArgs, break_on_failure: bool) -> ValidateOptions {
        let mut rulesets = self.rulesets.clone();
        for name in &args.rulesets {
            if !rulesets.contains(name) {
                rulesets.push(name.clone());
            }
        }
        let mut extra_rule_dirs = args.extra_rule_dirs.clone();
        extra_rule_dirs.extend(self.extra_rule_dirs.iter().cloned());

        ValidateOptions {
            rulesets,
            apply_generic: self.apply_generic && !args.no_generic,
            use_bundled_rulesets: self.use_bundled_rulesets && !args.no_bundled,
            extra_rule_dirs,
            rule_filter: RuleFilter {
                name: args.filter_name.clone(),
                entity: args.filter_entity.clone(),
            },
            break_on_failure,
        }
    }

    /// Report directory: command line, then config file, then environment.
    pub fn report_dir(&self, cli_override: Option<&Path>, env_default: &Path) -> PathBuf {
        cli_override
            .or(self.report_dir.as_deref())
            .unwrap_or(env_default)
            .to_path_buf()
    }
}

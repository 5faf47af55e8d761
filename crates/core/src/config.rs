use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Environment variable holding extra ruleset roots, colon separated.
pub const RULESET_PATH_ENV: &str = "RULESET_PATH";

/// Default cap on the number of script operations a single rule may execute.
pub const DEFAULT_MAX_OPERATIONS: u64 = 5_000_000;

/// Split a colon-separated path list, dropping empty segments.
pub fn split_path_list(raw: &str) -> Vec<PathBuf> {
    raw.split(':')
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
    pub report: ReportConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `IDS_VALIDATOR_PROFILE`. When set (e.g. `CI`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("IDS_VALIDATOR_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
            report: ReportConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  rules:   env_roots={}, bundled={}, max_operations={}",
            self.rules.ruleset_path.len(),
            self.rules
                .bundled_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(built-in)".to_string()),
            self.rules.max_operations
        );
        tracing::info!("  report:  dir={}", self.report.dir.display());
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Extra ruleset roots from `RULESET_PATH`.
    pub ruleset_path: Vec<PathBuf>,
    /// Override for the bundled ruleset root.
    pub bundled_dir: Option<PathBuf>,
    /// Operation limit applied to every rule call.
    pub max_operations: u64,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            ruleset_path: profiled_env_opt(p, RULESET_PATH_ENV)
                .map(|raw| split_path_list(&raw))
                .unwrap_or_default(),
            bundled_dir: profiled_env_opt(p, "IDS_VALIDATOR_BUNDLED_RULESETS").map(PathBuf::from),
            max_operations: profiled_env_u64(p, "IDS_VALIDATOR_MAX_OPERATIONS", DEFAULT_MAX_OPERATIONS),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            ruleset_path: Vec::new(),
            bundled_dir: None,
            max_operations: DEFAULT_MAX_OPERATIONS,
        }
    }
}

// ── Reports ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub dir: PathBuf,
}

impl ReportConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dir: PathBuf::from(profiled_env_or(p, "IDS_VALIDATOR_REPORT_DIR", "validate_reports")),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("validate_reports"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_list_drops_empty_segments() {
        let paths = split_path_list("/a/rules::/b/rules:");
        assert_eq!(paths, vec![PathBuf::from("/a/rules"), PathBuf::from("/b/rules")]);
        assert!(split_path_list("").is_empty());
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        env::set_var("IDSCORETEST_IDS_VALIDATOR_REPORT_DIR", "/tmp/profiled");
        env::set_var("IDS_VALIDATOR_MAX_OPERATIONS", "1234");

        let config = Config::for_profile("idscoretest");
        assert_eq!(config.profile_label(), "IDSCORETEST");
        assert_eq!(config.report.dir, PathBuf::from("/tmp/profiled"));
        assert_eq!(config.rules.max_operations, 1234);

        env::remove_var("IDSCORETEST_IDS_VALIDATOR_REPORT_DIR");
        env::remove_var("IDS_VALIDATOR_MAX_OPERATIONS");
    }

    #[test]
    fn default_config_uses_builtin_values() {
        let config = Config::default();
        assert_eq!(config.profile_label(), "default");
        assert_eq!(config.rules.max_operations, DEFAULT_MAX_OPERATIONS);
        assert!(config.rules.ruleset_path.is_empty());
    }
}

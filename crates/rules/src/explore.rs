//! Documentation of the rules a set of options would load.

use std::fs;
use std::path::PathBuf;

use ids_core::config::RulesConfig;
use serde::Serialize;
use tracing::warn;

use crate::error::ConfigurationError;
use crate::loader::{RulesetLoader, RULESET_README};
use crate::options::ValidateOptions;
use crate::script::{compile_module, module_doc, EngineLimits};

const NO_RULESET_DOC: &str = "No ruleset docstring available. Add a README.md to the ruleset directory.";
const NO_MODULE_DOC: &str = "No module docstring available. Add `//!` lines at the top of the rule file.";
const NO_RULE_DOC: &str = "No function docstring available. Add `///` lines above the function.";

#[derive(Debug, Clone, Serialize)]
pub struct RulesetDocs {
    pub name: String,
    pub path: PathBuf,
    pub doc: String,
    pub files: Vec<ModuleDocs>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleDocs {
    pub path: PathBuf,
    pub file_name: String,
    pub doc: String,
    pub rules: Vec<RuleDocs>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleDocs {
    pub name: String,
    pub function: String,
    pub patterns: Vec<String>,
    pub version: String,
    pub doc: String,
}

/// Docstrings for every ruleset, rule file and rule selected by `options`,
/// after the rule filter. Files and rulesets without rules are left out
/// unless `show_empty` is set. Invalid rule files are skipped.
pub fn explore(
    options: &ValidateOptions,
    config: &RulesConfig,
    show_empty: bool,
) -> Result<Vec<RulesetDocs>, ConfigurationError> {
    let loader = RulesetLoader::new(options, config);
    let limits = EngineLimits::from_config(config);
    let mut out = Vec::new();

    for ruleset in loader.select()? {
        let doc = fs::read_to_string(ruleset.path.join(RULESET_README))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_RULESET_DOC.to_string());

        let mut files = Vec::new();
        for path in RulesetLoader::rule_files(&ruleset.path)? {
            if path.extension().and_then(|e| e.to_str()) != Some("rhai") {
                continue;
            }
            let source = fs::read_to_string(&path).map_err(|source| ConfigurationError::UnreadableRuleFile {
                path: path.clone(),
                source,
            })?;
            let rules = match compile_module(&source, &path, &ruleset.name, limits) {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping invalid rule file");
                    continue;
                }
            };
            let rules: Vec<RuleDocs> = rules
                .iter()
                .filter(|r| options.rule_filter.is_selected(r))
                .map(|r| RuleDocs {
                    name: r.name.clone(),
                    function: r.function.clone(),
                    patterns: r.selectors.iter().map(ToString::to_string).collect(),
                    version: r.version.to_string(),
                    doc: if r.doc.is_empty() { NO_RULE_DOC.to_string() } else { r.doc.clone() },
                })
                .collect();
            if rules.is_empty() && !show_empty {
                continue;
            }

            let doc = module_doc(&source);
            files.push(ModuleDocs {
                file_name: path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
                path,
                doc: if doc.is_empty() { NO_MODULE_DOC.to_string() } else { doc },
                rules,
            });
        }

        if files.is_empty() && !show_empty {
            continue;
        }
        out.push(RulesetDocs {
            name: ruleset.name,
            path: ruleset.path,
            doc,
            files,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::options::RuleFilter;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let profiles = dir.path().join("profiles");
        fs::create_dir_all(&profiles).unwrap();
        fs::write(profiles.join("README.md"), "Profile rules.\n").unwrap();
        fs::write(
            profiles.join("te.rhai"),
            "//! Temperature checks.\n\n/// Te is positive.\nfn te(cp) { check(cp.te > 0); }\nfn bare(cp) { }\nvalidator(\"te\", [\"core_profiles\"], #{ version: \">=3\" });\nvalidator(\"bare\", [\"core_profiles:1\"]);\n",
        )
        .unwrap();
        fs::write(profiles.join("empty.rhai"), "").unwrap();
        fs::create_dir_all(dir.path().join("unused")).unwrap();
        dir
    }

    fn options(dir: &TempDir) -> ValidateOptions {
        ValidateOptions {
            rulesets: vec!["profiles".to_string(), "unused".to_string()],
            apply_generic: false,
            use_bundled_rulesets: false,
            extra_rule_dirs: vec![dir.path().to_path_buf()],
            ..ValidateOptions::default()
        }
    }

    #[test]
    fn collects_ruleset_module_and_rule_docs() {
        let dir = fixture();
        let docs = explore(&options(&dir), &RulesConfig::default(), false).unwrap();

        assert_eq!(docs.len(), 1);
        let ruleset = &docs[0];
        assert_eq!(ruleset.name, "profiles");
        assert_eq!(ruleset.doc, "Profile rules.");
        assert_eq!(ruleset.files.len(), 1);

        let module = &ruleset.files[0];
        assert_eq!(module.file_name, "te.rhai");
        assert_eq!(module.doc, "Temperature checks.");
        assert_eq!(module.rules[0].doc, "Te is positive.");
        assert_eq!(module.rules[0].version, ">=3");
        assert_eq!(module.rules[1].patterns, vec!["core_profiles:1"]);
        assert_eq!(module.rules[1].doc, NO_RULE_DOC);
    }

    #[test]
    fn show_empty_keeps_empty_files_and_rulesets() {
        let dir = fixture();
        let docs = explore(&options(&dir), &RulesConfig::default(), true).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["profiles", "unused"]);
        assert_eq!(docs[0].files.len(), 2);
        assert_eq!(docs[0].files[0].doc, NO_MODULE_DOC);
        assert_eq!(docs[1].doc, NO_RULESET_DOC);
    }

    #[test]
    fn rule_filter_applies_to_listed_rules() {
        let dir = fixture();
        let options = ValidateOptions {
            rule_filter: RuleFilter {
                name: vec!["bare".to_string()],
                entity: Vec::new(),
            },
            ..options(&dir)
        };
        let docs = explore(&options, &RulesConfig::default(), false).unwrap();
        let functions: Vec<&str> = docs[0].files[0].rules.iter().map(|r| r.function.as_str()).collect();
        assert_eq!(functions, vec!["bare"]);
    }
}

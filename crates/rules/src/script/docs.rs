//! Docstrings pulled from rule-file comments.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn fn_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:private\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex"))
}

fn doc_text(line: &str, marker: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix(marker)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest).trim_end().to_string())
}

/// Leading `//!` block, blank lines before it allowed.
pub(crate) fn module_doc(source: &str) -> String {
    source
        .lines()
        .skip_while(|l| l.trim().is_empty())
        .map_while(|l| doc_text(l, "//!"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// `///` blocks directly above a function definition, keyed by function name.
pub(super) fn function_docs(source: &str) -> HashMap<String, String> {
    let mut docs = HashMap::new();
    let mut pending: Vec<String> = Vec::new();
    for line in source.lines() {
        if let Some(text) = doc_text(line, "///") {
            pending.push(text);
            continue;
        }
        if let Some(caps) = fn_header().captures(line) {
            if !pending.is_empty() {
                docs.insert(caps[1].to_string(), pending.join("\n").trim().to_string());
            }
        }
        pending.clear();
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_doc_reads_leading_block_only() {
        let source = "\n//! First line.\n//!\n//! Second paragraph.\nfn f(x) {}\n//! not module doc\n";
        assert_eq!(module_doc(source), "First line.\n\nSecond paragraph.");
        assert_eq!(module_doc("fn f(x) {}"), "");
    }

    #[test]
    fn function_docs_attach_to_following_fn() {
        let source = "/// Checks time.\n/// Strictly.\nfn time_ok(ids) {\n}\n\n/// Orphan.\n\nfn undocumented(ids) {}\n";
        let docs = function_docs(source);
        assert_eq!(docs.get("time_ok").map(String::as_str), Some("Checks time.\nStrictly."));
        assert!(!docs.contains_key("undocumented"));
    }

    #[test]
    fn private_functions_are_recognised() {
        let docs = function_docs("/// Helper.\nprivate fn helper(x) { x }\n");
        assert_eq!(docs.get("helper").map(String::as_str), Some("Helper."));
    }
}

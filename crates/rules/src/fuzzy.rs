//! Closest-name suggestions for mistyped ruleset names.

/// Find the closest match using Levenshtein distance. Returns None if best
/// distance exceeds half the longer string (too dissimilar).
pub(crate) fn fuzzy_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let input_lower = input.to_lowercase();
    let mut best: Option<(&str, usize)> = None;

    for &candidate in candidates {
        let dist = levenshtein(&input_lower, &candidate.to_lowercase());
        match best {
            None => best = Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => best = Some((candidate, dist)),
            _ => {}
        }
    }

    best.and_then(|(name, dist)| {
        let max_len = input.len().max(name.len());
        (dist <= max_len / 2).then_some(name)
    })
}

/// Levenshtein edit distance between two strings.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Hint appended to an unknown-ruleset error: the closest name when one is
/// close enough, otherwise the full list.
pub(crate) fn ruleset_hint(requested: &str, available: &[&str]) -> String {
    if available.is_empty() {
        return "No rulesets were found in any search root.".to_string();
    }
    match fuzzy_match(requested, available) {
        Some(name) => format!("Did you mean '{name}'?"),
        None => format!("Available rulesets are: {}", available.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULESETS: &[&str] = &["generic", "iter_scenarios", "scenarios", "efitpp_code"];

    #[test]
    fn levenshtein_basic() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
    }

    #[test]
    fn suggests_closest_ruleset() {
        assert_eq!(fuzzy_match("scenario", RULESETS), Some("scenarios"));
        assert_eq!(ruleset_hint("Generik", RULESETS), "Did you mean 'generic'?");
    }

    #[test]
    fn lists_rulesets_when_nothing_is_close() {
        let hint = ruleset_hint("zzzzzzzzzzzzzz", RULESETS);
        assert!(hint.starts_with("Available rulesets are: generic, iter_scenarios"));
    }
}

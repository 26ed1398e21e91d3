//! Heuristic complexity, quality and tag derivation for extracted snippets.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::models::ComplexityLevel;

/// Line prefixes counted as comments when scoring quality and documentation.
pub const COMMENT_PREFIXES: [&str; 3] = ["#", "//", "/*"];

const CONTROL_FLOW_MARKERS: [&str; 7] = ["if ", "for ", "while ", "try:", "except", "catch", "switch"];
const FUNCTION_MARKERS: [&str; 4] = ["def ", "function ", "fn ", "method "];
const CLASS_MARKERS: [&str; 2] = ["class ", "interface "];

static TAG_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("function", r"(?i)\b(?:def|function|func|fn)\s+\w+"),
        ("class", r"(?i)\b(?:class|interface|struct)\s+\w+"),
        ("api", r"(?i)\b(?:api|endpoint|route)\b"),
        ("database", r"(?i)\b(?:sql|query|database|db)\b"),
        ("async", r"(?i)\b(?:async|await|promise)\b"),
        ("test", r"(?i)\b(?:test|spec|assert)\b"),
        ("algorithm", r"(?i)\b(?:sort|search|filter|map|reduce)\b"),
    ]
    .into_iter()
    .map(|(tag, pattern)| (tag, Regex::new(pattern).unwrap()))
    .collect()
});

/// Complexity counted line by line: +1 for a control-flow keyword, +2 for a
/// function definition, +3 for a class definition.
pub fn keyword_complexity(content: &str) -> u32 {
    content
        .lines()
        .map(|line| {
            let line = line.trim();
            let mut score = 0;
            if CONTROL_FLOW_MARKERS.iter().any(|m| line.contains(m)) {
                score += 1;
            }
            if FUNCTION_MARKERS.iter().any(|m| line.contains(m)) {
                score += 2;
            }
            if CLASS_MARKERS.iter().any(|m| line.contains(m)) {
                score += 3;
            }
            score
        })
        .sum()
}

/// Share of lines that start with a comment marker.
pub fn comment_ratio(content: &str, prefixes: &[&str]) -> f32 {
    let mut total = 0usize;
    let mut comments = 0usize;
    for line in content.lines() {
        total += 1;
        let trimmed = line.trim_start();
        if prefixes.iter().any(|p| trimmed.starts_with(p)) {
            comments += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        comments as f32 / total as f32
    }
}

/// Quality in [1.0, 10.0], starting from 7.0 and nudged by length,
/// complexity and comment density.
pub fn quality_score(content: &str, complexity: ComplexityLevel) -> f32 {
    let mut score = 7.0f32;

    let line_count = content.lines().count();
    if (5..=50).contains(&line_count) {
        score += 1.0;
    } else if line_count > 50 {
        score -= 1.0;
    }

    match complexity {
        ComplexityLevel::Low => score += 0.5,
        ComplexityLevel::High => score -= 0.5,
        ComplexityLevel::Medium => {}
    }

    let ratio = comment_ratio(content, &COMMENT_PREFIXES);
    if (0.1..=0.3).contains(&ratio) {
        score += 0.5;
    } else if ratio > 0.5 {
        score -= 0.5;
    }

    score.clamp(1.0, 10.0)
}

/// The language tag plus every semantic tag whose pattern matches.
pub fn extract_tags(content: &str, language: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(language.to_string());
    for (tag, pattern) in TAG_PATTERNS.iter() {
        if pattern.is_match(content) {
            tags.insert(tag.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keyword_complexity_weights() {
        assert_eq!(keyword_complexity("x = 1"), 0);
        assert_eq!(keyword_complexity("if x:\n    y()"), 1);
        assert_eq!(keyword_complexity("function go() {\n  for (;;) {}\n}"), 3);
        assert_eq!(keyword_complexity("class Foo {\n}"), 3);
    }

    #[test]
    fn test_quality_baseline_and_bonuses() {
        // one line, medium complexity, no comments
        assert_eq!(quality_score("x = 1", ComplexityLevel::Medium), 7.0);
        // low complexity bonus
        assert_eq!(quality_score("x = 1", ComplexityLevel::Low), 7.5);

        let body = "# setup\na = 1\nb = 2\nc = 3\nd = 4\ne = 5";
        // six lines, ratio 1/6 inside [0.1, 0.3]
        assert_eq!(quality_score(body, ComplexityLevel::Low), 9.0);
    }

    #[test]
    fn test_quality_penalizes_long_comment_heavy_code() {
        let long: String = (0..60).map(|i| format!("// note {i}\n")).collect();
        assert_eq!(quality_score(&long, ComplexityLevel::High), 5.0);
    }

    #[test]
    fn test_extract_tags() {
        let tags = extract_tags("async function fetchUsers() { await db.query(sql) }", "javascript");
        assert!(tags.contains("javascript"));
        assert!(tags.contains("function"));
        assert!(tags.contains("async"));
        assert!(tags.contains("database"));
        assert!(!tags.contains("class"));

        let tags = extract_tags("x = 1", "go");
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_comment_ratio() {
        assert_eq!(comment_ratio("", &COMMENT_PREFIXES), 0.0);
        assert_eq!(comment_ratio("# a\nb", &COMMENT_PREFIXES), 0.5);
        assert_eq!(comment_ratio("  // a\n/* b */", &COMMENT_PREFIXES), 1.0);
    }

    proptest! {
        #[test]
        fn prop_quality_in_range(content in "(?s).{0,400}", level in 0u32..20) {
            let q = quality_score(&content, ComplexityLevel::from_score(level));
            prop_assert!((1.0..=10.0).contains(&q));
        }

        #[test]
        fn prop_complexity_bucket_is_monotone(a in 0u32..1000, b in 0u32..1000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(ComplexityLevel::from_score(lo) <= ComplexityLevel::from_score(hi));
        }
    }
}

//! Per-candidate sub-scores. Each returns a value in [0, 1].

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::chunking::metrics::comment_ratio;
use crate::models::{Snippet, SnippetKind};
use crate::query::Intent;

/// Complexity above this starts to cost quality.
const COMPLEXITY_PENALTY_START: u32 = 15;
const MAX_COMPLEXITY_PENALTY: f32 = 0.3;

/// Comment markers counted by the documentation score.
const DOC_COMMENT_PREFIXES: [&str; 4] = ["#", "//", "/*", "*/"];

/// `(overlap + 0.5 * content hits) / (1.5 * |query keywords|)`, 0 without keywords.
pub fn keyword_score(snippet: &Snippet, query_keywords: &BTreeSet<String>) -> f32 {
    if query_keywords.is_empty() {
        return 0.0;
    }
    let snippet_keywords = snippet.keywords();
    let overlap = query_keywords.intersection(&snippet_keywords).count() as f32;
    let content = snippet.content.to_lowercase();
    let content_hits = query_keywords
        .iter()
        .filter(|k| content.contains(k.as_str()))
        .count() as f32;

    let score = (overlap + content_hits * 0.5) / (query_keywords.len() as f32 * 1.5);
    score.clamp(0.0, 1.0)
}

/// Normalized snippet quality, less a penalty for very complex code, plus
/// readability and docstring bonuses.
pub fn quality_score(snippet: &Snippet, readability: f32) -> f32 {
    let base = snippet.quality_score / 10.0;
    let penalty = if snippet.complexity_score > COMPLEXITY_PENALTY_START {
        ((snippet.complexity_score - COMPLEXITY_PENALTY_START) as f32 / 20.0)
            .min(MAX_COMPLEXITY_PENALTY)
    } else {
        0.0
    };
    let doc_bonus = if snippet.docstring.is_some() { 0.1 } else { 0.0 };

    (base - penalty + readability.clamp(0.0, 1.0) * 0.2 + doc_bonus).clamp(0.0, 1.0)
}

/// Blend of repository stars, usage and views, weighted 0.5 / 0.3 / 0.2.
pub fn popularity_score(stars: u32, usage_count: u64, view_count: u64) -> f32 {
    let stars = ((f64::from(stars) + 1.0).log10() / 5.0).min(1.0) as f32;
    let usage = (usage_count as f32 / 100.0).min(1.0);
    let views = (view_count as f32 / 50.0).min(1.0);
    stars * 0.5 + usage * 0.3 + views * 0.2
}

/// Step function of age in whole days; 0.5 when the creation time is unknown.
pub fn recency_score(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    let Some(created_at) = created_at else {
        return 0.5;
    };
    match (now - created_at).num_days() {
        d if d <= 30 => 1.0,
        d if d <= 90 => 0.8,
        d if d <= 365 => 0.6,
        d if d <= 730 => 0.4,
        _ => 0.2,
    }
}

pub fn documentation_score(snippet: &Snippet) -> f32 {
    let mut score = 0.0;
    if snippet.docstring.is_some() {
        score += 0.4;
    }
    if snippet.name.as_ref().is_some_and(|n| n.chars().count() > 2) {
        score += 0.2;
    }
    if !snippet.parameters.is_empty() {
        score += 0.2;
    }
    if snippet.return_type.is_some() {
        score += 0.1;
    }
    score += (comment_ratio(&snippet.content, &DOC_COMMENT_PREFIXES) * 0.3).min(0.1);
    score.min(1.0)
}

/// Multiplier applied to the quality boost when the snippet fits the intent.
pub fn intent_multiplier(intent: Intent, snippet: &Snippet) -> f32 {
    let keywords = snippet.keywords();
    match intent {
        Intent::FindFunction => {
            if snippet.kind.is_function() {
                1.2
            } else {
                0.8
            }
        }
        Intent::FindClass => {
            if snippet.kind == SnippetKind::Class {
                1.2
            } else {
                0.8
            }
        }
        Intent::FindAlgorithm if keywords.contains("algorithm") => 1.3,
        Intent::FindExample if snippet.docstring.is_some() => 1.1,
        Intent::FindPattern if keywords.len() > 3 => 1.2,
        Intent::FindApi if keywords.contains("api") => 1.2,
        Intent::DebugError if keywords.contains("error") || keywords.contains("exception") => 1.1,
        Intent::LearnConcept if snippet.docstring.is_some() => 1.2,
        Intent::CompareImplementations if snippet.complexity_score > 5 => 1.1,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComplexityLevel;
    use chrono::Duration;

    fn snippet(name: &str, kind: SnippetKind, content: &str) -> Snippet {
        Snippet {
            id: format!("t.py:1:{}", content.lines().count().max(1)),
            file_path: "t.py".to_string(),
            content: content.to_string(),
            language: "python".to_string(),
            kind,
            name: Some(name.to_string()),
            start_line: 1,
            end_line: content.lines().count().max(1),
            description: format!("Function {name}"),
            docstring: None,
            parameters: Vec::new(),
            return_type: None,
            tags: ["python".to_string()].into_iter().collect(),
            complexity_score: 2,
            complexity: ComplexityLevel::Low,
            quality_score: 8.0,
            repository: None,
            created_at: None,
            stars: 0,
        }
    }

    fn keywords(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_keyword_score() {
        let s = snippet("bubble_sort", SnippetKind::Function, "def bubble_sort(xs):\n    pass");
        assert_eq!(keyword_score(&s, &BTreeSet::new()), 0.0);
        // overlap 1 (name piece), content hit 1
        assert!((keyword_score(&s, &keywords(&["sort"])) - 1.0).abs() < 1e-6);
        // one of two keywords matches
        assert!((keyword_score(&s, &keywords(&["sort", "graph"])) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_quality_score() {
        let mut s = snippet("f", SnippetKind::Function, "x");
        assert!((quality_score(&s, 0.0) - 0.8).abs() < 1e-6);
        s.docstring = Some("doc".to_string());
        assert!((quality_score(&s, 0.0) - 0.9).abs() < 1e-6);
        s.complexity_score = 25;
        assert!((quality_score(&s, 0.0) - 0.6).abs() < 1e-6);
        s.complexity_score = 100;
        assert!((quality_score(&s, 1.0) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_popularity_zero_signals_is_zero() {
        assert_eq!(popularity_score(0, 0, 0), 0.0);
        assert!((popularity_score(99_999, 100, 50) - 1.0).abs() < 1e-4);
        assert!(popularity_score(10, 0, 0) > 0.0);
    }

    #[test]
    fn test_recency_steps() {
        let now = Utc::now();
        assert_eq!(recency_score(None, now), 0.5);
        assert_eq!(recency_score(Some(now - Duration::days(10)), now), 1.0);
        assert_eq!(recency_score(Some(now - Duration::days(30)), now), 1.0);
        assert_eq!(recency_score(Some(now - Duration::days(60)), now), 0.8);
        assert_eq!(recency_score(Some(now - Duration::days(200)), now), 0.6);
        assert_eq!(recency_score(Some(now - Duration::days(500)), now), 0.4);
        assert_eq!(recency_score(Some(now - Duration::days(800)), now), 0.2);
    }

    #[test]
    fn test_documentation_score() {
        let mut s = snippet("ab", SnippetKind::Function, "x = 1");
        assert_eq!(documentation_score(&s), 0.0);
        s.name = Some("parse".to_string());
        s.docstring = Some("Parse input.".to_string());
        s.parameters = vec!["input".to_string()];
        s.return_type = Some("Config".to_string());
        assert!((documentation_score(&s) - 0.9).abs() < 1e-6);
        s.content = "# a\n# b\nx = 1".to_string();
        assert!((documentation_score(&s) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_intent_multiplier() {
        let f = snippet("run", SnippetKind::Function, "def run(): pass");
        let c = snippet("Runner", SnippetKind::Class, "class Runner: pass");
        assert_eq!(intent_multiplier(Intent::FindFunction, &f), 1.2);
        assert_eq!(intent_multiplier(Intent::FindFunction, &c), 0.8);
        assert_eq!(intent_multiplier(Intent::FindClass, &c), 1.2);
        assert_eq!(intent_multiplier(Intent::FindApi, &f), 1.0);

        let mut algo = f.clone();
        algo.tags.insert("algorithm".to_string());
        assert_eq!(intent_multiplier(Intent::FindAlgorithm, &algo), 1.3);
    }
}

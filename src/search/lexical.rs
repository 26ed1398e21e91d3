//! Lexical relevance: additive substring rule for queries, and pairwise
//! snippet similarity for "more like this".

use std::collections::BTreeSet;

use crate::config::LexicalWeights;
use crate::models::{MatchType, Snippet};
use crate::query::ProcessedQuery;

/// Additive substring score of one snippet against a query, capped at 1.0.
///
/// Whole-phrase checks use the unexpanded query; per-token bonuses use every
/// term of the expanded query.
pub fn lexical_score(snippet: &Snippet, query: &ProcessedQuery, w: &LexicalWeights) -> f32 {
    let content = snippet.content.to_lowercase();
    let name = snippet.display_name().to_lowercase();
    let description = snippet.description.to_lowercase();
    let phrase = query.phrase.as_str();

    let mut score = 0.0;
    if !phrase.is_empty() {
        if content.contains(phrase) {
            score += w.content;
        }
        if name.contains(phrase) {
            score += w.name;
        }
        if description.contains(phrase) {
            score += w.description;
        }
        for tag in &snippet.tags {
            if tag.to_lowercase().contains(phrase) {
                score += w.tag;
            }
        }
        if snippet.language.contains(phrase) {
            score += w.language;
        }
        if snippet.kind.as_str().contains(phrase) {
            score += w.kind;
        }
        if snippet.file_path.to_lowercase().contains(phrase) {
            score += w.file_path;
        }
    }

    for term in query.terms() {
        if content.contains(term) {
            score += w.token_in_content;
        }
        if name.contains(term) {
            score += w.token_in_name;
        }
        if description.contains(term) {
            score += w.token_in_description;
        }
    }

    score += snippet.quality_score * w.quality_factor;
    score.min(1.0)
}

/// Which field the query phrase hit first, in name, content, description,
/// tags order.
pub fn match_type(snippet: &Snippet, phrase: &str) -> MatchType {
    if phrase.is_empty() {
        return MatchType::KeywordMatch;
    }
    if snippet.display_name().to_lowercase().contains(phrase) {
        MatchType::ExactName
    } else if snippet.content.to_lowercase().contains(phrase) {
        MatchType::ContentMatch
    } else if snippet.description.to_lowercase().contains(phrase) {
        MatchType::DescriptionMatch
    } else if snippet.tags.iter().any(|t| t.to_lowercase().contains(phrase)) {
        MatchType::TagMatch
    } else {
        MatchType::KeywordMatch
    }
}

/// Pairwise similarity in [0, 1]: 0.2 for the same language, 0.2 for the
/// same kind, then up to 0.3 each for tag and content-word Jaccard overlap.
pub fn snippet_similarity(a: &Snippet, b: &Snippet) -> f32 {
    let mut similarity = 0.0;
    if a.language == b.language {
        similarity += 0.2;
    }
    if a.kind == b.kind {
        similarity += 0.2;
    }
    similarity += 0.3 * jaccard(&a.tags, &b.tags);

    let words_a = content_words(&a.content);
    let words_b = content_words(&b.content);
    similarity += 0.3 * jaccard(&words_a, &words_b);

    similarity.min(1.0)
}

fn content_words(content: &str) -> BTreeSet<String> {
    content.split_whitespace().map(str::to_lowercase).collect()
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::extract_snippets;
    use crate::query::QueryProcessor;

    fn bubble() -> Snippet {
        extract_snippets(
            "algos/sort.py",
            "def bubble_sort(items):\n    n = len(items)\n    for i in range(n):\n        for j in range(n - i - 1):\n            if items[j] > items[j + 1]:\n                items[j], items[j + 1] = items[j + 1], items[j]\n    return items\n",
        )
        .remove(0)
    }

    fn linear() -> Snippet {
        extract_snippets(
            "algos/search.js",
            "function linearSearch(items, target) {\n  for (let i = 0; i < items.length; i++) {\n    if (items[i] === target) return i;\n  }\n  return -1;\n}\n",
        )
        .remove(0)
    }

    fn query(raw: &str) -> ProcessedQuery {
        QueryProcessor::new().process_with_rules(raw, false)
    }

    #[test]
    fn test_name_hit_outscores_miss() {
        let w = LexicalWeights::default();
        let q = query("sort");
        let hit = lexical_score(&bubble(), &q, &w);
        let miss = lexical_score(&linear(), &q, &w);
        assert_eq!(hit, 1.0);
        assert!(miss <= 0.1, "miss scored {miss}");
    }

    #[test]
    fn test_quality_bonus_only() {
        let w = LexicalWeights::default();
        let s = linear();
        let score = lexical_score(&s, &query("zzzz"), &w);
        assert!((score - s.quality_score * 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_match_type_order() {
        assert_eq!(match_type(&bubble(), "bubble"), MatchType::ExactName);
        assert_eq!(match_type(&bubble(), "range"), MatchType::ContentMatch);
        assert_eq!(match_type(&bubble(), "qqq"), MatchType::KeywordMatch);
    }

    #[test]
    fn test_similarity_components() {
        let a = bubble();
        assert!((snippet_similarity(&a, &a) - 1.0).abs() < 1e-6);

        let b = linear();
        let s = snippet_similarity(&a, &b);
        // different language, same kind, some shared tags and words
        assert!(s > 0.2 && s < 0.7, "similarity {s}");
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["y", "z"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }
}

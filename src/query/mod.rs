//! Query understanding: keywords, intent, expansion, topics and normalization.

pub mod intent;
pub mod vocab;

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

pub use intent::{detect_by_rules, Intent, IntentClassifier};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_QUERY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\-. ]").unwrap());
static CODE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[{}()\[\]]").unwrap());
static OPERATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[+\-*/=<>!&|]").unwrap());

/// A query after processing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedQuery {
    pub raw: String,
    /// Normalized text used for retrieval, expansion terms included
    pub normalized: String,
    /// Normalized raw text without expansion, matched as a phrase
    pub phrase: String,
    pub keywords: BTreeSet<String>,
    pub intent: Option<Intent>,
    pub topics: Vec<String>,
    pub expansion_terms: Vec<String>,
}

impl ProcessedQuery {
    /// Whitespace tokens of the normalized text.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.normalized.split_whitespace()
    }
}

/// Characteristics of a query, for clients deciding how to present results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub length: usize,
    pub word_count: usize,
    pub keyword_count: usize,
    pub has_code_syntax: bool,
    pub has_quotes: bool,
    pub has_operators: bool,
    pub intent: Option<Intent>,
    pub topics: Vec<String>,
    pub languages_mentioned: Vec<String>,
    pub complexity_score: f32,
}

#[derive(Clone, Default)]
pub struct QueryProcessor {
    classifier: Option<Arc<dyn IntentClassifier>>,
}

impl QueryProcessor {
    /// Rules-only processor.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    /// Process a raw query, asking the classifier for intent when one is set.
    pub async fn process(&self, raw: &str, expand: bool) -> ProcessedQuery {
        let intent = self.detect_intent(raw).await;
        build(raw, expand, intent)
    }

    /// Process a raw query with rule-based intent only.
    pub fn process_with_rules(&self, raw: &str, expand: bool) -> ProcessedQuery {
        build(raw, expand, detect_by_rules(raw))
    }

    pub async fn detect_intent(&self, query: &str) -> Option<Intent> {
        let Some(classifier) = &self.classifier else {
            return detect_by_rules(query);
        };
        match classifier.classify(query).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!("intent classifier failed, using rules: {e:#}");
                detect_by_rules(query)
            }
        }
    }

    /// Completions for a partially typed query.
    pub fn suggestions(&self, partial: &str, limit: usize) -> Vec<String> {
        let lower = partial.trim().to_lowercase();
        let mut out: Vec<String> = vocab::SUGGESTION_PHRASES
            .iter()
            .filter(|p| p.contains(lower.as_str()))
            .map(|p| p.to_string())
            .collect();

        for (language, keywords) in vocab::QUERY_LANGUAGES {
            if mentions(&lower, language) {
                out.extend(keywords.iter().take(5).map(|k| format!("{k} in {language}")));
            }
        }

        out.truncate(limit);
        out
    }

    pub async fn analyze(&self, query: &str) -> QueryAnalysis {
        let word_count = query.split_whitespace().count();
        let keyword_count = extract_keywords(query).len();
        let has_code_syntax = CODE_SYNTAX.is_match(query);
        let has_operators = OPERATORS.is_match(query);
        let intent = self.detect_intent(query).await;

        let lower = query.to_lowercase();
        let languages_mentioned = vocab::QUERY_LANGUAGES
            .iter()
            .filter(|(language, _)| mentions(&lower, language))
            .map(|(language, _)| language.to_string())
            .collect();

        let mut score = (word_count as f32 / 10.0).min(1.0) * 0.3;
        score += (keyword_count as f32 / 5.0).min(1.0) * 0.3;
        if has_code_syntax {
            score += 0.2;
        }
        if has_operators {
            score += 0.1;
        }
        if intent.is_some() {
            score += 0.1;
        }

        QueryAnalysis {
            length: query.chars().count(),
            word_count,
            keyword_count,
            has_code_syntax,
            has_quotes: query.contains('"') || query.contains('\''),
            has_operators,
            intent,
            topics: extract_topics(query),
            languages_mentioned,
            complexity_score: score.min(1.0),
        }
    }
}

fn build(raw: &str, expand: bool, intent: Option<Intent>) -> ProcessedQuery {
    let keywords = extract_keywords(raw);
    let expansion_terms = if expand {
        expansion_terms(raw)
    } else {
        Vec::new()
    };
    let text = if expansion_terms.is_empty() {
        raw.to_string()
    } else {
        format!("{raw} {}", expansion_terms.join(" "))
    };
    let topics = extract_topics(&text);

    ProcessedQuery {
        raw: raw.to_string(),
        normalized: normalize(&text),
        phrase: normalize(raw),
        keywords,
        intent,
        topics,
        expansion_terms,
    }
}

/// Word tokens minus stop words and short tokens, plus any programming term.
pub fn extract_keywords(query: &str) -> BTreeSet<String> {
    let lower = query.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| {
            (w.len() > 2 && !vocab::is_stop_word(w)) || vocab::is_programming_term(w)
        })
        .map(str::to_string)
        .collect()
}

/// Synonyms of every table key found in the query, capped.
pub fn expansion_terms(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    vocab::SYNONYMS
        .iter()
        .filter(|(key, _)| lower.contains(key))
        .flat_map(|(_, terms)| terms.iter().map(|t| t.to_string()))
        .take(vocab::MAX_EXPANSION_TERMS)
        .collect()
}

/// `kind:value` tags for languages, frameworks and domains named in the query.
pub fn extract_topics(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut topics = Vec::new();

    for (language, _) in vocab::QUERY_LANGUAGES {
        if mentions(&lower, language) {
            topics.push(format!("language:{language}"));
        }
    }
    for (framework, category) in vocab::FRAMEWORKS {
        if mentions(&lower, framework) {
            topics.push(format!("framework:{framework}"));
            topics.push(format!("category:{category}"));
        }
    }
    for (domain, terms) in vocab::DOMAINS {
        if terms.iter().any(|t| mentions(&lower, t)) {
            topics.push(format!("domain:{domain}"));
        }
    }

    topics
}

/// Collapse whitespace, lowercase, replace characters outside
/// `[A-Za-z0-9_-. ]` with spaces, collapse again. Idempotent.
pub fn normalize(query: &str) -> String {
    let collapsed = WHITESPACE.replace_all(query.trim(), " ").to_lowercase();
    let stripped = NON_QUERY_CHARS.replace_all(&collapsed, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Whether `term` occurs in `text` without letters or digits on either side,
/// so `go` does not fire on `algorithm`.
fn mentions(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

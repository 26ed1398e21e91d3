use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What kind of code the user is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FindFunction,
    FindClass,
    FindAlgorithm,
    FindExample,
    FindPattern,
    FindApi,
    DebugError,
    LearnConcept,
    CompareImplementations,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::FindFunction,
        Intent::FindClass,
        Intent::FindAlgorithm,
        Intent::FindExample,
        Intent::FindPattern,
        Intent::FindApi,
        Intent::DebugError,
        Intent::LearnConcept,
        Intent::CompareImplementations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::FindFunction => "find_function",
            Intent::FindClass => "find_class",
            Intent::FindAlgorithm => "find_algorithm",
            Intent::FindExample => "find_example",
            Intent::FindPattern => "find_pattern",
            Intent::FindApi => "find_api",
            Intent::DebugError => "debug_error",
            Intent::LearnConcept => "learn_concept",
            Intent::CompareImplementations => "compare_implementations",
        }
    }

    /// Natural-language label shown to a zero-shot classifier.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::FindFunction => "function search",
            Intent::FindClass => "class search",
            Intent::FindAlgorithm => "algorithm search",
            Intent::FindExample => "example search",
            Intent::FindPattern => "pattern search",
            Intent::FindApi => "api search",
            Intent::DebugError => "error debugging",
            Intent::LearnConcept => "learning concept",
            Intent::CompareImplementations => "implementation comparison",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|i| i.label() == label || i.as_str() == label)
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown intent: {s}"))
    }
}

/// Substring rules checked in order; the first hit wins.
const INTENT_RULES: &[(Intent, &[&str])] = &[
    (Intent::FindFunction, &["function", "def ", "func ", "method"]),
    (Intent::FindClass, &["class", "struct", "interface"]),
    (
        Intent::FindAlgorithm,
        &["algorithm", "sort", "search", "binary", "quick", "merge"],
    ),
    (Intent::FindExample, &["example", "sample", "how to", "tutorial"]),
    (Intent::FindApi, &["api", "endpoint", "rest", "graphql"]),
    (Intent::DebugError, &["error", "exception", "bug", "fix", "debug"]),
    (Intent::LearnConcept, &["learn", "understand", "explain", "what is"]),
    (Intent::CompareImplementations, &["compare", "difference", "vs", "versus"]),
];

/// Rule-based intent detection, used when no classifier is configured or it fails.
pub fn detect_by_rules(query: &str) -> Option<Intent> {
    let lower = query.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| lower.contains(t)))
        .map(|(intent, _)| *intent)
}

/// Scores a query against the intent labels.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Best label for the query, `Ok(None)` when no label fits.
    async fn classify(&self, query: &str) -> anyhow::Result<Option<Intent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order() {
        assert_eq!(detect_by_rules("sort function"), Some(Intent::FindFunction));
        assert_eq!(detect_by_rules("binary search"), Some(Intent::FindAlgorithm));
        assert_eq!(detect_by_rules("Class for parsing"), Some(Intent::FindClass));
        assert_eq!(detect_by_rules("how to parse json"), Some(Intent::FindExample));
        assert_eq!(detect_by_rules("graphql endpoint"), Some(Intent::FindApi));
        assert_eq!(detect_by_rules("fix null pointer"), Some(Intent::DebugError));
        assert_eq!(detect_by_rules("what is a monad"), Some(Intent::LearnConcept));
        assert_eq!(detect_by_rules("tabs versus spaces"), Some(Intent::CompareImplementations));
        assert_eq!(detect_by_rules("hello world"), None);
    }

    #[test]
    fn test_label_round_trip() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_label(intent.label()), Some(intent));
            assert_eq!(intent.as_str().parse::<Intent>(), Ok(intent));
        }
        assert_eq!(Intent::from_label("Error Debugging"), Some(Intent::DebugError));
        assert_eq!(Intent::from_label("nonsense"), None);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use crate::query::Intent;

/// Structural kind of an extracted snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetKind {
    Function,
    AsyncFunction,
    Class,
    ModuleBlock,
    GenericBlock,
}

impl SnippetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetKind::Function => "function",
            SnippetKind::AsyncFunction => "async_function",
            SnippetKind::Class => "class",
            SnippetKind::ModuleBlock => "module_block",
            SnippetKind::GenericBlock => "generic_block",
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, SnippetKind::Function | SnippetKind::AsyncFunction)
    }
}

/// Bucketed complexity. Breakpoints: score <= 2 is low, <= 5 is medium, else high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    pub const LOW_MAX: u32 = 2;
    pub const MEDIUM_MAX: u32 = 5;

    pub fn from_score(score: u32) -> Self {
        if score <= Self::LOW_MAX {
            ComplexityLevel::Low
        } else if score <= Self::MEDIUM_MAX {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Low => "low",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::High => "high",
        }
    }
}

impl FromStr for ComplexityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(ComplexityLevel::Low),
            "medium" => Ok(ComplexityLevel::Medium),
            "high" => Ok(ComplexityLevel::High),
            other => Err(format!("unknown complexity level: {other}")),
        }
    }
}

/// A unit of searchable code.
///
/// Snippets are created in one extraction pass over a file and replaced
/// wholesale when the file is extracted again; nothing mutates them in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// `file_path:start_line:end_line`, stable while the span is unchanged
    pub id: String,
    pub file_path: String,
    /// Exactly the source lines `start_line..=end_line`
    pub content: String,
    pub language: String,
    pub kind: SnippetKind,
    pub name: Option<String>,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
    /// Docstring when present, otherwise synthesized from kind and name
    pub description: String,
    pub docstring: Option<String>,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub tags: BTreeSet<String>,
    pub complexity_score: u32,
    pub complexity: ComplexityLevel,
    /// 1.0 to 10.0
    pub quality_score: f32,
    pub repository: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub stars: u32,
}

impl Snippet {
    pub fn make_id(file_path: &str, start_line: usize, end_line: usize) -> String {
        format!("{file_path}:{start_line}:{end_line}")
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Keywords used for overlap scoring: the tags plus the lowercase word
    /// pieces of the name (`bubble_sort` gives `bubble` and `sort`).
    pub fn keywords(&self) -> BTreeSet<String> {
        let mut keywords = self.tags.clone();
        if let Some(name) = &self.name {
            let lower = name.to_lowercase();
            keywords.insert(lower.clone());
            for piece in split_identifier(name) {
                if piece.len() > 2 {
                    keywords.insert(piece);
                }
            }
        }
        keywords
    }
}

/// Split an identifier on underscores, dashes and camelCase boundaries.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in ident.chars() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Metadata the repository source attaches to every file it hands over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub repository: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub stars: u32,
}

/// A file from the repository source: read-only content plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub meta: SourceMeta,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            meta: SourceMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: SourceMeta) -> Self {
        self.meta = meta;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Semantic,
    Keyword,
    #[default]
    Hybrid,
    Pattern,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "semantic" => Ok(SearchMode::Semantic),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            "pattern" => Ok(SearchMode::Pattern),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactName,
    ContentMatch,
    DescriptionMatch,
    TagMatch,
    KeywordMatch,
    Similarity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if at > end {
                return false;
            }
        }
        true
    }
}

/// Search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub complexity: Vec<ComplexityLevel>,
    pub date_range: Option<DateRange>,
    /// Falls back to the configured default, clamped to the configured cap
    pub max_results: Option<usize>,
    pub similarity_threshold: Option<f32>,
    #[serde(default = "default_page")]
    pub page: usize,
    pub page_size: Option<usize>,
    #[serde(default = "default_true")]
    pub expand: bool,
}

fn default_page() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::default(),
            languages: Vec::new(),
            repositories: Vec::new(),
            complexity: Vec::new(),
            date_range: None,
            max_results: None,
            similarity_threshold: None,
            page: default_page(),
            page_size: None,
            expand: true,
        }
    }
}

/// Per-factor sub-scores, each within [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f32,
    pub keyword: f32,
    pub quality: f32,
    pub popularity: f32,
    pub recency: f32,
    pub documentation: f32,
}

/// Multiplicative boosts applied to the weighted base score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boosts {
    pub quality: f32,
    pub popularity: f32,
    pub recency: f32,
    pub documentation: f32,
}

impl Default for Boosts {
    fn default() -> Self {
        Self {
            quality: 1.0,
            popularity: 1.0,
            recency: 1.0,
            documentation: 1.0,
        }
    }
}

impl Boosts {
    pub fn product(&self) -> f32 {
        self.quality * self.popularity * self.recency * self.documentation
    }
}

/// One ranked candidate.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub snippet: Arc<Snippet>,
    /// Raw lexical or semantic similarity, 0 to 1
    pub similarity: f32,
    pub scores: ScoreBreakdown,
    pub boosts: Boosts,
    /// Final relevance, 0 to 1
    pub score: f32,
    pub match_type: MatchType,
    pub highlighted: String,
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub normalized_query: String,
    pub intent: Option<Intent>,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    /// Set when semantic retrieval was requested but lexical scoring answered alone
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_breakpoints() {
        assert_eq!(ComplexityLevel::from_score(0), ComplexityLevel::Low);
        assert_eq!(ComplexityLevel::from_score(2), ComplexityLevel::Low);
        assert_eq!(ComplexityLevel::from_score(3), ComplexityLevel::Medium);
        assert_eq!(ComplexityLevel::from_score(5), ComplexityLevel::Medium);
        assert_eq!(ComplexityLevel::from_score(6), ComplexityLevel::High);
    }

    #[test]
    fn test_complexity_serializes_to_snake_case() {
        let json = serde_json::to_value(ComplexityLevel::Medium).unwrap();
        assert_eq!(json, "medium");
        let json = serde_json::to_value(SnippetKind::AsyncFunction).unwrap();
        assert_eq!(json, "async_function");
    }

    #[test]
    fn test_split_identifier() {
        assert_eq!(split_identifier("bubble_sort"), vec!["bubble", "sort"]);
        assert_eq!(split_identifier("linearSearch"), vec!["linear", "search"]);
        assert_eq!(split_identifier("ApiHandler"), vec!["api", "handler"]);
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let start = Utc::now() - chrono::Duration::days(10);
        let end = Utc::now();
        let range = DateRange {
            start: Some(start),
            end: Some(end),
        };
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(start - chrono::Duration::days(1)));
    }

    #[test]
    fn test_search_request_defaults_from_json() {
        let req: SearchRequest = serde_json::from_str(r#"{"query": "sort"}"#).unwrap();
        assert_eq!(req.mode, SearchMode::Hybrid);
        assert_eq!(req.page, 1);
        assert!(req.expand);
        assert!(req.max_results.is_none());
    }
}

//! Ranking engine: filters candidates, assigns boosts, computes the weighted
//! relevance score and orders results.
//!
//! Scoring is pure given the candidates, the processed query and the clock,
//! so [`RankingEngine::rank_at`] is fully reproducible.

pub mod scores;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::RankingConfig;
use crate::models::{
    Boosts, ComplexityLevel, DateRange, MatchType, ScoreBreakdown, SearchRequest, SearchResult,
    Snippet, SnippetKind,
};
use crate::query::ProcessedQuery;

/// A snippet that survived retrieval, before ranking.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub snippet: Arc<Snippet>,
    /// Lexical or semantic similarity, 0 to 1
    pub similarity: f32,
    pub match_type: MatchType,
    pub highlighted: String,
}

/// Request-level filters. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub languages: Vec<String>,
    pub repositories: Vec<String>,
    pub complexity: Vec<ComplexityLevel>,
    pub date_range: Option<DateRange>,
    pub similarity_threshold: f32,
}

impl QueryFilters {
    pub fn from_request(request: &SearchRequest, similarity_threshold: f32) -> Self {
        Self {
            languages: request.languages.iter().map(|l| l.to_lowercase()).collect(),
            repositories: request.repositories.clone(),
            complexity: request.complexity.clone(),
            date_range: request.date_range,
            similarity_threshold,
        }
    }

    fn wants_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }

    fn wants_repository(&self, repository: Option<&str>) -> bool {
        repository.is_some_and(|r| self.repositories.iter().any(|want| want == r))
    }

    /// Whether a candidate passes every filter.
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        let snippet = &candidate.snippet;
        if candidate.similarity < self.similarity_threshold {
            return false;
        }
        if !self.languages.is_empty() && !self.wants_language(&snippet.language) {
            return false;
        }
        if !self.repositories.is_empty() && !self.wants_repository(snippet.repository.as_deref())
        {
            return false;
        }
        if !self.complexity.is_empty() && !self.complexity.contains(&snippet.complexity) {
            return false;
        }
        // Snippets without a timestamp are not excluded by a date range.
        if let (Some(range), Some(created_at)) = (&self.date_range, snippet.created_at) {
            if !range.contains(created_at) {
                return false;
            }
        }
        true
    }
}

/// Usage signals collected outside the index.
pub trait SignalSource: Send + Sync {
    fn usage_count(&self, _snippet_id: &str) -> u64 {
        0
    }

    fn view_count(&self, _snippet_id: &str) -> u64 {
        0
    }

    /// 0 to 1
    fn readability(&self, _snippet_id: &str) -> f32 {
        0.0
    }
}

/// Signal source with no data: every signal is zero.
pub struct NoSignals;

impl SignalSource for NoSignals {}

/// Per-factor account of how a result was scored.
#[derive(Debug, Clone, Serialize)]
pub struct RankingExplanation {
    pub snippet_id: String,
    pub similarity: f32,
    pub scores: ScoreBreakdown,
    pub boosts: Boosts,
    pub final_score: f32,
    pub factors: RankingFactors,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingFactors {
    pub has_documentation: bool,
    pub complexity: ComplexityLevel,
    pub kind: SnippetKind,
    pub language: String,
    pub usage_count: u64,
    pub view_count: u64,
}

#[derive(Clone)]
pub struct RankingEngine {
    config: RankingConfig,
    signals: Arc<dyn SignalSource>,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self::with_signals(config, Arc::new(NoSignals))
    }

    pub fn with_signals(config: RankingConfig, signals: Arc<dyn SignalSource>) -> Self {
        Self { config, signals }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn rank(
        &self,
        candidates: Vec<Candidate>,
        query: &ProcessedQuery,
        filters: &QueryFilters,
    ) -> Vec<SearchResult> {
        self.rank_at(candidates, query, filters, Utc::now())
    }

    /// Rank with an explicit clock for the recency score.
    pub fn rank_at(
        &self,
        candidates: Vec<Candidate>,
        query: &ProcessedQuery,
        filters: &QueryFilters,
        now: DateTime<Utc>,
    ) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|c| filters.accepts(c))
            .map(|c| {
                let boosts = self.boosts(&c.snippet, query, filters);
                self.score(c, query, boosts, now)
            })
            .collect();

        sort_results(&mut results);
        results
    }

    /// Multiplicative boosts for one snippet, caps not yet applied.
    pub fn boosts(&self, snippet: &Snippet, query: &ProcessedQuery, filters: &QueryFilters) -> Boosts {
        let mut boosts = Boosts::default();
        if filters.wants_language(&snippet.language) {
            boosts.quality *= self.config.language_boost;
        }
        if filters.wants_repository(snippet.repository.as_deref()) {
            boosts.quality *= self.config.repository_boost;
        }
        if filters.complexity.contains(&snippet.complexity) {
            boosts.quality *= self.config.complexity_boost;
        }
        if let Some(intent) = query.intent {
            boosts.quality *= scores::intent_multiplier(intent, snippet);
        }
        boosts
    }

    fn cap(&self, boosts: Boosts) -> Boosts {
        let caps = &self.config.caps;
        Boosts {
            quality: boosts.quality.min(caps.quality),
            popularity: boosts.popularity.min(caps.popularity),
            recency: boosts.recency.min(caps.recency),
            documentation: boosts.documentation.min(caps.documentation),
        }
    }

    pub fn breakdown(
        &self,
        snippet: &Snippet,
        similarity: f32,
        query: &ProcessedQuery,
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        ScoreBreakdown {
            semantic: similarity.clamp(0.0, 1.0),
            keyword: scores::keyword_score(snippet, &query.keywords),
            quality: scores::quality_score(snippet, self.signals.readability(&snippet.id)),
            popularity: scores::popularity_score(
                snippet.stars,
                self.signals.usage_count(&snippet.id),
                self.signals.view_count(&snippet.id),
            ),
            recency: scores::recency_score(snippet.created_at, now),
            documentation: scores::documentation_score(snippet),
        }
    }

    fn weighted(&self, s: &ScoreBreakdown) -> f32 {
        let w = &self.config.weights;
        s.semantic * w.semantic_similarity
            + s.keyword * w.keyword_match
            + s.quality * w.code_quality
            + s.popularity * w.popularity
            + s.recency * w.recency
            + s.documentation * w.documentation
    }

    fn score(
        &self,
        candidate: Candidate,
        query: &ProcessedQuery,
        boosts: Boosts,
        now: DateTime<Utc>,
    ) -> SearchResult {
        let scores = self.breakdown(&candidate.snippet, candidate.similarity, query, now);
        let boosts = self.cap(boosts);
        let score = (self.weighted(&scores) * boosts.product()).clamp(0.0, 1.0);

        SearchResult {
            snippet: candidate.snippet,
            similarity: candidate.similarity,
            scores,
            boosts,
            score,
            match_type: candidate.match_type,
            highlighted: candidate.highlighted,
        }
    }

    pub fn explain(&self, result: &SearchResult) -> RankingExplanation {
        let snippet = &result.snippet;
        RankingExplanation {
            snippet_id: snippet.id.clone(),
            similarity: result.similarity,
            scores: result.scores,
            boosts: result.boosts,
            final_score: result.score,
            factors: RankingFactors {
                has_documentation: snippet.docstring.is_some(),
                complexity: snippet.complexity,
                kind: snippet.kind,
                language: snippet.language.clone(),
                usage_count: self.signals.usage_count(&snippet.id),
                view_count: self.signals.view_count(&snippet.id),
            },
        }
    }
}

/// Descending score, then ascending snippet id.
pub fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.snippet.id.cmp(&b.snippet.id))
    });
}

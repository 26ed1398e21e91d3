//! Search orchestrator: owns the published corpus generation and runs
//! retrieval, ranking and pagination for each request.

use anyhow::{Context, Result};
use regex::{Captures, Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::chunking;
use crate::config::Config;
use crate::embedding::{EmbeddingRegistry, StrategyInfo};
use crate::error::{ConfigError, SearchError};
use crate::llm::intent::LlmIntentClassifier;
use crate::models::{
    MatchType, ScoreBreakdown, SearchMode, SearchRequest, SearchResponse, SearchResult, Snippet,
    SourceFile,
};
use crate::query::{ProcessedQuery, QueryProcessor};
use crate::rank::{Candidate, QueryFilters, RankingEngine, RankingExplanation, SignalSource};
use crate::search::highlight::highlight;
use crate::search::index::{embedding_text, EmbeddingIndex};
use crate::search::lexical;
use crate::sources;
use crate::state::{Generation, IndexState};

/// Upper bound on compiled pattern-mode regexes.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Outcome of a corpus build or incremental update.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub generation: u64,
    pub files: usize,
    pub snippets: usize,
    pub vectors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub generation: u64,
    pub total_snippets: usize,
    pub total_files: usize,
    pub languages: BTreeMap<String, usize>,
    pub kinds: BTreeMap<String, usize>,
    pub average_quality: f32,
    pub vector_count: usize,
    pub embedding_model: Option<String>,
    pub strategies: Vec<StrategyInfo>,
}

pub struct Engine {
    config: Arc<Config>,
    registry: EmbeddingRegistry,
    processor: QueryProcessor,
    ranking: RankingEngine,
    state: IndexState,
    /// Serializes builders so two updates never publish from the same base
    build_lock: Mutex<()>,
}

impl Engine {
    /// Validate configuration and negotiate embedding strategies. The engine
    /// only exists once every configured collaborator has answered.
    pub async fn start(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "embedding.base_url",
                reason: format!("cannot build HTTP client: {e}"),
            })?;

        let registry = EmbeddingRegistry::negotiate(&config.embedding, client.clone()).await?;
        let processor = match config.classifier.provider.as_str() {
            "none" => QueryProcessor::new(),
            _ => QueryProcessor::with_classifier(Arc::new(LlmIntentClassifier::new(
                client,
                config.classifier.clone(),
            ))),
        };

        tracing::info!(
            embedding = registry.active().map(|e| e.model_id().to_string()).as_deref().unwrap_or("none"),
            classifier = %config.classifier.provider,
            "search engine ready"
        );
        Self::with_parts(config, registry, processor)
    }

    /// Assemble an engine from parts that are already negotiated. The config
    /// is validated here too.
    pub fn with_parts(
        config: Config,
        registry: EmbeddingRegistry,
        processor: QueryProcessor,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let index = EmbeddingIndex::new(registry.active());
        Ok(Self {
            ranking: RankingEngine::new(config.ranking.clone()),
            config: Arc::new(config),
            registry,
            processor,
            state: IndexState::new(Generation::empty(index)),
            build_lock: Mutex::new(()),
        })
    }

    pub fn with_signals(mut self, signals: Arc<dyn SignalSource>) -> Self {
        self.ranking = RankingEngine::with_signals(self.config.ranking.clone(), signals);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &EmbeddingRegistry {
        &self.registry
    }

    pub fn processor(&self) -> &QueryProcessor {
        &self.processor
    }

    pub fn snapshot(&self) -> Arc<Generation> {
        self.state.snapshot()
    }

    // ─── Corpus construction ─────────────────────────────────

    /// Replace the whole corpus with snippets extracted from `sources`.
    pub async fn build_corpus(&self, sources: Vec<SourceFile>) -> Result<BuildReport> {
        let _guard = self.build_lock.lock().await;
        let file_count = sources.len();

        let mut next = Generation::empty(EmbeddingIndex::new(self.registry.active()));
        let mut added = Vec::new();
        for (path, snippets) in self.extract_all(sources).await {
            added.extend(next.replace_file(&path, snippets));
        }
        let vectors = self.embed_snippets(&mut next.index, &added).await;

        let snippets = next.len();
        let generation = self.state.publish(next);
        tracing::info!(generation, files = file_count, snippets, vectors, "corpus published");

        Ok(BuildReport {
            generation,
            files: file_count,
            snippets,
            vectors,
        })
    }

    /// Walk `root` and build the corpus from what it contains.
    pub async fn build_from_dir(&self, root: &Path) -> Result<BuildReport> {
        let root = root.to_path_buf();
        let indexing = self.config.indexing.clone();
        let files = tokio::task::spawn_blocking(move || sources::walk_sources(&root, &indexing))
            .await
            .context("source walker panicked")??;
        self.build_corpus(files).await
    }

    /// Re-extract one file into a new generation, leaving every other file
    /// and vector as it was.
    pub async fn update_file(&self, file: SourceFile) -> Result<BuildReport> {
        let _guard = self.build_lock.lock().await;
        let path = file.path.clone();

        let mut next = (*self.state.snapshot()).clone();
        let mut added = Vec::new();
        for (path, snippets) in self.extract_all(vec![file]).await {
            added.extend(next.replace_file(&path, snippets));
        }
        if added.is_empty() {
            // nothing extracted; the file's previous snippets must not linger
            next.remove_file(&path);
        }
        let vectors = self.embed_snippets(&mut next.index, &added).await;

        let snippets = next.len();
        let generation = self.state.publish(next);
        tracing::info!(generation, path = %path, added = added.len(), "file updated");

        Ok(BuildReport {
            generation,
            files: 1,
            snippets,
            vectors,
        })
    }

    /// Drop a file from the corpus. Returns how many snippets were removed;
    /// unknown paths publish nothing.
    pub async fn remove_file(&self, path: &str) -> usize {
        let _guard = self.build_lock.lock().await;
        let current = self.state.snapshot();
        if !current.files.contains_key(path) {
            return 0;
        }
        let mut next = (*current).clone();
        let removed = next.remove_file(path);
        let generation = self.state.publish(next);
        tracing::info!(generation, path, removed, "file removed");
        removed
    }

    /// Extract files on blocking workers, at most `indexing.concurrency` at a
    /// time. A file whose worker fails is logged and left out.
    async fn extract_all(&self, files: Vec<SourceFile>) -> BTreeMap<String, Vec<Snippet>> {
        let permits = Arc::new(Semaphore::new(self.config.indexing.concurrency));
        let mut tasks = JoinSet::new();

        for file in files {
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let path = file.path.clone();
                let snippets = tokio::task::spawn_blocking(move || chunking::extract(&file)).await;
                (path, snippets)
            });
        }

        let mut out = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Ok(snippets))) => {
                    tracing::debug!(path = %path, snippets = snippets.len(), "extracted");
                    out.insert(path, snippets);
                }
                Ok((path, Err(e))) => tracing::warn!(path = %path, "extraction failed: {e}"),
                Err(e) => tracing::warn!("extraction task failed: {e}"),
            }
        }
        out
    }

    /// Embed snippets in batches and store their vectors. Returns how many
    /// vectors were stored.
    async fn embed_snippets(&self, index: &mut EmbeddingIndex, snippets: &[Arc<Snippet>]) -> usize {
        let Some(embedder) = index.embedder() else {
            return 0;
        };
        if snippets.is_empty() {
            return 0;
        }

        let permits = Arc::new(Semaphore::new(self.config.indexing.concurrency));
        let batch_size = self.config.indexing.embed_batch_size.max(1);
        let mut tasks = JoinSet::new();

        for batch in snippets.chunks(batch_size) {
            let ids: Vec<String> = batch.iter().map(|s| s.id.clone()).collect();
            let texts: Vec<String> = batch.iter().map(|s| embedding_text(s)).collect();
            let embedder = Arc::clone(&embedder);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let vectors = embedder.embed_batch(&texts).await;
                (ids, vectors)
            });
        }

        let mut stored = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ids, vectors)) => stored += index.insert_vectors(&ids, vectors),
                Err(e) => tracing::warn!("embedding task failed: {e}"),
            }
        }
        tracing::info!(requested = snippets.len(), stored, "embedded snippets");
        stored
    }

    // ─── Queries ─────────────────────────────────────────────

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let search = &self.config.search;
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if request.page == 0 {
            return Err(SearchError::InvalidPage(request.page));
        }
        let page_size = request.page_size.unwrap_or(search.default_page_size);
        if page_size == 0 || page_size > search.max_page_size {
            return Err(SearchError::InvalidPageSize {
                got: page_size,
                max: search.max_page_size,
            });
        }
        let threshold = request
            .similarity_threshold
            .unwrap_or(search.default_similarity_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SearchError::InvalidThreshold(threshold));
        }
        let max_results = request
            .max_results
            .unwrap_or(search.default_max_results)
            .min(search.max_results_cap)
            .max(1);

        let query = self.processor.process(&request.query, request.expand).await;
        let generation = self.state.snapshot();

        let (mut candidates, degraded) = match request.mode {
            SearchMode::Keyword => (self.lexical_candidates(&generation, &query, threshold), false),
            SearchMode::Pattern => (pattern_candidates(&generation, &request.query)?, false),
            SearchMode::Semantic => match self.semantic_hits(&generation, &query, threshold).await {
                Some(hits) => (semantic_candidates(&generation, &query, hits), false),
                None => (self.lexical_candidates(&generation, &query, threshold), true),
            },
            SearchMode::Hybrid => {
                let lexical = self.lexical_candidates(&generation, &query, threshold);
                if generation.index.is_enabled() {
                    match self.semantic_hits(&generation, &query, threshold).await {
                        Some(hits) => (merge_hybrid(&generation, &query, lexical, hits), false),
                        None => (lexical, true),
                    }
                } else {
                    (lexical, false)
                }
            }
        };

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.snippet.id.cmp(&b.snippet.id))
        });
        candidates.truncate(max_results);

        let filters = QueryFilters::from_request(request, threshold);
        let ranked = self.ranking.rank(candidates, &query, &filters);

        let total_results = ranked.len();
        let total_pages = total_results.div_ceil(page_size);
        let results: Vec<SearchResult> = ranked
            .into_iter()
            .skip((request.page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        tracing::info!(
            query = %request.query,
            mode = ?request.mode,
            intent = ?query.intent,
            total_results,
            degraded,
            "search complete"
        );

        Ok(SearchResponse {
            query: request.query.clone(),
            normalized_query: query.normalized.clone(),
            intent: query.intent,
            results,
            total_results,
            page: request.page,
            page_size,
            total_pages,
            has_next_page: request.page < total_pages,
            has_previous_page: request.page > 1,
            degraded,
        })
    }

    /// Snippets most like `snippet_id` by pairwise similarity, never
    /// including the snippet itself. Unknown ids give an empty list.
    pub fn find_similar(
        &self,
        snippet_id: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SearchError::InvalidThreshold(threshold));
        }
        let generation = self.state.snapshot();
        let Some(target) = generation.snippet(snippet_id) else {
            tracing::debug!(snippet_id, "find_similar on unknown snippet");
            return Ok(Vec::new());
        };

        let mut results: Vec<SearchResult> = generation
            .snippets
            .values()
            .filter(|s| s.id != target.id)
            .filter_map(|s| {
                let similarity = lexical::snippet_similarity(target, s);
                (similarity >= threshold).then(|| SearchResult {
                    snippet: Arc::clone(s),
                    similarity,
                    scores: ScoreBreakdown {
                        semantic: similarity,
                        ..Default::default()
                    },
                    boosts: Default::default(),
                    score: similarity,
                    match_type: MatchType::Similarity,
                    highlighted: s.content.clone(),
                })
            })
            .collect();

        crate::rank::sort_results(&mut results);
        results.truncate(k);
        Ok(results)
    }

    pub fn explain(&self, result: &SearchResult) -> RankingExplanation {
        self.ranking.explain(result)
    }

    pub fn snippet(&self, id: &str) -> Option<Arc<Snippet>> {
        self.state.snapshot().snippet(id).cloned()
    }

    pub fn stats(&self) -> IndexStats {
        let generation = self.state.snapshot();
        let mut languages = BTreeMap::new();
        let mut kinds = BTreeMap::new();
        let mut total_quality = 0.0;
        for snippet in generation.snippets.values() {
            *languages.entry(snippet.language.clone()).or_insert(0) += 1;
            *kinds.entry(snippet.kind.as_str().to_string()).or_insert(0) += 1;
            total_quality += snippet.quality_score;
        }
        let average_quality = if generation.is_empty() {
            0.0
        } else {
            total_quality / generation.len() as f32
        };

        IndexStats {
            generation: generation.number,
            total_snippets: generation.len(),
            total_files: generation.files.len(),
            languages,
            kinds,
            average_quality,
            vector_count: generation.index.vector_count(),
            embedding_model: generation.index.model_id().map(str::to_string),
            strategies: self.registry.strategies().to_vec(),
        }
    }

    fn lexical_candidates(
        &self,
        generation: &Generation,
        query: &ProcessedQuery,
        threshold: f32,
    ) -> Vec<Candidate> {
        let weights = &self.config.search.lexical;
        generation
            .snippets
            .values()
            .filter_map(|snippet| {
                let score = lexical::lexical_score(snippet, query, weights);
                (score >= threshold).then(|| Candidate {
                    snippet: Arc::clone(snippet),
                    similarity: score,
                    match_type: lexical::match_type(snippet, &query.phrase),
                    highlighted: highlight(&snippet.content, query.terms()),
                })
            })
            .collect()
    }

    /// Semantic lookup bounded by the configured timeout. `None` means the
    /// caller should answer lexically.
    async fn semantic_hits(
        &self,
        generation: &Generation,
        query: &ProcessedQuery,
        threshold: f32,
    ) -> Option<Vec<(String, f32)>> {
        if !generation.index.is_enabled() {
            return None;
        }
        let budget = Duration::from_millis(self.config.search.semantic_timeout_ms);
        let lookup = generation
            .index
            .query(&query.normalized, generation.len(), threshold);
        match tokio::time::timeout(budget, lookup).await {
            Ok(Some(hits)) => Some(hits),
            Ok(None) => {
                tracing::warn!("query embedding failed, answering from lexical scores");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.search.semantic_timeout_ms,
                    "semantic lookup timed out, answering from lexical scores"
                );
                None
            }
        }
    }
}

fn semantic_candidates(
    generation: &Generation,
    query: &ProcessedQuery,
    hits: Vec<(String, f32)>,
) -> Vec<Candidate> {
    hits.into_iter()
        .filter_map(|(id, score)| {
            let snippet = generation.snippet(&id)?;
            Some(Candidate {
                snippet: Arc::clone(snippet),
                similarity: score.clamp(0.0, 1.0),
                match_type: MatchType::Similarity,
                highlighted: highlight(&snippet.content, query.terms()),
            })
        })
        .collect()
}

/// Per snippet, keep the higher of the lexical and semantic similarity.
fn merge_hybrid(
    generation: &Generation,
    query: &ProcessedQuery,
    lexical: Vec<Candidate>,
    hits: Vec<(String, f32)>,
) -> Vec<Candidate> {
    let mut merged: BTreeMap<String, Candidate> = lexical
        .into_iter()
        .map(|c| (c.snippet.id.clone(), c))
        .collect();

    for candidate in semantic_candidates(generation, query, hits) {
        match merged.get_mut(&candidate.snippet.id) {
            Some(existing) => {
                if candidate.similarity > existing.similarity {
                    existing.similarity = candidate.similarity;
                    existing.match_type = MatchType::Similarity;
                }
            }
            None => {
                merged.insert(candidate.snippet.id.clone(), candidate);
            }
        }
    }
    merged.into_values().collect()
}

/// The raw query as a regex over snippet content.
fn pattern_candidates(generation: &Generation, pattern: &str) -> Result<Vec<Candidate>, SearchError> {
    let re = RegexBuilder::new(pattern)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| SearchError::InvalidPattern(e.to_string()))?;

    Ok(generation
        .snippets
        .values()
        .filter(|s| re.is_match(&s.content))
        .map(|s| Candidate {
            snippet: Arc::clone(s),
            similarity: 1.0,
            match_type: MatchType::ContentMatch,
            highlighted: mark_matches(&re, &s.content),
        })
        .collect())
}

fn mark_matches(re: &Regex, content: &str) -> String {
    re.replace_all(content, |caps: &Captures| {
        let m = &caps[0];
        if m.is_empty() {
            String::new()
        } else {
            format!("<mark>{m}</mark>")
        }
    })
    .into_owned()
}

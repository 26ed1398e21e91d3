//! Integration tests for the code-search pipeline.
//!
//! These drive extraction, indexing, search and ranking through the public
//! API with local embedding strategies only; no model service is needed.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use std::fs;
use std::sync::Arc;

use code_search::chunking::extract_snippets;
use code_search::config::Config;
use code_search::embedding::{EmbeddingRegistry, HashingEmbedder};
use code_search::error::ConfigError;
use code_search::models::{SearchMode, SearchRequest, SourceFile, SourceMeta};
use code_search::query::{extract_keywords, QueryProcessor};
use code_search::rank::{Candidate, QueryFilters, RankingEngine};
use code_search::search::index::EmbeddingIndex;
use code_search::search::Engine;

const BUBBLE_SORT: &str = r#"def bubble_sort(items):
    """Sort a list of items in ascending order."""
    n = len(items)
    for i in range(n):
        for j in range(0, n - i - 1):
            if items[j] > items[j + 1]:
                items[j], items[j + 1] = items[j + 1], items[j]
    return items
"#;

const LINEAR_SEARCH: &str = r#"function linear_search(items, target) {
  for (let i = 0; i < items.length; i++) {
    if (items[i] === target) {
      return i;
    }
  }
  return -1;
}
"#;

const RUST_SOURCE: &str = r#"/// A cached HTTP client.
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    /// Fetch a page and return its body.
    pub async fn fetch(&self, url: &str) -> Result<String, Error> {
        let resp = self.inner.get(url).send().await?;
        Ok(resp.text().await?)
    }
}
"#;

fn sample_sources() -> Vec<SourceFile> {
    vec![
        SourceFile::new("algorithms/sort.py", BUBBLE_SORT),
        SourceFile::new("algorithms/search.js", LINEAR_SEARCH),
    ]
}

fn lexical_engine() -> Engine {
    Engine::with_parts(Config::default(), EmbeddingRegistry::lexical_only(), QueryProcessor::new())
        .unwrap()
}

fn hashing_engine() -> Engine {
    let registry = EmbeddingRegistry::with_embedder(Arc::new(HashingEmbedder::new(256)));
    Engine::with_parts(Config::default(), registry, QueryProcessor::new()).unwrap()
}

fn request(query: &str, threshold: f32) -> SearchRequest {
    let mut req = SearchRequest::new(query);
    req.similarity_threshold = Some(threshold);
    req
}

#[tokio::test]
async fn test_sort_query_ranks_bubble_sort_above_linear_search() {
    for engine in [lexical_engine(), hashing_engine()] {
        engine.build_corpus(sample_sources()).await.unwrap();

        let response = engine.search(&request("sort", 0.1)).await.unwrap();
        let names: Vec<&str> = response
            .results
            .iter()
            .filter_map(|r| r.snippet.name.as_deref())
            .collect();
        assert_eq!(names.first(), Some(&"bubble_sort"));
        if let Some(linear) = names.iter().position(|n| *n == "linear_search") {
            assert!(linear > 0);
        }
    }
}

#[tokio::test]
async fn test_language_filter_excludes_other_languages() {
    let engine = hashing_engine();
    engine.build_corpus(sample_sources()).await.unwrap();

    for mode in [SearchMode::Keyword, SearchMode::Hybrid, SearchMode::Semantic] {
        let mut req = request("items", 0.0);
        req.mode = mode;
        req.languages = vec!["python".to_string()];
        let response = engine.search(&req).await.unwrap();
        assert!(!response.results.is_empty(), "{mode:?} returned nothing");
        assert!(response.results.iter().all(|r| r.snippet.language == "python"));
    }
}

#[tokio::test]
async fn test_find_similar_never_returns_the_query_snippet() {
    let engine = lexical_engine();
    let mut sources = sample_sources();
    sources.push(SourceFile::new(
        "algorithms/more.py",
        "def insertion_sort(items):\n    for i in range(1, len(items)):\n        key = items[i]\n    return items\n",
    ));
    engine.build_corpus(sources).await.unwrap();

    let snapshot = engine.snapshot();
    for id in snapshot.snippets.keys() {
        let similar = engine.find_similar(id, 10, 0.0).unwrap();
        assert!(similar.iter().all(|r| &r.snippet.id != id));
        assert_eq!(similar.len(), snapshot.len() - 1);
        for pair in similar.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}

#[tokio::test]
async fn test_build_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("node_modules/dep")).unwrap();
    fs::write(root.join("src/sort.py"), BUBBLE_SORT).unwrap();
    fs::write(root.join("src/client.rs"), RUST_SOURCE).unwrap();
    fs::write(root.join("node_modules/dep/index.js"), LINEAR_SEARCH).unwrap();

    let engine = hashing_engine();
    let report = engine.build_from_dir(root).await.unwrap();
    assert_eq!(report.files, 2);

    let stats = engine.stats();
    assert_eq!(stats.total_files, 2);
    assert!(stats.languages.contains_key("rust"));
    assert!(!stats.languages.contains_key("javascript"));
    assert_eq!(stats.vector_count, stats.total_snippets);

    let mut req = request("fetch page", 0.1);
    req.languages = vec!["rust".to_string()];
    let response = engine.search(&req).await.unwrap();
    assert_eq!(response.results[0].snippet.name.as_deref(), Some("fetch"));
}

#[tokio::test]
async fn test_incremental_update_keeps_readers_consistent() {
    let engine = hashing_engine();
    engine.build_corpus(sample_sources()).await.unwrap();
    let reader = engine.snapshot();
    let vectors_before = reader.index.vector_count();

    engine
        .update_file(SourceFile::new("algorithms/sort.py", "def merge_sort(xs):\n    return sorted(xs)\n"))
        .await
        .unwrap();

    // the reader's generation still has the old file
    assert!(reader.snippets.values().any(|s| s.name.as_deref() == Some("bubble_sort")));
    assert_eq!(reader.index.vector_count(), vectors_before);

    let current = engine.snapshot();
    assert!(current.snippets.values().all(|s| s.name.as_deref() != Some("bubble_sort")));
    assert!(current.snippets.values().any(|s| s.name.as_deref() == Some("merge_sort")));
    assert_eq!(current.index.vector_count(), current.len());
}

#[tokio::test]
async fn test_start_lexical_only_and_hashing() {
    let mut config = Config::default();
    config.embedding.provider = "none".to_string();
    let engine = Engine::start(config).await.unwrap();
    assert!(engine.registry().active().is_none());

    let engine = Engine::start(Config::default()).await.unwrap();
    assert!(engine.registry().is_available("hashing-384"));
}

#[tokio::test]
async fn test_start_fails_when_embedding_service_is_unreachable() {
    let mut config = Config::default();
    config.embedding.provider = "ollama".to_string();
    config.embedding.base_url = "http://127.0.0.1:9".to_string();
    config.embedding.max_retries = 0;
    config.embedding.timeout_secs = 1;

    match Engine::start(config).await {
        Err(ConfigError::EmbeddingUnavailable { model, .. }) => {
            assert!(model.contains("nomic-embed-text"))
        }
        Err(other) => panic!("expected EmbeddingUnavailable, got {other}"),
        Ok(_) => panic!("engine started without its embedding service"),
    }
}

#[tokio::test]
async fn test_start_rejects_invalid_weights() {
    let mut config = Config::default();
    config.ranking.weights.keyword_match = 0.2;
    assert!(matches!(
        Engine::start(config).await,
        Err(ConfigError::InvalidWeights(_))
    ));
}

#[tokio::test]
async fn test_start_rejects_default_page_size_above_max() {
    let mut config = Config::default();
    config.search.default_page_size = 200;
    assert!(matches!(
        Engine::start(config).await,
        Err(ConfigError::InvalidValue { field: "search.default_page_size", .. })
    ));
}

#[test]
fn test_popularity_and_recency_scenarios() {
    let now = Utc::now();
    let source = SourceFile::new("algorithms/sort.py", BUBBLE_SORT);
    let fresh = source.clone().with_meta(SourceMeta {
        repository: Some("algos".to_string()),
        created_at: Some(now - Duration::days(10)),
        stars: 0,
    });
    let stale = source.with_meta(SourceMeta {
        repository: Some("algos".to_string()),
        created_at: Some(now - Duration::days(800)),
        stars: 0,
    });

    let engine = RankingEngine::new(Config::default().ranking);
    let query = QueryProcessor::new().process_with_rules("sort", true);
    let candidates = |file: &SourceFile| -> Vec<Candidate> {
        code_search::chunking::extract(file)
            .into_iter()
            .map(|s| Candidate {
                highlighted: s.content.clone(),
                snippet: Arc::new(s),
                similarity: 0.5,
                match_type: code_search::models::MatchType::ContentMatch,
            })
            .collect()
    };

    let ranked = engine.rank_at(candidates(&fresh), &query, &QueryFilters::default(), now);
    assert_eq!(ranked[0].scores.popularity, 0.0);
    assert_eq!(ranked[0].scores.recency, 1.0);

    let ranked = engine.rank_at(candidates(&stale), &query, &QueryFilters::default(), now);
    assert_eq!(ranked[0].scores.recency, 0.2);
}

#[test]
fn test_extraction_is_deterministic() {
    for (path, source) in [
        ("sort.py", BUBBLE_SORT),
        ("search.js", LINEAR_SEARCH),
        ("client.rs", RUST_SOURCE),
    ] {
        let first = extract_snippets(path, source);
        let second = extract_snippets(path, source);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_indexing_same_id_twice_stores_one_vector() {
    let mut index = EmbeddingIndex::new(Some(Arc::new(HashingEmbedder::new(64))));
    for _ in 0..2 {
        assert!(index.index("sort.py:1:8", BUBBLE_SORT).await);
    }
    assert_eq!(index.vector_count(), 1);
    assert!(!index.remove("missing:1:1"));
}

#[test]
fn test_expansion_only_adds_keywords() {
    let processor = QueryProcessor::new();
    let base = processor.process_with_rules("quick sort", true);
    let extended = processor.process_with_rules("quick sort sorting", true);
    assert!(extended.keywords.is_superset(&base.keywords));
    assert!(base.expansion_terms.contains(&"sorting".to_string()));
    assert!(extract_keywords(&extended.raw).contains("sorting"));
}

proptest! {
    #[test]
    fn prop_snippet_spans_match_source(
        names in proptest::collection::vec("[a-z]{3,10}", 1..6),
        body_lines in 1usize..5,
        crlf in any::<bool>(),
    ) {
        let eol = if crlf { "\r\n" } else { "\n" };
        let mut source = String::new();
        for name in &names {
            source.push_str(&format!("def {name}(x):{eol}"));
            for i in 0..body_lines {
                source.push_str(&format!("    x = x + {i}{eol}"));
            }
            source.push_str(&format!("    return x{eol}{eol}"));
        }

        let lines: Vec<&str> = source.split('\n').collect();
        for snippet in extract_snippets("gen.py", &source) {
            prop_assert!(snippet.start_line >= 1);
            prop_assert!(snippet.start_line <= snippet.end_line);
            prop_assert_eq!(
                &snippet.content,
                &lines[snippet.start_line - 1..snippet.end_line].join("\n")
            );
            prop_assert!((1.0..=10.0).contains(&snippet.quality_score));
        }
    }
}

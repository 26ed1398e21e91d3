use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub ranking: RankingConfig,
    pub indexing: IndexingConfig,
    pub embedding: EmbeddingConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Used when a request does not set `max_results`
    pub default_max_results: usize,
    /// Upper bound enforced on every request
    pub max_results_cap: usize,
    pub default_similarity_threshold: f32,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Budget for one semantic lookup before falling back to lexical scoring
    pub semantic_timeout_ms: u64,
    pub lexical: LexicalWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_results: 50,
            max_results_cap: 100,
            default_similarity_threshold: 0.7,
            default_page_size: 20,
            max_page_size: 100,
            semantic_timeout_ms: 2_000,
            lexical: LexicalWeights::default(),
        }
    }
}

/// Additive constants of the lexical relevance rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalWeights {
    pub content: f32,
    pub name: f32,
    pub description: f32,
    /// Added once per matching tag
    pub tag: f32,
    pub language: f32,
    pub kind: f32,
    pub file_path: f32,
    pub token_in_content: f32,
    pub token_in_name: f32,
    pub token_in_description: f32,
    /// Multiplied by the 1-10 quality score
    pub quality_factor: f32,
}

impl Default for LexicalWeights {
    fn default() -> Self {
        Self {
            content: 0.8,
            name: 0.9,
            description: 0.7,
            tag: 0.6,
            language: 0.5,
            kind: 0.4,
            file_path: 0.3,
            token_in_content: 0.1,
            token_in_name: 0.2,
            token_in_description: 0.15,
            quality_factor: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    pub caps: BoostCaps,
    /// Quality boost when the snippet language is in the requested languages
    pub language_boost: f32,
    /// Quality boost when the snippet repository is in the requested repositories
    pub repository_boost: f32,
    /// Quality boost when the snippet complexity is in the requested levels
    pub complexity_boost: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            caps: BoostCaps::default(),
            language_boost: 1.2,
            repository_boost: 1.1,
            complexity_boost: 1.1,
        }
    }
}

/// Weights of the six sub-scores. Intended to sum to 1.0; checked by
/// [`Config::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub semantic_similarity: f32,
    pub keyword_match: f32,
    pub code_quality: f32,
    pub popularity: f32,
    pub recency: f32,
    pub documentation: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            semantic_similarity: 0.4,
            keyword_match: 0.3,
            code_quality: 0.1,
            popularity: 0.1,
            recency: 0.05,
            documentation: 0.05,
        }
    }
}

impl RankingWeights {
    pub fn sum(&self) -> f32 {
        self.semantic_similarity
            + self.keyword_match
            + self.code_quality
            + self.popularity
            + self.recency
            + self.documentation
    }

    fn any_negative(&self) -> bool {
        [
            self.semantic_similarity,
            self.keyword_match,
            self.code_quality,
            self.popularity,
            self.recency,
            self.documentation,
        ]
        .iter()
        .any(|w| *w < 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostCaps {
    pub quality: f32,
    pub popularity: f32,
    pub recency: f32,
    pub documentation: f32,
}

impl Default for BoostCaps {
    fn default() -> Self {
        Self {
            quality: 2.0,
            popularity: 1.5,
            recency: 1.3,
            documentation: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,
    /// Glob patterns matched against root-relative paths
    pub excluded_patterns: Vec<String>,
    /// Worker limit for extraction and embedding
    pub concurrency: usize,
    pub embed_batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            excluded_patterns: [
                "**/node_modules/**",
                "**/__pycache__/**",
                "**/.git/**",
                "**/dist/**",
                "**/build/**",
                "**/target/**",
                "**/.venv/**",
                "**/venv/**",
                "**/*.min.js",
                "**/*.log",
                "**/*.tmp",
                "**/*.cache",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            concurrency: 4,
            embed_batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "none", "hashing", "ollama", "openai" or "hybrid" (remote + hashing averaged)
    pub provider: String,
    /// Base URL for the remote embedding API
    pub base_url: String,
    /// Remote model name
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Vector dimension every strategy must produce
    pub dimension: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures of the remote service
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            dimension: 384,
            timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

/// Zero-shot intent classification over a chat API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// "none", "ollama" or "openai"
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CODE_SEARCH_MAX_RESULTS") {
            if let Ok(v) = val.parse() {
                config.search.default_max_results = v;
            }
        }
        if let Ok(val) = std::env::var("CODE_SEARCH_MAX_RESULTS_CAP") {
            if let Ok(v) = val.parse() {
                config.search.max_results_cap = v;
            }
        }
        if let Ok(val) = std::env::var("CODE_SEARCH_SIMILARITY_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.search.default_similarity_threshold = v;
            }
        }
        if let Ok(val) = std::env::var("CODE_SEARCH_SEMANTIC_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                config.search.semantic_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("CODE_SEARCH_MAX_FILE_SIZE") {
            if let Ok(v) = val.parse() {
                config.indexing.max_file_size = v;
            }
        }
        if let Ok(val) = std::env::var("CODE_SEARCH_CONCURRENCY") {
            if let Ok(v) = val.parse() {
                config.indexing.concurrency = v;
            }
        }
        if let Ok(val) = std::env::var("CODE_SEARCH_EXCLUDED_PATTERNS") {
            config.indexing.excluded_patterns = val
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }

        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.embedding.dimension = d;
            }
        }
        if let Ok(val) = std::env::var("EMBEDDING_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.embedding.timeout_secs = v.min(60);
            }
        }
        if let Ok(val) = std::env::var("EMBEDDING_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                config.embedding.max_retries = v;
            }
        }

        if let Ok(provider) = std::env::var("INTENT_PROVIDER") {
            config.classifier.provider = provider;
        }
        if let Ok(url) = std::env::var("INTENT_BASE_URL") {
            config.classifier.base_url = url;
        }
        if let Ok(model) = std::env::var("INTENT_MODEL") {
            config.classifier.model = model;
        }
        if let Ok(key) = std::env::var("INTENT_API_KEY") {
            config.classifier.api_key = Some(key);
        }

        config
    }

    /// Load from a TOML file. Missing sections and fields take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = &self.ranking.weights;
        let sum = weights.sum();
        if weights.any_negative() || (sum - 1.0).abs() > 1e-3 {
            return Err(ConfigError::InvalidWeights(sum));
        }

        let caps = &self.ranking.caps;
        if [caps.quality, caps.popularity, caps.recency, caps.documentation]
            .iter()
            .any(|c| *c < 1.0)
        {
            return Err(ConfigError::InvalidValue {
                field: "ranking.caps",
                reason: "boost caps must be at least 1.0".to_string(),
            });
        }

        let threshold = self.search.default_similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue {
                field: "search.default_similarity_threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        if self.search.max_results_cap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_results_cap",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.search.max_page_size == 0 || self.search.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_page_size",
                reason: "page sizes must be greater than zero".to_string(),
            });
        }
        if self.search.default_max_results > self.search.max_results_cap {
            return Err(ConfigError::InvalidValue {
                field: "search.default_max_results",
                reason: format!(
                    "{} exceeds max_results_cap {}",
                    self.search.default_max_results, self.search.max_results_cap
                ),
            });
        }
        if self.search.default_page_size > self.search.max_page_size {
            return Err(ConfigError::InvalidValue {
                field: "search.default_page_size",
                reason: format!(
                    "{} exceeds max_page_size {}",
                    self.search.default_page_size, self.search.max_page_size
                ),
            });
        }
        if self.indexing.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "indexing.concurrency",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.dimension",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !matches!(
            self.embedding.provider.as_str(),
            "none" | "hashing" | "ollama" | "openai" | "hybrid"
        ) {
            return Err(ConfigError::InvalidValue {
                field: "embedding.provider",
                reason: format!("unknown provider {}", self.embedding.provider),
            });
        }
        if !matches!(self.classifier.provider.as_str(), "none" | "ollama" | "openai") {
            return Err(ConfigError::InvalidValue {
                field: "classifier.provider",
                reason: format!("unknown provider {}", self.classifier.provider),
            });
        }
        for pattern in &self.indexing.excluded_patterns {
            globset::Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
                field: "indexing.excluded_patterns",
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

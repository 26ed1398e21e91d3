use thiserror::Error;

/// A search request the caller has to fix. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("query text is required")]
    EmptyQuery,

    #[error("page must be 1 or greater, got {0}")]
    InvalidPage(usize),

    #[error("page_size must be between 1 and {max}, got {got}")]
    InvalidPageSize { got: usize, max: usize },

    #[error("similarity_threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),
}

/// Configuration problems found at load or startup. These keep the engine
/// from reporting itself ready.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ranking weights must be non-negative and sum to 1.0, got a sum of {0:.3}")]
    InvalidWeights(f32),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("embedding strategy {model} is unavailable: {reason}")]
    EmbeddingUnavailable { model: String, reason: String },
}

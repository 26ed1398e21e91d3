//! Embedding strategies and the registry negotiated at startup.
//!
//! Every strategy declares a model id and a fixed dimension. Failures are
//! reported as `None`; nothing here returns a model-level error to callers.

pub mod hashing;
pub mod hybrid;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::ConfigError;
use crate::llm::embeddings::RemoteEmbedder;

pub use hashing::HashingEmbedder;
pub use hybrid::HybridEmbedder;

/// Text to fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// One slot per input, `None` where that text could not be embedded.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await);
        }
        out
    }
}

/// A strategy the registry knows about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    pub model_id: String,
    pub dimension: usize,
    pub available: bool,
}

/// Which embedding strategies exist and which one the index uses.
#[derive(Clone, Default)]
pub struct EmbeddingRegistry {
    strategies: Vec<StrategyInfo>,
    active: Option<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for EmbeddingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingRegistry")
            .field("strategies", &self.strategies)
            .field("active", &self.active.as_ref().map(|e| e.model_id().to_string()))
            .finish()
    }
}

impl EmbeddingRegistry {
    /// No embedding at all; searches run on lexical scoring.
    pub fn lexical_only() -> Self {
        Self::default()
    }

    /// Register a single strategy without probing it.
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            strategies: vec![StrategyInfo {
                model_id: embedder.model_id().to_string(),
                dimension: embedder.dimension(),
                available: true,
            }],
            active: Some(embedder),
        }
    }

    /// Build the configured strategies and probe each one once.
    ///
    /// A configured remote service that does not answer, or answers with the
    /// wrong dimension, is a fatal configuration error.
    pub async fn negotiate(
        config: &EmbeddingConfig,
        client: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let candidates: Vec<Arc<dyn Embedder>> = match config.provider.as_str() {
            "none" => return Ok(Self::lexical_only()),
            "hashing" => vec![Arc::new(HashingEmbedder::new(config.dimension))],
            "ollama" | "openai" => vec![Arc::new(RemoteEmbedder::new(client, config.clone()))],
            "hybrid" => vec![
                Arc::new(RemoteEmbedder::new(client, config.clone())),
                Arc::new(HashingEmbedder::new(config.dimension)),
            ],
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "embedding.provider",
                    reason: format!("unknown provider {other}"),
                })
            }
        };

        let mut strategies = Vec::with_capacity(candidates.len());
        for embedder in &candidates {
            probe(embedder.as_ref()).await?;
            tracing::info!(
                model = embedder.model_id(),
                dimension = embedder.dimension(),
                "embedding strategy available"
            );
            strategies.push(StrategyInfo {
                model_id: embedder.model_id().to_string(),
                dimension: embedder.dimension(),
                available: true,
            });
        }

        let active: Arc<dyn Embedder> = if candidates.len() > 1 {
            Arc::new(HybridEmbedder::new(candidates, config.dimension))
        } else {
            match candidates.into_iter().next() {
                Some(only) => only,
                None => return Ok(Self::lexical_only()),
            }
        };

        Ok(Self {
            strategies,
            active: Some(active),
        })
    }

    pub fn active(&self) -> Option<Arc<dyn Embedder>> {
        self.active.clone()
    }

    pub fn strategies(&self) -> &[StrategyInfo] {
        &self.strategies
    }

    pub fn is_available(&self, model_id: &str) -> bool {
        self.strategies
            .iter()
            .any(|s| s.model_id == model_id && s.available)
    }

    pub fn dimension(&self) -> Option<usize> {
        self.active.as_ref().map(|e| e.dimension())
    }
}

async fn probe(embedder: &dyn Embedder) -> Result<(), ConfigError> {
    match embedder.embed("probe").await {
        Some(v) if v.len() == embedder.dimension() => Ok(()),
        Some(v) => Err(ConfigError::EmbeddingUnavailable {
            model: embedder.model_id().to_string(),
            reason: format!(
                "declared dimension {} but produced {}",
                embedder.dimension(),
                v.len()
            ),
        }),
        None => Err(ConfigError::EmbeddingUnavailable {
            model: embedder.model_id().to_string(),
            reason: "probe request failed".to_string(),
        }),
    }
}

/// Scale a vector to unit length. Zero vectors are left as they are.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_negotiate_none_is_lexical_only() {
        let config = EmbeddingConfig {
            provider: "none".to_string(),
            ..Default::default()
        };
        let registry = EmbeddingRegistry::negotiate(&config, reqwest::Client::new())
            .await
            .unwrap();
        assert!(registry.active().is_none());
        assert!(registry.strategies().is_empty());
    }

    #[tokio::test]
    async fn test_negotiate_hashing() {
        let config = EmbeddingConfig {
            provider: "hashing".to_string(),
            dimension: 64,
            ..Default::default()
        };
        let registry = EmbeddingRegistry::negotiate(&config, reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(registry.dimension(), Some(64));
        assert!(registry.is_available("hashing-64"));
    }

    #[tokio::test]
    async fn test_negotiate_unreachable_remote_is_fatal() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            max_retries: 0,
            ..Default::default()
        };
        let result = EmbeddingRegistry::negotiate(&config, reqwest::Client::new()).await;
        assert!(matches!(
            result,
            Err(ConfigError::EmbeddingUnavailable { .. })
        ));
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;

/// Maximum characters to send per text to the embedding API.
/// nomic-embed-text has an 8 192-token context and dense code can reach
/// ~2.3 tokens per char, so 3 000 chars stays under the limit.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// A failed request, split by whether trying again can help.
#[derive(Debug)]
enum CallError {
    Transient(anyhow::Error),
    Permanent(anyhow::Error),
}

impl CallError {
    fn from_reqwest(err: reqwest::Error, what: &'static str) -> Self {
        let transient = err.is_timeout() || err.is_connect() || err.is_request();
        let err = anyhow::Error::new(err).context(what);
        if transient {
            CallError::Transient(err)
        } else {
            CallError::Permanent(err)
        }
    }

    fn from_status(status: reqwest::StatusCode, body: String, api: &str) -> Self {
        let err = anyhow::anyhow!("{api} embed API returned {status}: {body}");
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            CallError::Transient(err)
        } else {
            CallError::Permanent(err)
        }
    }

    fn into_inner(self) -> anyhow::Error {
        match self {
            CallError::Transient(e) | CallError::Permanent(e) => e,
        }
    }
}

/// Embedding service reached over HTTP (Ollama or OpenAI-compatible).
///
/// Transient failures are retried with exponential backoff up to
/// `max_retries` times; after that the batch is reported as missing.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
    model_id: String,
}

impl RemoteEmbedder {
    pub fn new(client: reqwest::Client, config: EmbeddingConfig) -> Self {
        let model_id = format!("{}:{}", config.provider, config.model);
        Self {
            client,
            config,
            model_id,
        }
    }

    /// Embed a batch, retrying transient failures.
    pub async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        let mut attempt = 0u32;
        loop {
            let result = match self.config.provider.as_str() {
                "openai" => self.embed_openai(&truncated).await,
                _ => self.embed_ollama(&truncated).await,
            };
            match result {
                Ok(vectors) => return Ok(vectors),
                Err(CallError::Transient(e)) if attempt < self.config.max_retries => {
                    let delay = self.config.retry_backoff_ms.saturating_mul(1 << attempt.min(10));
                    tracing::debug!(
                        model = %self.model_id,
                        attempt = attempt + 1,
                        "transient embedding failure, retrying in {delay}ms: {e:#}"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into_inner()),
            }
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CallError> {
        let url = format!("{}/api/embed", self.config.base_url);
        let req = OllamaEmbedRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
            truncate: true,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout())
            .json(&req)
            .send()
            .await
            .map_err(|e| CallError::from_reqwest(e, "Failed to call Ollama embed API"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CallError::from_status(status, body, "Ollama"));
        }

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse Ollama embed response")
            .map_err(CallError::Permanent)?;
        Ok(body.embeddings)
    }

    async fn embed_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CallError> {
        let url = format!("{}/v1/embeddings", self.config.base_url);
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let req = OpenAiEmbedRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
        };

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(|e| CallError::from_reqwest(e, "Failed to call OpenAI embed API"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CallError::from_status(status, body, "OpenAI"));
        }

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI embed response")
            .map_err(CallError::Permanent)?;
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .flatten()
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        if texts.is_empty() {
            return Vec::new();
        }
        match self.embed_with_retry(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors
                .into_iter()
                .map(|v| {
                    if v.len() == self.config.dimension {
                        Some(v)
                    } else {
                        tracing::warn!(
                            model = %self.model_id,
                            expected = self.config.dimension,
                            got = v.len(),
                            "embedding has unexpected dimension"
                        );
                        None
                    }
                })
                .collect(),
            Ok(vectors) => {
                tracing::warn!(
                    model = %self.model_id,
                    "embedding API returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                );
                vec![None; texts.len()]
            }
            Err(e) => {
                tracing::warn!(model = %self.model_id, "embedding request failed: {e:#}");
                vec![None; texts.len()]
            }
        }
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to truncate inputs over the context length instead of failing.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundary() {
        let short = "fn main() {}";
        assert_eq!(truncate_for_embedding(short), short);

        let long = "é".repeat(MAX_EMBED_CHARS);
        let cut = truncate_for_embedding(&long);
        assert!(cut.len() <= MAX_EMBED_CHARS);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_model_id_names_provider_and_model() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            ..Default::default()
        };
        let e = RemoteEmbedder::new(reqwest::Client::new(), config);
        assert_eq!(e.model_id(), "openai:text-embedding-3-small");
        assert_eq!(e.dimension(), 384);
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_none() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            max_retries: 1,
            retry_backoff_ms: 1,
            ..Default::default()
        };
        let e = RemoteEmbedder::new(reqwest::Client::new(), config);
        let out = e
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(out, vec![None, None]);
    }
}

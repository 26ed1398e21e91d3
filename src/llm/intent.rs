use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ClassifierConfig;
use crate::query::{Intent, IntentClassifier};

/// Zero-shot intent classifier backed by a chat model.
///
/// The model sees the intent labels and answers with one of them, or `none`.
pub struct LlmIntentClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl LlmIntentClassifier {
    pub fn new(client: reqwest::Client, config: ClassifierConfig) -> Self {
        Self { client, config }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.config.provider.as_str() {
            "ollama" => self.call_ollama(prompt).await,
            "openai" => self.call_openai(prompt).await,
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }

    async fn call_ollama(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.config.base_url);
        let req = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout())
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama chat API for intent classification")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama chat API returned {status}: {body}");
        }

        let body: OllamaChatResponse = resp.json().await?;
        Ok(body.message.content)
    }

    async fn call_openai(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let req = OpenAiChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.0,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .context("Failed to call OpenAI chat API for intent classification")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI chat API returned {status}: {body}");
        }

        let body: OpenAiChatResponse = resp.json().await?;
        Ok(body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, query: &str) -> Result<Option<Intent>> {
        let response = self.complete(&build_prompt(query)).await?;
        parse_intent(&response)
    }
}

fn build_prompt(query: &str) -> String {
    let labels: Vec<&str> = Intent::ALL.iter().map(|i| i.label()).collect();
    format!(
        "You classify code search queries. Pick the single label that best describes \
         what the user is looking for.\n\n\
         Labels: {}\n\n\
         Query: \"{query}\"\n\n\
         Respond with ONLY the label, or \"none\" if no label fits. No explanation.",
        labels.join(", ")
    )
}

/// Map a model answer back to an intent. The earliest label mentioned wins.
fn parse_intent(content: &str) -> Result<Option<Intent>> {
    let answer = content
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .to_lowercase();
    if answer == "none" {
        return Ok(None);
    }

    let best = Intent::ALL
        .iter()
        .filter_map(|intent| answer.find(intent.label()).map(|pos| (pos, *intent)))
        .min_by_key(|(pos, _)| *pos);
    match best {
        Some((_, intent)) => Ok(Some(intent)),
        None => anyhow::bail!("Unrecognized intent label: {content}"),
    }
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Message,
}

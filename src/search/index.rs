//! Embedding index: the active embedding strategy plus the vector store,
//! correlated with the corpus only by snippet id.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::models::Snippet;
use crate::search::vector::VectorStore;

#[derive(Clone)]
pub struct EmbeddingIndex {
    embedder: Option<Arc<dyn Embedder>>,
    store: VectorStore,
}

impl EmbeddingIndex {
    pub fn new(embedder: Option<Arc<dyn Embedder>>) -> Self {
        let store = match &embedder {
            Some(e) => VectorStore::with_dimension(e.dimension()),
            None => VectorStore::new(),
        };
        Self { embedder, store }
    }

    /// Whether semantic lookups can run at all.
    pub fn is_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.embedder.as_deref().map(|e| e.model_id())
    }

    /// Embed `text` and store it under `id`, replacing any previous vector.
    /// Returns false when embedding failed; the snippet is then only
    /// reachable lexically.
    pub async fn index(&mut self, id: &str, text: &str) -> bool {
        let Some(embedder) = &self.embedder else {
            return false;
        };
        match embedder.embed(text).await {
            Some(vector) => self.store.upsert(id, vector),
            None => {
                tracing::warn!(id, "embedding failed, snippet left out of semantic index");
                false
            }
        }
    }

    /// Store vectors computed elsewhere (batch indexing). Missing vectors are skipped.
    pub fn insert_vectors(&mut self, ids: &[String], vectors: Vec<Option<Vec<f32>>>) -> usize {
        let mut stored = 0;
        for (id, vector) in ids.iter().zip(vectors) {
            match vector {
                Some(v) => {
                    if self.store.upsert(id, v) {
                        stored += 1;
                    }
                }
                None => tracing::warn!(id = %id, "embedding failed, snippet left out of semantic index"),
            }
        }
        stored
    }

    /// Drop the vector for `id`. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        self.store.delete(id)
    }

    /// Nearest snippets to `text`. `None` when there is no embedder or the
    /// query itself could not be embedded.
    pub async fn query(&self, text: &str, k: usize, min_score: f32) -> Option<Vec<(String, f32)>> {
        let embedder = self.embedder.as_ref()?;
        let vector = embedder.embed(text).await?;
        Some(self.store.search(&vector, k, min_score))
    }

    pub fn vector_count(&self) -> usize {
        self.store.len()
    }

    pub fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.embedder.clone()
    }
}

/// Text handed to the embedder for a snippet: the code plus its metadata,
/// so vectors reflect names and docs as well as code.
pub fn embedding_text(snippet: &Snippet) -> String {
    let mut parts = Vec::new();
    if let Some(name) = &snippet.name {
        parts.push(format!("name: {name}"));
    }
    parts.push(format!("kind: {}", snippet.kind.as_str()));
    parts.push(format!("language: {}", snippet.language));
    parts.push(format!("description: {}", snippet.description));
    if !snippet.parameters.is_empty() {
        parts.push(format!("parameters: {}", snippet.parameters.join(", ")));
    }
    if let Some(ret) = &snippet.return_type {
        parts.push(format!("returns: {ret}"));
    }
    let keywords: Vec<String> = snippet.keywords().into_iter().collect();
    if !keywords.is_empty() {
        parts.push(format!("keywords: {}", keywords.join(" ")));
    }
    parts.push(snippet.content.clone());
    parts.join("\n")
}

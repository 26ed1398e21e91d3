use std::collections::BTreeMap;

use crate::embedding::l2_normalize;

/// In-memory vector store keyed by snippet id, searched by cosine similarity.
///
/// Vectors are L2-normalized on insert. The store is plain data: a new index
/// generation clones it, edits the clone, then publishes it.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    entries: BTreeMap<String, Vec<f32>>,
    dimension: Option<usize>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store only vectors of this length.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            dimension: Some(dimension),
        }
    }

    /// Insert or replace the vector for `id`. Returns false if the vector
    /// has the wrong dimension or is empty.
    pub fn upsert(&mut self, id: &str, mut vector: Vec<f32>) -> bool {
        if vector.is_empty() {
            return false;
        }
        match self.dimension {
            Some(dim) if dim != vector.len() => {
                tracing::warn!(id, expected = dim, got = vector.len(), "vector dimension mismatch");
                return false;
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }
        l2_normalize(&mut vector);
        self.entries.insert(id.to_string(), vector);
        true
    }

    /// Remove the vector for `id`. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Top `k` ids with `score >= min_score`, by descending score then ascending id.
    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Vec<(String, f32)> {
        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|(id, v)| (id, cosine_similarity(&query, v)))
            .filter(|(_, score)| *score >= min_score)
            .map(|(id, score)| (id.clone(), score))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

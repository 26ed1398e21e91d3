use async_trait::async_trait;
use std::sync::Arc;

use super::Embedder;

/// Averages the vectors of several strategies sharing one dimension.
///
/// With a single successful member its vector is returned untouched; with
/// none the result is `None`.
pub struct HybridEmbedder {
    members: Vec<Arc<dyn Embedder>>,
    dimension: usize,
    model_id: String,
}

impl HybridEmbedder {
    pub fn new(members: Vec<Arc<dyn Embedder>>, dimension: usize) -> Self {
        let ids: Vec<&str> = members.iter().map(|m| m.model_id()).collect();
        let model_id = format!("hybrid({})", ids.join("+"));
        Self {
            members,
            dimension,
            model_id,
        }
    }

    fn combine(&self, vectors: Vec<Vec<f32>>) -> Option<Vec<f32>> {
        let mut usable: Vec<Vec<f32>> = vectors
            .into_iter()
            .filter(|v| v.len() == self.dimension)
            .collect();
        match usable.len() {
            0 => None,
            1 => usable.pop(),
            n => {
                let mut avg = vec![0.0f32; self.dimension];
                for v in &usable {
                    for (acc, x) in avg.iter_mut().zip(v) {
                        *acc += x;
                    }
                }
                for x in avg.iter_mut() {
                    *x /= n as f32;
                }
                Some(avg)
            }
        }
    }
}

#[async_trait]
impl Embedder for HybridEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut vectors = Vec::with_capacity(self.members.len());
        for member in &self.members {
            match member.embed(text).await {
                Some(v) => vectors.push(v),
                None => tracing::debug!(model = member.model_id(), "hybrid member failed"),
            }
        }
        self.combine(vectors)
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut per_member = Vec::with_capacity(self.members.len());
        for member in &self.members {
            per_member.push(member.embed_batch(texts).await);
        }

        (0..texts.len())
            .map(|i| {
                let vectors = per_member
                    .iter()
                    .filter_map(|batch| batch.get(i).cloned().flatten())
                    .collect();
                self.combine(vectors)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        id: &'static str,
        value: Option<Vec<f32>>,
    }

    #[async_trait]
    impl Embedder for Fixed {
        fn model_id(&self) -> &str {
            self.id
        }
        fn dimension(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
            self.value.clone()
        }
    }

    fn fixed(id: &'static str, value: Option<Vec<f32>>) -> Arc<dyn Embedder> {
        Arc::new(Fixed { id, value })
    }

    #[tokio::test]
    async fn test_averages_successful_members() {
        let hybrid = HybridEmbedder::new(
            vec![fixed("a", Some(vec![1.0, 0.0])), fixed("b", Some(vec![0.0, 1.0]))],
            2,
        );
        assert_eq!(hybrid.model_id(), "hybrid(a+b)");
        assert_eq!(hybrid.embed("x").await, Some(vec![0.5, 0.5]));
    }

    #[tokio::test]
    async fn test_single_success_is_untouched() {
        let hybrid = HybridEmbedder::new(
            vec![fixed("a", None), fixed("b", Some(vec![0.3, 0.4]))],
            2,
        );
        assert_eq!(hybrid.embed("x").await, Some(vec![0.3, 0.4]));
    }

    #[tokio::test]
    async fn test_all_failed_is_none() {
        let hybrid = HybridEmbedder::new(vec![fixed("a", None), fixed("b", None)], 2);
        assert_eq!(hybrid.embed("x").await, None);
        let batch = hybrid.embed_batch(&["x".to_string(), "y".to_string()]).await;
        assert_eq!(batch, vec![None, None]);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_ignored() {
        let hybrid = HybridEmbedder::new(
            vec![fixed("a", Some(vec![1.0, 2.0, 3.0])), fixed("b", Some(vec![0.6, 0.8]))],
            2,
        );
        assert_eq!(hybrid.embed("x").await, Some(vec![0.6, 0.8]));
    }
}

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::Snippet;
use crate::search::index::EmbeddingIndex;

/// One immutable version of the corpus and its embedding index.
///
/// Builders clone the current generation, edit the clone and publish it;
/// readers keep whatever generation they started with.
#[derive(Clone)]
pub struct Generation {
    pub number: u64,
    pub snippets: BTreeMap<String, Arc<Snippet>>,
    /// File path to the ids of its snippets
    pub files: BTreeMap<String, Vec<String>>,
    pub index: EmbeddingIndex,
    pub published_at: DateTime<Utc>,
}

impl Generation {
    pub fn empty(index: EmbeddingIndex) -> Self {
        Self {
            number: 0,
            snippets: BTreeMap::new(),
            files: BTreeMap::new(),
            index,
            published_at: Utc::now(),
        }
    }

    pub fn snippet(&self, id: &str) -> Option<&Arc<Snippet>> {
        self.snippets.get(id)
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Replace everything known about `path` with `snippets`. Returns the
    /// snippets that were added, for embedding.
    pub fn replace_file(&mut self, path: &str, snippets: Vec<Snippet>) -> Vec<Arc<Snippet>> {
        self.remove_file(path);
        let added: Vec<Arc<Snippet>> = snippets.into_iter().map(Arc::new).collect();
        if added.is_empty() {
            return added;
        }
        let ids = added.iter().map(|s| s.id.clone()).collect();
        for snippet in &added {
            self.snippets.insert(snippet.id.clone(), Arc::clone(snippet));
        }
        self.files.insert(path.to_string(), ids);
        added
    }

    /// Drop a file's snippets and vectors. Unknown paths are a no-op.
    pub fn remove_file(&mut self, path: &str) -> usize {
        let Some(ids) = self.files.remove(path) else {
            return 0;
        };
        for id in &ids {
            self.snippets.remove(id);
            self.index.remove(id);
        }
        ids.len()
    }
}

/// Holder of the published generation.
pub struct IndexState {
    current: RwLock<Arc<Generation>>,
}

impl IndexState {
    pub fn new(initial: Generation) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The generation visible right now. Cheap; never blocks on builders.
    pub fn snapshot(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read())
    }

    /// Publish `next` as the successor of the current generation and return
    /// its number.
    pub fn publish(&self, mut next: Generation) -> u64 {
        let mut current = self.current.write();
        next.number = current.number + 1;
        next.published_at = Utc::now();
        let number = next.number;
        *current = Arc::new(next);
        number
    }
}

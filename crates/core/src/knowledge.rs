//! Knowledge store: reference passages queryable by semantic similarity.

use crate::embeddings::embed_batched;
use crate::guidelines::GuidelineSet;
use crate::models::ReferencePassage;
use crate::vectorstore::{VectorRecord, VectorStore};
use providers::EmbeddingProvider;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Adds passages whose id is not stored yet. Re-adding an id is a no-op.
    async fn upsert(&self, passages: &[ReferencePassage]) -> anyhow::Result<usize>;
    /// Up to `k` passage texts ranked by similarity to `text`, most similar
    /// first. Empty when the store is empty.
    async fn query(&self, text: &str, k: usize) -> anyhow::Result<Vec<String>>;
    async fn count(&self) -> anyhow::Result<u64>;
}

/// Knowledge store composed of an embedding provider and a vector store.
pub struct EmbeddedKnowledgeStore {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Box<dyn VectorStore>,
    batch_size: usize,
}

impl EmbeddedKnowledgeStore {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Box<dyn VectorStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            vectors,
            batch_size,
        }
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for EmbeddedKnowledgeStore {
    async fn upsert(&self, passages: &[ReferencePassage]) -> anyhow::Result<usize> {
        let ids: Vec<String> = passages.iter().map(|p| p.id.clone()).collect();
        let present = self.vectors.existing_ids(&ids).await?;

        // Skip stored ids and duplicates within the batch to avoid re-embedding.
        let mut seen = HashSet::new();
        let fresh: Vec<&ReferencePassage> = passages
            .iter()
            .filter(|p| !present.contains(&p.id) && seen.insert(p.id.as_str()))
            .collect();
        if fresh.is_empty() {
            debug!(skipped = passages.len(), "all passages already stored");
            return Ok(0);
        }

        let texts: Vec<String> = fresh.iter().map(|p| p.text.clone()).collect();
        let vectors = embed_batched(self.embedder.as_ref(), &texts, self.batch_size).await?;
        let records = fresh
            .iter()
            .zip(vectors)
            .map(|(p, vector)| VectorRecord {
                id: p.id.clone(),
                text: p.text.clone(),
                vector,
            })
            .collect::<Vec<_>>();
        let added = records.len();
        self.vectors.insert(records).await?;
        Ok(added)
    }

    async fn query(&self, text: &str, k: usize) -> anyhow::Result<Vec<String>> {
        if k == 0 || self.vectors.count().await? == 0 {
            return Ok(Vec::new());
        }
        let mut vectors = embed_batched(self.embedder.as_ref(), &[text.to_string()], 1).await?;
        let Some(vector) = vectors.pop() else {
            return Ok(Vec::new());
        };
        let hits = self.vectors.search(&vector, k).await?;
        Ok(hits.into_iter().map(|h| h.text).collect())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        self.vectors.count().await
    }
}

/// Makes sure every passage of `guidelines` is stored. Stores that already
/// hold the set are reused without embedding anything.
pub async fn populate(store: &dyn KnowledgeStore, guidelines: &GuidelineSet) -> anyhow::Result<usize> {
    let added = store.upsert(&guidelines.passages).await?;
    let total = store.count().await?;
    if added > 0 {
        info!(set = %guidelines.name, added, total, "knowledge store populated");
    } else {
        info!(set = %guidelines.name, total, "reusing existing knowledge store");
    }
    Ok(added)
}

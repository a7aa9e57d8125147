use providers::qdrant::{QdrantClient, QdrantPoint};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use storage::models::PassageRow;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredText {
    pub id: String,
    pub text: String,
    pub score: f32,
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Subset of `ids` already stored.
    async fn existing_ids(&self, ids: &[String]) -> anyhow::Result<HashSet<String>>;
    /// Stores records whose id is not yet present; existing ids are left untouched.
    async fn insert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()>;
    /// Up to `k` records, most similar first.
    async fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredText>>;
    async fn count(&self) -> anyhow::Result<u64>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0f32;
    let mut norm_a = 0f32;
    let mut norm_b = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Number of records whose vector length differs from `dim`.
fn mismatched_dimensions(records: &[VectorRecord], dim: usize) -> usize {
    records.iter().filter(|r| r.vector.len() != dim).count()
}

/// SQLite-backed store; vectors are cached in memory and ranked in process.
pub struct LocalVectorStore {
    pool: SqlitePool,
    cache: RwLock<Vec<VectorRecord>>,
}

impl LocalVectorStore {
    /// Opens (creating and migrating if needed) the store at `path`.
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let pool = storage::connect(path).await?;
        storage::migrate(&pool).await?;
        let mut cached = Vec::new();
        for row in storage::load_passages(&pool).await? {
            match row.embedding() {
                Ok(vector) => cached.push(VectorRecord {
                    id: row.id,
                    text: row.text,
                    vector,
                }),
                Err(e) => {
                    warn!(id = %row.id, error = %e, "skipping passage with unreadable embedding")
                }
            }
        }
        Ok(Self {
            pool,
            cache: RwLock::new(cached),
        })
    }

    fn read_cache(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, Vec<VectorRecord>>> {
        self.cache
            .read()
            .map_err(|_| anyhow::anyhow!("vector cache lock poisoned"))
    }
}

#[async_trait::async_trait]
impl VectorStore for LocalVectorStore {
    async fn existing_ids(&self, ids: &[String]) -> anyhow::Result<HashSet<String>> {
        storage::existing_ids(&self.pool, ids).await
    }

    async fn insert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let present = self.existing_ids(&ids).await?;
        let mut seen = HashSet::new();
        let fresh: Vec<VectorRecord> = records
            .into_iter()
            .filter(|r| !present.contains(&r.id) && seen.insert(r.id.clone()))
            .collect();
        let rows: Vec<PassageRow> = fresh
            .iter()
            .map(|r| PassageRow::new(&r.id, &r.text, &r.vector))
            .collect();
        storage::insert_passages(&self.pool, &rows).await?;
        self.cache
            .write()
            .map_err(|_| anyhow::anyhow!("vector cache lock poisoned"))?
            .extend(fresh);
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredText>> {
        let cache = self.read_cache()?;
        let mismatched = mismatched_dimensions(&cache, vector.len());
        if mismatched > 0 {
            warn!(
                query_dim = vector.len(),
                mismatched,
                stored = cache.len(),
                "stored vectors differ in dimension from the query; they score 0, re-ingest with the current embedder"
            );
        }
        let mut scored: Vec<ScoredText> = cache
            .iter()
            .map(|r| ScoredText {
                id: r.id.clone(),
                text: r.text.clone(),
                score: cosine_similarity(vector, &r.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> anyhow::Result<u64> {
        storage::count_passages(&self.pool).await
    }
}

/// Remote Qdrant collection. Passage ids are mapped to UUID point ids and
/// kept in the payload.
pub struct QdrantStore {
    client: QdrantClient,
}

impl QdrantStore {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

/// Deterministic UUID-formatted point id for a passage id.
pub fn point_id(passage_id: &str) -> String {
    let hash = blake3::hash(passage_id.as_bytes()).to_hex();
    format!(
        "{}-{}-{}-{}-{}",
        &hash[0..8],
        &hash[8..12],
        &hash[12..16],
        &hash[16..20],
        &hash[20..32]
    )
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn existing_ids(&self, ids: &[String]) -> anyhow::Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let by_point: HashMap<String, &String> = ids.iter().map(|id| (point_id(id), id)).collect();
        let mut present = HashSet::new();
        for batch in by_point.keys().cloned().collect::<Vec<_>>().chunks(256) {
            let resp = self.client.retrieve(batch.to_vec()).await?;
            for point in resp.result {
                if let Some(id) = point.id.as_str().and_then(|p| by_point.get(p)) {
                    present.insert((*id).clone());
                }
            }
        }
        Ok(present)
    }

    async fn insert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        let Some(dim) = records.first().map(|r| r.vector.len()) else {
            return Ok(());
        };
        self.client.ensure_collection(dim).await?;
        let points = records
            .into_iter()
            .map(|r| {
                let mut payload = HashMap::new();
                payload.insert("passage_id".to_string(), serde_json::json!(r.id));
                payload.insert("text".to_string(), serde_json::json!(r.text));
                QdrantPoint {
                    id: point_id(&r.id),
                    vector: r.vector,
                    payload,
                }
            })
            .collect();
        self.client.upsert(points).await?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredText>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let resp = self.client.search(vector.to_vec(), k as u64, None).await?;
        Ok(resp
            .result
            .into_iter()
            .filter_map(|r| {
                let payload = r.payload?;
                Some(ScoredText {
                    id: payload.get("passage_id")?.as_str()?.to_string(),
                    text: payload.get("text")?.as_str()?.to_string(),
                    score: r.score,
                })
            })
            .collect())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Ok(self.client.count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: format!("text of {id}"),
            vector,
        }
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn point_ids_are_uuid_shaped_and_stable() {
        let a = point_id("disclaimer-required");
        assert_eq!(a, point_id("disclaimer-required"));
        assert_eq!(a.len(), 36);
        assert_eq!(a.matches('-').count(), 4);
    }

    #[tokio::test]
    async fn embedder_change_is_detected_at_search() {
        let store = LocalVectorStore::open("sqlite::memory:").await.unwrap();
        store
            .insert(vec![
                record("old-a", vec![1.0, 0.0, 0.0]),
                record("old-b", vec![0.0, 1.0, 0.0]),
                record("new", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(mismatched_dimensions(&store.read_cache().unwrap(), 2), 2);
        assert_eq!(mismatched_dimensions(&store.read_cache().unwrap(), 3), 1);

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits[0].id, "new");
        assert!(hits[1..].iter().all(|h| h.score == 0.0));
    }

    #[tokio::test]
    async fn local_store_ranks_and_dedupes() {
        let store = LocalVectorStore::open("sqlite::memory:").await.unwrap();
        assert!(store.search(&[1.0, 0.0], 3).await.unwrap().is_empty());

        store
            .insert(vec![
                record("x", vec![1.0, 0.0]),
                record("y", vec![0.0, 1.0]),
                record("xy", vec![1.0, 1.0]),
                record("x", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        store.insert(vec![record("x", vec![0.5, 0.5])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let hits = store.search(&[1.0, 0.1], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "xy"]);
    }
}

//! In-process vector index with cosine ranking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

use docflow_core::{Error, IndexEntry, QueryHit, Result, VectorIndex};

/// Cosine similarity between two equal-length vectors.
///
/// Zero-magnitude vectors score 0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a > 0.0 && mag_b > 0.0 {
        dot / (mag_a * mag_b)
    } else {
        0.0
    }
}

/// Whether `metadata` contains every key of `filter` with an equal value.
fn matches_filter(metadata: &JsonValue, filter: &JsonValue) -> bool {
    match filter.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected)),
        // A non-object filter matches nothing rather than everything.
        None => false,
    }
}

/// In-memory vector index with a fixed dimension.
///
/// `score = 1 − cosine distance`, i.e. plain cosine similarity. Results are
/// sorted descending by score; hits below the query threshold are excluded.
#[derive(Clone)]
pub struct MemoryVectorIndex {
    dimension: usize,
    entries: Arc<RwLock<HashMap<Uuid, IndexEntry>>>,
}

impl MemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_dimension(&self, len: usize, id: Uuid) -> Result<()> {
        if len != self.dimension {
            return Err(Error::VectorStore(format!(
                "Dimension mismatch for {}: expected {}, got {}",
                id, self.dimension, len
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<()> {
        self.check_dimension(entry.vector.len(), entry.id)?;
        let mut entries = self.entries.write().await;
        entries.insert(entry.id, entry);
        Ok(())
    }

    async fn batch_upsert(&self, batch: Vec<IndexEntry>) -> Result<()> {
        // Validate the whole batch up front so a mid-batch mismatch cannot
        // leave a partial write.
        for entry in &batch {
            self.check_dimension(entry.vector.len(), entry.id)?;
        }
        let mut entries = self.entries.write().await;
        for entry in batch {
            entries.insert(entry.id, entry);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&JsonValue>,
        threshold: f32,
    ) -> Result<Vec<QueryHit>> {
        self.check_dimension(vector.len(), Uuid::nil())?;
        let entries = self.entries.read().await;

        let mut hits: Vec<QueryHit> = entries
            .values()
            .filter(|e| match filter {
                Some(f) => matches_filter(&e.metadata, f),
                None => true,
            })
            .map(|e| QueryHit {
                id: e.id,
                score: cosine_similarity(vector, &e.vector),
                metadata: e.metadata.clone(),
                snippet: e.snippet.clone(),
            })
            .filter(|h| h.score >= threshold)
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        trace!(hits = hits.len(), top_k, threshold, "Index query");
        Ok(hits)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: Uuid, vector: Vec<f32>, metadata: JsonValue) -> IndexEntry {
        IndexEntry {
            id,
            vector,
            metadata,
            snippet: "snippet".to_string(),
        }
    }

    #[test]
    fn test_cosine_similarity_basics() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_upsert_then_query_round_trip() {
        let index = MemoryVectorIndex::new(3);
        let id = Uuid::new_v4();
        let vector = vec![0.3, 0.5, 0.2];
        index
            .upsert(entry(id, vector.clone(), json!({})))
            .await
            .unwrap();

        // The exact vector comes back first with score >= any threshold <= 1.
        for threshold in [0.0, 0.5, 0.99, 1.0] {
            let hits = index.query(&vector, 1, None, threshold).await.unwrap();
            assert_eq!(hits.len(), 1, "threshold {}", threshold);
            assert_eq!(hits[0].id, id);
            assert!(hits[0].score >= threshold - 1e-6);
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let index = MemoryVectorIndex::new(2);
        let id = Uuid::new_v4();
        index
            .upsert(entry(id, vec![1.0, 0.0], json!({"v": 1})))
            .await
            .unwrap();
        index
            .upsert(entry(id, vec![0.0, 1.0], json!({"v": 2})))
            .await
            .unwrap();

        assert_eq!(index.len().await, 1);
        let hits = index.query(&[0.0, 1.0], 1, None, 0.9).await.unwrap();
        assert_eq!(hits[0].metadata["v"], 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = MemoryVectorIndex::new(4);
        let result = index.upsert(entry(Uuid::new_v4(), vec![1.0, 2.0], json!({}))).await;
        assert!(matches!(result, Err(Error::VectorStore(_))));

        let result = index.query(&[1.0, 2.0], 1, None, 0.0).await;
        assert!(matches!(result, Err(Error::VectorStore(_))));
    }

    #[tokio::test]
    async fn test_batch_upsert_validates_before_writing() {
        let index = MemoryVectorIndex::new(2);
        let good = entry(Uuid::new_v4(), vec![1.0, 0.0], json!({}));
        let bad = entry(Uuid::new_v4(), vec![1.0], json!({}));

        let result = index.batch_upsert(vec![good, bad]).await;
        assert!(result.is_err());
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_sorted_descending_and_truncated() {
        let index = MemoryVectorIndex::new(2);
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();
        index
            .upsert(entry(near, vec![1.0, 0.1], json!({})))
            .await
            .unwrap();
        index
            .upsert(entry(far, vec![0.1, 1.0], json!({})))
            .await
            .unwrap();
        index
            .upsert(entry(Uuid::new_v4(), vec![-1.0, 0.0], json!({})))
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2, None, 0.0).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, near);
        assert_eq!(hits[1].id, far);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_query_threshold_excludes() {
        let index = MemoryVectorIndex::new(2);
        index
            .upsert(entry(Uuid::new_v4(), vec![0.0, 1.0], json!({})))
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 10, None, 0.5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_metadata_filter() {
        let index = MemoryVectorIndex::new(2);
        let legal = Uuid::new_v4();
        index
            .upsert(entry(legal, vec![1.0, 0.0], json!({"label": "legal"})))
            .await
            .unwrap();
        index
            .upsert(entry(
                Uuid::new_v4(),
                vec![1.0, 0.0],
                json!({"label": "medical"}),
            ))
            .await
            .unwrap();

        let hits = index
            .query(&[1.0, 0.0], 10, Some(&json!({"label": "legal"})), 0.0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, legal);

        // Filtering happens before ranking: no filter key match, no hits.
        let hits = index
            .query(&[1.0, 0.0], 10, Some(&json!({"label": "academic"})), 0.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let index = MemoryVectorIndex::new(2);
        let id = Uuid::new_v4();
        index
            .upsert(entry(id, vec![1.0, 0.0], json!({})))
            .await
            .unwrap();

        index.delete(id).await.unwrap();
        assert!(index.is_empty().await);
        // Deleting again is a no-op.
        index.delete(id).await.unwrap();
    }
}

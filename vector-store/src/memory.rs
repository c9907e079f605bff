//! In-process vector index with exact cosine search.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use docqa_embeddings::similarity::nearest;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{IndexError, Result};
use crate::index::{DeleteFilter, IndexHit, IndexRecord, VectorIndex, source_of};

/// On-disk snapshot format.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    dimension: usize,
    records: Vec<IndexRecord>,
}

/// A brute-force vector index held in memory.
///
/// Every search scores all stored records, which is fine for the corpus sizes
/// of a single-user document collection. Distances are cosine distances in
/// `[0, 2]`.
pub struct InMemoryVectorIndex {
    /// Stored records by key.
    records: RwLock<HashMap<String, IndexRecord>>,

    /// Expected dimension of embeddings.
    dimension: usize,
}

impl InMemoryVectorIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            dimension,
        }
    }

    /// Expected embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    /// Serialize the index to JSON.
    pub async fn to_json(&self) -> Result<String> {
        let records = self.records.read().await;
        let mut records: Vec<IndexRecord> = records.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        let snapshot = Snapshot {
            dimension: self.dimension,
            records,
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// Load an index from JSON produced by [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;

        let mut records = HashMap::with_capacity(snapshot.records.len());
        for record in snapshot.records {
            if record.embedding.len() != snapshot.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: snapshot.dimension,
                    actual: record.embedding.len(),
                });
            }
            records.insert(record.key.clone(), record);
        }

        info!("Loaded {} records into vector index", records.len());
        Ok(Self {
            records: RwLock::new(records),
            dimension: snapshot.dimension,
        })
    }

    /// Write a snapshot to `path`, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json().await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, json).await?;
        debug!("Saved vector index to {}", path.display());
        Ok(())
    }

    /// Load a snapshot from `path`, or start empty when the file is missing.
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new(dimension));
        }
        let json = fs::read_to_string(path).await?;
        let index = Self::from_json(&json)?;
        if index.dimension != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: index.dimension,
            });
        }
        Ok(index)
    }
}

fn hit_from(record: &IndexRecord, distance: f32) -> IndexHit {
    IndexHit {
        key: record.key.clone(),
        text: record.text.clone(),
        metadata: record.metadata.clone(),
        distance,
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, records: Vec<IndexRecord>) -> Result<()> {
        for record in &records {
            self.check_dimension(record.embedding.len())?;
            if record.key.is_empty() {
                return Err(IndexError::InvalidRecord {
                    key: record.key.clone(),
                    reason: "empty key".to_string(),
                });
            }
        }

        let count = records.len();
        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(record.key.clone(), record);
        }
        debug!("Added {count} records to vector index");
        Ok(())
    }

    async fn search(&self, query: &[f32], n: usize) -> Result<Vec<IndexHit>> {
        self.check_dimension(query.len())?;

        let records = self.records.read().await;
        let candidates = records
            .values()
            .map(|r| (r.key.as_str(), r.embedding.as_slice()));
        let neighbors = nearest(query, candidates, n)?;

        Ok(neighbors
            .into_iter()
            .filter_map(|neighbor| {
                records
                    .get(&neighbor.id)
                    .map(|record| hit_from(record, neighbor.distance))
            })
            .collect())
    }

    async fn get(&self, keys: &[String]) -> Result<Vec<IndexHit>> {
        let records = self.records.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| records.get(key))
            .map(|record| hit_from(record, 0.0))
            .collect())
    }

    async fn delete(&self, filter: DeleteFilter) -> Result<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        match filter {
            DeleteFilter::Keys(keys) => {
                for key in keys {
                    records.remove(&key);
                }
            }
            DeleteFilter::Source(source) => {
                records.retain(|_, record| source_of(&record.metadata) != Some(source.as_str()));
            }
        }
        let removed = before - records.len();
        debug!("Deleted {removed} records from vector index");
        Ok(removed)
    }

    async fn list_sources(&self) -> Result<BTreeSet<String>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter_map(|record| source_of(&record.metadata))
            .map(str::to_string)
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(key: &str, text: &str, embedding: Vec<f32>, metadata: serde_json::Value) -> IndexRecord {
        IndexRecord {
            key: key.to_string(),
            text: text.to_string(),
            embedding,
            metadata,
        }
    }

    async fn seeded() -> InMemoryVectorIndex {
        let index = InMemoryVectorIndex::new(3);
        index
            .add(vec![
                record("a_chunk_0", "alpha", vec![1.0, 0.0, 0.0], json!({"source_id": "a"})),
                record("a_chunk_1", "beta", vec![0.0, 1.0, 0.0], json!({"source_id": "a"})),
                record("b_chunk_0", "gamma", vec![0.7, 0.7, 0.0], json!({"source_id": "b"})),
            ])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_search_orders_by_ascending_distance() {
        let index = seeded().await;
        let hits = index.search(&[1.0, 0.0, 0.0], 2).await.unwrap();

        let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["a_chunk_0", "b_chunk_0"]);
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn test_search_empty_index_is_empty() {
        let index = InMemoryVectorIndex::new(3);
        assert!(index.search(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_omits_missing_keys() {
        let index = seeded().await;
        let hits = index
            .get(&["a_chunk_1".to_string(), "a_chunk_9".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "beta");
        assert_eq!(hits[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_add_overwrites_existing_key() {
        let index = seeded().await;
        index
            .add(vec![record("a_chunk_0", "alpha v2", vec![1.0, 0.0, 0.0], json!({"source_id": "a"}))])
            .await
            .unwrap();

        assert_eq!(index.len().await.unwrap(), 3);
        let hits = index.get(&["a_chunk_0".to_string()]).await.unwrap();
        assert_eq!(hits[0].text, "alpha v2");
    }

    #[tokio::test]
    async fn test_delete_by_source_and_list_sources() {
        let index = seeded().await;
        assert_eq!(
            index.list_sources().await.unwrap(),
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );

        let removed = index.delete(DeleteFilter::Source("a".to_string())).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            index.list_sources().await.unwrap(),
            BTreeSet::from(["b".to_string()])
        );
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let index = InMemoryVectorIndex::new(3);
        let result = index
            .add(vec![record("bad", "x", vec![1.0, 0.0], json!({}))])
            .await;
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
        assert!(index.search(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.json");

        let index = seeded().await;
        index.save(&path).await.unwrap();

        let reopened = InMemoryVectorIndex::open(&path, 3).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 3);
        assert!(InMemoryVectorIndex::open(&path, 4).await.is_err());

        let missing = InMemoryVectorIndex::open(dir.path().join("none.json"), 3)
            .await
            .unwrap();
        assert!(missing.is_empty().await.unwrap());
    }
}

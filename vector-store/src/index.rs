//! The vector index contract consumed by the retrieval engine.

use std::collections::BTreeSet;

use async_trait::async_trait;
use docqa_embeddings::Embedding;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata field holding the source document identifier.
pub const SOURCE_FIELD: &str = "source_id";

/// A record to store in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Unique key; re-adding a key overwrites the previous record.
    pub key: String,

    /// The stored text.
    pub text: String,

    /// Embedding of `text`.
    pub embedding: Embedding,

    /// Free-form metadata.
    pub metadata: serde_json::Value,
}

/// A record returned from the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    /// Record key.
    pub key: String,

    /// Stored text.
    pub text: String,

    /// Stored metadata.
    pub metadata: serde_json::Value,

    /// Distance to the query (lower is closer). Zero for exact lookups.
    pub distance: f32,
}

/// Which records a delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteFilter {
    /// Delete these keys; unknown keys are ignored.
    Keys(Vec<String>),

    /// Delete every record whose [`SOURCE_FIELD`] metadata equals this value.
    Source(String),
}

/// A vector index offering similarity search and exact lookup.
///
/// Implementations must be safe for concurrent reads.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records.
    async fn add(&self, records: Vec<IndexRecord>) -> Result<()>;

    /// Return up to `n` records ordered by ascending distance to `query`.
    async fn search(&self, query: &[f32], n: usize) -> Result<Vec<IndexHit>>;

    /// Exact lookup; missing keys are omitted from the result.
    async fn get(&self, keys: &[String]) -> Result<Vec<IndexHit>>;

    /// Delete records, returning how many were removed.
    async fn delete(&self, filter: DeleteFilter) -> Result<usize>;

    /// Distinct values of the [`SOURCE_FIELD`] metadata field.
    async fn list_sources(&self) -> Result<BTreeSet<String>>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;

    /// Whether the index holds no records.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Read the source identifier from record metadata, if present.
pub fn source_of(metadata: &serde_json::Value) -> Option<&str> {
    metadata.get(SOURCE_FIELD).and_then(serde_json::Value::as_str)
}

//! Embedding cache for repeated texts.
//!
//! Questions are often asked more than once and re-ingesting a document
//! re-embeds unchanged fragments, so providers can be wrapped in a
//! [`CachedProvider`] that consults an [`EmbeddingCache`] first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// One cached vector, keyed by a hash of its text and model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub embedding: Embedding,
    pub model: String,

    /// Unix millis.
    pub created_at: i64,

    /// Insertion order; the smallest is evicted first.
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

impl CacheState {
    fn insert(&mut self, key: String, model: &str, embedding: Embedding, max_entries: usize) {
        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            let oldest = self
                .entries
                .values()
                .min_by_key(|entry| entry.sequence)
                .map(|entry| entry.key.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                embedding,
                model: model.to_string(),
                created_at: chrono::Utc::now().timestamp_millis(),
                sequence,
            },
        );
    }
}

/// Bounded embedding cache, optionally mirrored to a JSON file.
pub struct EmbeddingCache {
    state: RwLock<CacheState>,
    path: Option<PathBuf>,
    max_entries: usize,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            path: None,
            max_entries: max_entries.max(1),
        }
    }

    /// Open a cache backed by `path`, loading any entries already saved there.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = CacheState::default();

        if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let entries: Vec<CacheEntry> = serde_json::from_str(&content)?;
            state.next_sequence = entries.iter().map(|e| e.sequence + 1).max().unwrap_or(0);
            state.entries = entries.into_iter().map(|e| (e.key.clone(), e)).collect();
            info!("Loaded {} cached embeddings from {}", state.entries.len(), path.display());
        }

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
            max_entries: max_entries.max(1),
        })
    }

    /// Stable across runs, since keys are written to the cache file.
    fn key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let state = self.state.read().await;
        state
            .entries
            .get(&Self::key(text, model))
            .map(|entry| entry.embedding.clone())
    }

    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) -> Result<()> {
        self.put_many(vec![(text.to_string(), model.to_string(), embedding)])
            .await
    }

    /// Insert `(text, model, embedding)` triples, writing the file once.
    pub async fn put_many(&self, items: Vec<(String, String, Embedding)>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        {
            let mut state = self.state.write().await;
            for (text, model, embedding) in items {
                state.insert(Self::key(&text, &model), &model, embedding, self.max_entries);
            }
        }
        self.flush().await
    }

    pub async fn contains(&self, text: &str, model: &str) -> bool {
        self.state
            .read()
            .await
            .entries
            .contains_key(&Self::key(text, model))
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Write the cache to its backing file, if it has one.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = {
            let state = self.state.read().await;
            let mut entries: Vec<&CacheEntry> = state.entries.values().collect();
            entries.sort_by_key(|entry| entry.sequence);
            serde_json::to_string(&entries)?
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        debug!("Saved embedding cache to {}", path.display());
        Ok(())
    }
}

/// A wrapper that provides cached embedding generation.
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    fn model_for(&self, request: &EmbeddingRequest) -> String {
        request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = self.model_for(&request);

        if let Some(embedding) = self.cache.get(&request.text, &model).await {
            debug!("Cache hit for embedding");
            return Ok(EmbeddingResponse {
                dimension: embedding.len(),
                embedding,
                model,
                tokens_used: None,
            });
        }

        let text = request.text.clone();
        let response = self.provider.embed(request).await?;
        self.cache
            .put(&text, &model, response.embedding.clone())
            .await?;

        Ok(response)
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let mut slots: Vec<Option<EmbeddingResponse>> = Vec::with_capacity(requests.len());
        let mut misses = Vec::new();
        let mut miss_positions = Vec::new();

        for (position, request) in requests.into_iter().enumerate() {
            let model = self.model_for(&request);
            match self.cache.get(&request.text, &model).await {
                Some(embedding) => slots.push(Some(EmbeddingResponse {
                    dimension: embedding.len(),
                    embedding,
                    model,
                    tokens_used: None,
                })),
                None => {
                    slots.push(None);
                    miss_positions.push(position);
                    misses.push(request);
                }
            }
        }

        if !misses.is_empty() {
            debug!(
                "Embedding cache: {} hits, {} misses",
                slots.len() - misses.len(),
                misses.len()
            );
            let keys: Vec<(String, String)> = misses
                .iter()
                .map(|r| (r.text.clone(), self.model_for(r)))
                .collect();
            let generated = self.provider.embed_batch(misses).await?;
            let mut fresh = Vec::with_capacity(generated.len());
            for ((position, response), (text, model)) in
                miss_positions.into_iter().zip(generated).zip(keys)
            {
                fresh.push((text, model, response.embedding.clone()));
                slots[position] = Some(response);
            }
            self.cache.put_many(fresh).await?;
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}

//! Deterministic local embeddings via feature hashing.
//!
//! Each token is hashed into one of `dimension` buckets with a hash-derived
//! sign, and the resulting bag-of-words vector is L2-normalized. Texts that
//! share vocabulary end up close in cosine distance. No model files or
//! network access are needed, which makes this the provider for offline use
//! and tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::normalize;

const MODEL_NAME: &str = "feature-hashing-sha256";

/// Feature-hashing embedding provider.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    /// Create a provider producing vectors of `dimension` components.
    ///
    /// A dimension of zero is bumped to one so every vector has a slot.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed a single text synchronously.
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let hash = token_hash(&token);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

/// First eight bytes of the token's SHA-256, little-endian.
///
/// Vectors are persisted with the index, so the hash must not change between
/// builds or toolchains.
fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

/// Split text into lower-cased tokens.
///
/// ASCII alphanumeric runs form one token each; other alphabetic characters
/// (CJK text is rarely space-separated) are emitted one character per token.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            current.push(c.to_ascii_lowercase());
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if c.is_alphanumeric() {
            tokens.extend(c.to_lowercase().map(String::from));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn default_model(&self) -> &str {
        MODEL_NAME
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let embedding = self.embed_text(&request.text);
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: MODEL_NAME.to_string(),
            tokens_used: Some(tokenize(&request.text).len() as u64),
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

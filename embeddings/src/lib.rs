//! # Embeddings
//!
//! Semantic embedding generation and vector math for the document QA engine.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors (OpenAI API or a
//!   deterministic local hashing model)
//! - **Similarity Math**: Cosine similarity/distance and nearest-neighbour ranking
//! - **Caching**: Bounded, optionally persisted cache of computed embeddings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorIndex (vector-store) │
//! │       │                    │                                    │
//! │       ▼                    ▼                                    │
//! │  OpenAI/Hashing     cosine_distance                            │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  CachedProvider ──► EmbeddingCache                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod hashing;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use hashing::HashingProvider;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use similarity::{Neighbor, cosine_distance, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small

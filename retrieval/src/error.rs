//! Error types for the document QA engine.

use thiserror::Error;

/// Result type alias for QA operations.
pub type Result<T> = std::result::Result<T, QaError>;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Error, Debug)]
pub enum QaError {
    /// Embedding collaborator failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] docqa_embeddings::EmbeddingError),

    /// Vector index collaborator failed.
    #[error("index error: {0}")]
    Index(#[from] docqa_vector_store::IndexError),

    /// Answer generation failed.
    #[error("generation error: {0}")]
    Generation(String),

    /// Invalid configuration or parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

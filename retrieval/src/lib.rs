//! # Document QA Retrieval
//!
//! Answers natural-language questions against a corpus of chunked, embedded
//! document fragments. The engine decides how much to retrieve, widens or
//! narrows based on the question, stitches fragments with related
//! neighbors, fits the result into a token budget, and scores how reliable
//! the supporting material looks. Text generation is delegated to an
//! [`AnswerGenerator`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          DocumentQa                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ingest:  TextChunker ──► EmbeddingProvider ──► VectorIndex     │
//! │                                                                 │
//! │  answer:  QuestionClassifier (analyze, decompose)               │
//! │                │                                                │
//! │                ▼                                                │
//! │           AdaptiveRetriever ──► VectorIndex::search             │
//! │                │                                                │
//! │                ▼                                                │
//! │           ContextExpander  ──► VectorIndex::get                 │
//! │                │                                                │
//! │                ▼                                                │
//! │           TokenBudget ──► build_prompt ──► AnswerGenerator      │
//! │                                                                 │
//! │           confidence::score over the merged results             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_embeddings::HashingProvider;
//! use docqa_retrieval::DocumentQa;
//!
//! let qa = DocumentQa::builder()
//!     .with_embedder(Arc::new(HashingProvider::default()))
//!     .build()?;
//!
//! qa.ingest_document("cats.txt", "Cats are small carnivorous mammals.").await?;
//! let answer = qa.answer("What are cats?").await?;
//! ```

pub mod analyzer;
pub mod budget;
pub mod chunker;
pub mod confidence;
pub mod config;
pub mod engine;
pub mod error;
pub mod expander;
pub mod fragment;
pub mod generation;
pub mod locale;
pub mod retriever;

pub use analyzer::{KeywordClassifier, QuestionAnalysis, QuestionClassifier, QuestionType};
pub use budget::{PackedContext, TokenBudget, estimate_tokens};
pub use chunker::TextChunker;
pub use config::{AnalysisConfig, BudgetConfig, ChunkingConfig, QaConfig, RetrievalConfig};
pub use engine::{Answer, DocumentQa, DocumentQaBuilder, EngineStats, SourceRef};
pub use error::{QaError, Result};
pub use expander::{ContextExpander, jaccard_similarity};
pub use fragment::{Fragment, FragmentKey, FragmentMetadata, RetrievedResult};
pub use generation::{AnswerGenerator, ContextOnlyGenerator, OpenAiChatGenerator, build_prompt};
pub use locale::Language;
pub use retriever::{AdaptiveRetriever, RetrievalPlan};

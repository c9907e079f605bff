//! Configuration for the document QA engine.
//!
//! A [`QaConfig`] is built once (from defaults, builders, or a TOML file),
//! validated, and then handed by value to the engine components. Nothing
//! reads configuration from global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};
use crate::locale::Language;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Fragment splitting.
    pub chunking: ChunkingConfig,

    /// Retrieval breadth and filtering.
    pub retrieval: RetrievalConfig,

    /// Context size limits.
    pub budget: BudgetConfig,

    /// Question classification vocabulary.
    pub analysis: AnalysisConfig,

    /// Language of generated sub-questions, sentinels, and prompts.
    pub language: Language,
}

impl QaConfig {
    /// Parse a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Set the chunking configuration.
    pub fn with_chunking(mut self, config: ChunkingConfig) -> Self {
        self.chunking = config;
        self
    }

    /// Set the retrieval configuration.
    pub fn with_retrieval(mut self, config: RetrievalConfig) -> Self {
        self.retrieval = config;
        self
    }

    /// Set the budget configuration.
    pub fn with_budget(mut self, config: BudgetConfig) -> Self {
        self.budget = config;
        self
    }

    /// Set the analysis configuration.
    pub fn with_analysis(mut self, config: AnalysisConfig) -> Self {
        self.analysis = config;
        self
    }

    /// Set the language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(QaError::Config("chunk_size must be positive".to_string()));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(QaError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }

        let retrieval = &self.retrieval;
        if retrieval.base_top_k == 0 {
            return Err(QaError::Config("base_top_k must be positive".to_string()));
        }
        if retrieval.min_top_k == 0 || retrieval.min_top_k > retrieval.max_top_k {
            return Err(QaError::Config(format!(
                "top_k bounds must satisfy 0 < min_top_k ({}) <= max_top_k ({})",
                retrieval.min_top_k, retrieval.max_top_k
            )));
        }
        if !retrieval.base_threshold.is_finite() {
            return Err(QaError::Config("base_threshold must be finite".to_string()));
        }

        Ok(())
    }
}

/// Parameters for splitting documents into fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,

    /// Characters shared between consecutive windows.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval breadth and similarity cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of fragments retrieved for an ordinary question.
    pub base_top_k: usize,

    /// Lower bound on planned retrieval breadth.
    pub min_top_k: usize,

    /// Upper bound on planned retrieval breadth.
    pub max_top_k: usize,

    /// Minimum similarity (`1 - distance`) for a fragment to be kept.
    pub base_threshold: f32,

    /// Whether to pull related neighbouring fragments into the result set.
    pub context_expansion: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_top_k: 5,
            min_top_k: 3,
            max_top_k: 20,
            base_threshold: 0.3,
            context_expansion: true,
        }
    }
}

/// Context size limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Hard cap on estimated tokens for question plus context.
    pub max_context_tokens: usize,

    /// Tokens kept free for the generated answer.
    pub answer_reserve_tokens: usize,

    /// A part cut to fit is kept only if at least this many characters remain.
    pub min_truncation_chars: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 4000,
            answer_reserve_tokens: 500,
            min_truncation_chars: 100,
        }
    }
}

/// Vocabulary for question classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Substrings marking a question as broad (matched against the lower-cased question).
    pub broad_question_keywords: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let keywords = [
            // Traditional Chinese
            "整篇", "全部", "所有", "完整", "總結", "概述", "詳細解釋", "詳細說明",
            // English
            "entire", "all", "complete", "overall", "everything", "whole", "summarize",
            "summary", "overview", "explain in detail", "detailed explanation",
        ];
        Self {
            broad_question_keywords: keywords.into_iter().map(String::from).collect(),
        }
    }
}

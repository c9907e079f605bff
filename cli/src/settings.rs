//! CLI configuration file: engine settings plus collaborator selection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use docqa_embeddings::{
    CachedProvider, EmbeddingCache, EmbeddingProvider, HashingProvider, OpenAIProvider,
};
use docqa_retrieval::{AnswerGenerator, ContextOnlyGenerator, OpenAiChatGenerator, QaConfig};
use serde::{Deserialize, Serialize};

/// Contents of `docqa.toml`.
///
/// Engine sections (`[chunking]`, `[retrieval]`, `[budget]`, `[analysis]`,
/// `language`) sit at the top level next to `[embedding]` and `[generation]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub engine: QaConfig,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    OpenAi,
    /// Local feature hashing; works offline.
    #[default]
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,

    /// Model override for the OpenAI provider.
    pub model: Option<String>,

    /// Vector size for the hashing provider.
    pub dimension: usize,

    /// Keep computed embeddings on disk between runs.
    pub cache: bool,

    pub cache_entries: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: None,
            dimension: 384,
            cache: true,
            cache_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProviderKind {
    OpenAi,
    /// Print the assembled prompt instead of calling a model.
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub provider: GenerationProviderKind,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: GenerationProviderKind::default(),
            model: None,
            temperature: 0.3,
            max_tokens: 1500,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.engine.validate()?;
        Ok(settings)
    }

    /// Build the configured embedding provider, wrapped in a persistent cache
    /// under `data_dir` when caching is enabled.
    pub async fn embedder(&self, data_dir: &Path) -> Result<Arc<dyn EmbeddingProvider>> {
        let cache_path = data_dir.join("embedding-cache.json");
        let settings = &self.embedding;

        Ok(match settings.provider {
            EmbeddingProviderKind::OpenAi => {
                let mut provider = OpenAIProvider::new();
                if let Some(model) = &settings.model {
                    provider = provider.with_model(model);
                }
                anyhow::ensure!(provider.is_available(), "OPENAI_API_KEY is not set");
                if settings.cache {
                    let cache =
                        EmbeddingCache::with_persistence(&cache_path, settings.cache_entries)
                            .await?;
                    Arc::new(CachedProvider::new(provider, cache))
                } else {
                    Arc::new(provider)
                }
            }
            // Hashing is cheap enough that caching would only cost disk writes.
            EmbeddingProviderKind::Hashing => Arc::new(HashingProvider::new(settings.dimension)),
        })
    }

    pub fn generator(&self) -> Arc<dyn AnswerGenerator> {
        let settings = &self.generation;
        match settings.provider {
            GenerationProviderKind::OpenAi => {
                let mut generator = OpenAiChatGenerator::new(self.engine.language)
                    .with_temperature(settings.temperature)
                    .with_max_tokens(settings.max_tokens);
                if let Some(model) = &settings.model {
                    generator = generator.with_model(model);
                }
                Arc::new(generator)
            }
            GenerationProviderKind::None => Arc::new(ContextOnlyGenerator),
        }
    }
}

/// Default directory for the index and caches.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docqa")
}

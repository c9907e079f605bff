//! Document QA engine: ingestion, document management, and question answering.

use std::collections::HashSet;
use std::sync::Arc;

use docqa_embeddings::EmbeddingProvider;
use docqa_vector_store::{DeleteFilter, IndexRecord, InMemoryVectorIndex, VectorIndex};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzer::{KeywordClassifier, QuestionAnalysis, QuestionClassifier};
use crate::budget::TokenBudget;
use crate::chunker::TextChunker;
use crate::config::QaConfig;
use crate::confidence;
use crate::error::{QaError, Result};
use crate::fragment::{FragmentKey, RetrievedResult};
use crate::generation::{AnswerGenerator, ContextOnlyGenerator, build_prompt};
use crate::retriever::AdaptiveRetriever;

/// Where part of an answer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_id: String,

    /// Localized 1-based position, e.g. `Fragment 2/7`.
    pub position: String,
}

/// Result of answering a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Generated text, or the localized "no information" message.
    pub text: String,

    /// One entry per distinct source, in retrieval order.
    pub sources: Vec<SourceRef>,

    /// Reliability estimate in `[0, 1]`.
    pub confidence: f32,

    /// Number of fragments retrieved across all sub-questions.
    pub retrieved: usize,

    pub analysis: QuestionAnalysis,

    /// Questions that were retrieved for, the asked question first.
    pub sub_questions: Vec<String>,

    /// Whether context was cut or dropped to fit the budget.
    pub truncated: bool,
}

/// Counts describing the indexed corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub documents: usize,
    pub fragments: usize,
}

/// Answers questions against a corpus of chunked, embedded documents.
///
/// The index, embedder, and generator are shared collaborators. The engine
/// holds no mutable state of its own, so one instance can serve concurrent
/// questions.
pub struct DocumentQa {
    config: QaConfig,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn AnswerGenerator>,
    classifier: Arc<dyn QuestionClassifier>,
    retriever: AdaptiveRetriever,
    chunker: TextChunker,
    budget: TokenBudget,
}

impl DocumentQa {
    pub fn builder() -> DocumentQaBuilder {
        DocumentQaBuilder::new()
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Split, embed, and store a document, replacing any previous version.
    ///
    /// Returns the number of fragments stored. Blank text stores nothing and
    /// leaves the index untouched.
    pub async fn ingest_document(&self, source_id: &str, text: &str) -> Result<usize> {
        let fragments = self.chunker.chunk_document(source_id, text);
        if fragments.is_empty() {
            debug!("Nothing to ingest for {source_id}");
            return Ok(0);
        }

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let embeddings = self.embedder.embed_texts(&texts).await?;

        let records = fragments
            .into_iter()
            .zip(embeddings)
            .map(|(fragment, embedding)| {
                Ok(IndexRecord {
                    key: fragment.key.to_string(),
                    metadata: serde_json::to_value(fragment.metadata())
                        .map_err(docqa_vector_store::IndexError::from)?,
                    text: fragment.text,
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // The previous version stays searchable until the new one is embedded.
        let replaced = self
            .index
            .delete(DeleteFilter::Source(source_id.to_string()))
            .await?;
        if replaced > 0 {
            debug!("Replacing {replaced} existing fragments of {source_id}");
        }

        let count = records.len();
        self.index.add(records).await?;
        info!("Ingested {count} fragments from {source_id}");
        Ok(count)
    }

    /// Delete every fragment of a document, returning how many were removed.
    pub async fn remove_document(&self, source_id: &str) -> Result<usize> {
        let removed = self
            .index
            .delete(DeleteFilter::Source(source_id.to_string()))
            .await?;
        info!("Removed {removed} fragments of {source_id}");
        Ok(removed)
    }

    /// Sorted identifiers of the indexed documents.
    pub async fn list_documents(&self) -> Result<Vec<String>> {
        Ok(self.index.list_sources().await?.into_iter().collect())
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            documents: self.index.list_sources().await?.len(),
            fragments: self.index.len().await?,
        })
    }

    /// Retrieve for the question and each of its sub-questions concurrently,
    /// then merge by fragment key keeping the first occurrence.
    pub async fn retrieve(&self, question: &str) -> Result<(Vec<String>, Vec<RetrievedResult>)> {
        let mut queries = vec![question.to_string()];
        for sub_question in self.classifier.decompose(question) {
            if !queries.contains(&sub_question) {
                queries.push(sub_question);
            }
        }
        debug!("Retrieving for {} queries", queries.len());

        let batches =
            try_join_all(queries.iter().map(|query| self.retriever.retrieve(query))).await?;

        let mut seen: HashSet<FragmentKey> = HashSet::new();
        let merged = batches
            .into_iter()
            .flatten()
            .filter(|result| seen.insert(result.key().clone()))
            .collect();

        Ok((queries, merged))
    }

    /// Answer a question from the indexed documents.
    ///
    /// When nothing relevant is found the localized "no information" answer
    /// is returned and the generator is not called.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let language = self.config.language;
        let analysis = self.classifier.analyze(question);
        let (sub_questions, results) = self.retrieve(question).await?;

        if results.is_empty() {
            info!("No relevant fragments for question");
            return Ok(Answer {
                text: language.no_information().to_string(),
                sources: Vec::new(),
                confidence: 0.0,
                retrieved: 0,
                analysis,
                sub_questions,
                truncated: false,
            });
        }

        let parts: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                format!(
                    "{}\n{}",
                    language.fragment_label(i + 1, result.fragment.source_id()),
                    result.fragment.text
                )
            })
            .collect();

        let packed = self.budget.pack(&parts, question);
        let prompt = build_prompt(language, packed.text(), question);
        debug!("Generating answer with {}", self.generator.name());
        let text = self.generator.generate(&prompt).await?;

        let confidence =
            confidence::score(&results, &analysis, self.config.retrieval.base_top_k);
        info!(
            "Answered from {} fragments (confidence {confidence:.2})",
            results.len()
        );

        Ok(Answer {
            text,
            sources: self.sources(&results),
            confidence,
            retrieved: results.len(),
            analysis,
            sub_questions,
            truncated: packed.is_truncated(),
        })
    }

    fn sources(&self, results: &[RetrievedResult]) -> Vec<SourceRef> {
        let mut seen = HashSet::new();
        results
            .iter()
            .filter(|result| seen.insert(result.fragment.source_id()))
            .map(|result| SourceRef {
                source_id: result.fragment.source_id().to_string(),
                position: self
                    .config
                    .language
                    .fragment_position(result.fragment.index() + 1, result.fragment.total),
            })
            .collect()
    }
}

/// Builder for [`DocumentQa`].
///
/// Only the embedder is required. The index defaults to an in-memory index
/// sized to the embedder, the generator to [`ContextOnlyGenerator`], and the
/// classifier to a [`KeywordClassifier`] built from the configuration.
pub struct DocumentQaBuilder {
    config: QaConfig,
    index: Option<Arc<dyn VectorIndex>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    classifier: Option<Arc<dyn QuestionClassifier>>,
}

impl DocumentQaBuilder {
    pub fn new() -> Self {
        Self {
            config: QaConfig::default(),
            index: None,
            embedder: None,
            generator: None,
            classifier: None,
        }
    }

    pub fn with_config(mut self, config: QaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn QuestionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Validate the configuration and assemble the engine.
    pub fn build(self) -> Result<DocumentQa> {
        let config = self.config;
        config.validate()?;

        let embedder = self
            .embedder
            .ok_or_else(|| QaError::Config("an embedding provider is required".to_string()))?;
        let index = self.index.unwrap_or_else(|| {
            Arc::new(InMemoryVectorIndex::new(embedder.default_dimension()))
        });
        let generator = self
            .generator
            .unwrap_or_else(|| Arc::new(ContextOnlyGenerator));
        let classifier = self.classifier.unwrap_or_else(|| {
            Arc::new(KeywordClassifier::new(&config.analysis, config.language))
        });

        Ok(DocumentQa {
            retriever: AdaptiveRetriever::new(
                Arc::clone(&index),
                Arc::clone(&embedder),
                Arc::clone(&classifier),
                config.retrieval.clone(),
            ),
            chunker: TextChunker::from_config(&config.chunking)?,
            budget: TokenBudget::new(config.budget.clone(), config.language),
            config,
            index,
            embedder,
            generator,
            classifier,
        })
    }
}

impl Default for DocumentQaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::locale::Language;
    use async_trait::async_trait;
    use docqa_embeddings::{
        EmbeddingError, EmbeddingRequest, EmbeddingResponse, HashingProvider,
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Hashing embedder that starts failing once `fail` is set.
    struct SwitchableEmbedder {
        inner: HashingProvider,
        fail: AtomicBool,
    }

    #[async_trait]
    impl EmbeddingProvider for SwitchableEmbedder {
        fn name(&self) -> &str {
            "switchable"
        }

        fn default_model(&self) -> &str {
            self.inner.default_model()
        }

        fn default_dimension(&self) -> usize {
            self.inner.default_dimension()
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> docqa_embeddings::Result<EmbeddingResponse> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmbeddingError::RateLimited {
                    retry_after_secs: 1,
                });
            }
            self.inner.embed(request).await
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    /// Counts calls and answers with a fixed string.
    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnswerGenerator for CountingGenerator {
        fn name(&self) -> &str {
            "counting"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("generated".to_string())
        }
    }

    fn engine(generator: Arc<dyn AnswerGenerator>) -> DocumentQa {
        let config = QaConfig::default().with_chunking(ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 0,
        });
        DocumentQa::builder()
            .with_config(config)
            .with_embedder(Arc::new(HashingProvider::new(4096)))
            .with_generator(generator)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_embedder() {
        assert!(matches!(
            DocumentQa::builder().build(),
            Err(QaError::Config(_))
        ));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = QaConfig::default().with_chunking(ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        });
        let result = DocumentQa::builder()
            .with_config(config)
            .with_embedder(Arc::new(HashingProvider::default()))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ingest_list_and_remove() {
        let qa = engine(Arc::new(ContextOnlyGenerator));
        let text = "Cats are small carnivorous mammals. They sleep a lot. \
                    Dogs are loyal companions. They enjoy long walks.";

        let stored = qa.ingest_document("pets.txt", text).await.unwrap();
        assert!(stored > 1);
        qa.ingest_document("other.md", "Something else entirely.")
            .await
            .unwrap();

        assert_eq!(
            qa.list_documents().await.unwrap(),
            vec!["other.md".to_string(), "pets.txt".to_string()]
        );
        assert_eq!(
            qa.stats().await.unwrap(),
            EngineStats {
                documents: 2,
                fragments: stored + 1
            }
        );

        assert_eq!(qa.remove_document("pets.txt").await.unwrap(), stored);
        assert_eq!(qa.list_documents().await.unwrap(), vec!["other.md".to_string()]);
    }

    #[tokio::test]
    async fn test_reingest_replaces_stale_fragments() {
        let qa = engine(Arc::new(ContextOnlyGenerator));
        let long = "one two three four five six seven. ".repeat(6);
        let first = qa.ingest_document("doc", &long).await.unwrap();
        let second = qa.ingest_document("doc", "short now").await.unwrap();

        assert!(first > second);
        assert_eq!(second, 1);
        assert_eq!(qa.index().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_reingest_keeps_previous_version() {
        let embedder = Arc::new(SwitchableEmbedder {
            inner: HashingProvider::new(256),
            fail: AtomicBool::new(false),
        });
        let qa = DocumentQa::builder()
            .with_embedder(embedder.clone())
            .build()
            .unwrap();
        let stored = qa.ingest_document("doc", "the first version").await.unwrap();

        embedder.fail.store(true, Ordering::SeqCst);
        let result = qa.ingest_document("doc", "the second version").await;

        assert!(matches!(result, Err(QaError::Embedding(_))));
        assert_eq!(qa.index().len().await.unwrap(), stored);
        assert_eq!(qa.list_documents().await.unwrap(), vec!["doc".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_document_stores_nothing() {
        let qa = engine(Arc::new(ContextOnlyGenerator));
        qa.ingest_document("doc", "kept text").await.unwrap();

        assert_eq!(qa.ingest_document("doc", "   \n").await.unwrap(), 0);
        assert_eq!(qa.index().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_corpus_skips_generation() {
        let generator = Arc::new(CountingGenerator::default());
        let qa = engine(generator.clone());

        let answer = qa.answer("what are cats").await.unwrap();

        assert_eq!(answer.text, Language::English.no_information());
        assert_eq!(answer.confidence, 0.0);
        assert_eq!(answer.retrieved, 0);
        assert!(answer.sources.is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_answer_attributes_sources() {
        let generator = Arc::new(CountingGenerator::default());
        let qa = engine(generator.clone());
        qa.ingest_document("cats.txt", "cats are mammals").await.unwrap();

        let answer = qa.answer("cats are mammals").await.unwrap();

        assert_eq!(answer.text, "generated");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            answer.sources,
            vec![SourceRef {
                source_id: "cats.txt".to_string(),
                position: "Fragment 1/1".to_string(),
            }]
        );
        assert_eq!(answer.retrieved, 1);
        assert!(answer.confidence > 0.5);
        assert!(!answer.truncated);
        assert_eq!(answer.sub_questions, vec!["cats are mammals".to_string()]);
    }

    #[tokio::test]
    async fn test_context_reaches_generator_in_prompt() {
        let qa = engine(Arc::new(ContextOnlyGenerator));
        qa.ingest_document("cats.txt", "cats are mammals").await.unwrap();

        let answer = qa.answer("cats are mammals").await.unwrap();
        assert!(answer.text.contains("[Fragment 1] Source: cats.txt\ncats are mammals"));
        assert!(answer.text.contains("Question:\ncats are mammals"));
    }
}

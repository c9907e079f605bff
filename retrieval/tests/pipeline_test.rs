//! End-to-end tests of the question answering pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_embeddings::{
    EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider,
};
use docqa_retrieval::{
    BudgetConfig, ContextOnlyGenerator, DocumentQa, FragmentKey, FragmentMetadata, QaConfig,
    QaError, RetrievalConfig,
};
use docqa_vector_store::{IndexRecord, InMemoryVectorIndex, VectorIndex};
use pretty_assertions::assert_eq;

/// Embeds only the texts it was given, with fixed vectors.
struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl StaticEmbedder {
    fn new(dimension: usize, vectors: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: vectors
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    fn name(&self) -> &str {
        "static"
    }

    fn default_model(&self) -> &str {
        "static"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> docqa_embeddings::Result<EmbeddingResponse> {
        let embedding = self.vectors.get(&request.text).cloned().ok_or_else(|| {
            EmbeddingError::InvalidResponse(format!("no vector for {:?}", request.text))
        })?;
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: "static".to_string(),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn record(source: &str, index: usize, total: usize, text: &str, embedding: Vec<f32>) -> IndexRecord {
    let metadata = FragmentMetadata {
        source_id: source.to_string(),
        chunk_index: index,
        total_chunks: total,
    };
    IndexRecord {
        key: FragmentKey::new(source, index).to_string(),
        text: text.to_string(),
        embedding,
        metadata: serde_json::to_value(metadata).unwrap(),
    }
}

async fn cats_corpus(conclusion: &str) -> Arc<InMemoryVectorIndex> {
    let index = InMemoryVectorIndex::new(3);
    index
        .add(vec![
            record("doc", 0, 3, "Intro to cats", vec![0.5, 0.5, 0.7]),
            record("doc", 1, 3, "Cats are mammals", vec![1.0, 0.0, 0.0]),
            record("doc", 2, 3, conclusion, vec![0.0, 0.0, 1.0]),
        ])
        .await
        .unwrap();
    Arc::new(index)
}

fn cats_engine(index: Arc<InMemoryVectorIndex>) -> DocumentQa {
    let embedder = StaticEmbedder::new(3, &[("what are cats", vec![0.95, 0.3, 0.0])]);
    DocumentQa::builder()
        .with_index(index)
        .with_embedder(Arc::new(embedder))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_cats_scenario_ranks_best_fragment_first() {
    let qa = cats_engine(cats_corpus("Conclusion").await);

    let (_, results) = qa.retrieve("what are cats").await.unwrap();
    let keys: Vec<String> = results.iter().map(|r| r.key().to_string()).collect();

    // chunk_0 passes the similarity cutoff on its own; chunk_2 neither passes
    // nor shares enough words with chunk_1 to be pulled in.
    assert_eq!(keys, vec!["doc_chunk_1", "doc_chunk_0"]);
    assert!(results[0].distance < results[1].distance);
}

#[tokio::test]
async fn test_cats_scenario_expands_related_neighbor() {
    let qa = cats_engine(cats_corpus("Cats are mammals indeed").await);

    let (_, results) = qa.retrieve("what are cats").await.unwrap();
    let keys: Vec<String> = results.iter().map(|r| r.key().to_string()).collect();

    assert_eq!(keys, vec!["doc_chunk_1", "doc_chunk_0", "doc_chunk_2"]);
    assert_eq!(results[2].distance, 0.0);
}

#[tokio::test]
async fn test_embedding_failure_propagates() {
    let qa = cats_engine(cats_corpus("Conclusion").await);

    let err = qa.answer("a question nobody embedded").await.unwrap_err();
    assert!(matches!(err, QaError::Embedding(_)));
}

#[tokio::test]
async fn test_broad_bonus_is_capped_for_large_result_sets() {
    let index = InMemoryVectorIndex::new(2);
    let records = (0..25)
        .map(|i| record("doc", i, 25, &format!("part {i}"), vec![0.5, 0.866_025_4]))
        .collect();
    index.add(records).await.unwrap();

    let config = QaConfig::default().with_retrieval(RetrievalConfig {
        base_top_k: 10,
        max_top_k: 25,
        ..RetrievalConfig::default()
    });
    let embedder = StaticEmbedder::new(2, &[("summarize everything", vec![1.0, 0.0])]);
    let qa = DocumentQa::builder()
        .with_config(config)
        .with_index(Arc::new(index))
        .with_embedder(Arc::new(embedder))
        .build()
        .unwrap();

    let answer = qa.answer("summarize everything").await.unwrap();

    assert!(answer.analysis.is_broad);
    assert_eq!(answer.retrieved, 25);
    // 0.4 * 0.5 + 0.4 * 0.5 + 0.2 * 1.0, plus a bonus capped at 0.2.
    assert_eq!(answer.confidence, 0.8);
}

#[tokio::test]
async fn test_long_question_yields_sentinel_context() {
    let question = "word ".repeat(40);
    let config = QaConfig::default().with_budget(BudgetConfig {
        max_context_tokens: 100,
        ..BudgetConfig::default()
    });
    let qa = DocumentQa::builder()
        .with_config(config)
        .with_embedder(Arc::new(HashingProvider::new(256)))
        .with_generator(Arc::new(ContextOnlyGenerator))
        .build()
        .unwrap();
    qa.ingest_document("doc", &question).await.unwrap();

    let answer = qa.answer(&question).await.unwrap();

    assert!(answer.truncated);
    assert!(answer.text.contains("The question is too long; please shorten it."));
    assert!(!answer.text.contains("[Fragment 1]"));
}

#[tokio::test]
async fn test_broad_question_merges_sub_question_results() {
    let qa = DocumentQa::builder()
        .with_embedder(Arc::new(HashingProvider::new(1024)))
        .with_config(QaConfig::default().with_retrieval(RetrievalConfig {
            base_threshold: 0.0,
            ..RetrievalConfig::default()
        }))
        .build()
        .unwrap();
    let text = "The main content covers cats. The key concepts are fur and whiskers. \
                The conclusion is that cats are great.";
    let stored = qa.ingest_document("cats.txt", text).await.unwrap();

    let answer = qa.answer("Explain the entire document").await.unwrap();

    assert_eq!(
        answer.sub_questions,
        vec![
            "Explain the entire document",
            "What is the main content?",
            "What are the key concepts?",
            "What is the conclusion?",
        ]
    );
    // Every sub-question finds the same fragment; it is reported once.
    assert_eq!(answer.retrieved, stored);
    assert_eq!(answer.sources.len(), 1);
}

#[tokio::test]
async fn test_persisted_index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let config_path = dir.path().join("docqa.toml");
    std::fs::write(&config_path, "[chunking]\nchunk_size = 50\nchunk_overlap = 10\n").unwrap();
    let config = QaConfig::load(&config_path).unwrap();

    let index = Arc::new(InMemoryVectorIndex::open(&path, 128).await.unwrap());
    let qa = DocumentQa::builder()
        .with_config(config.clone())
        .with_index(index.clone())
        .with_embedder(Arc::new(HashingProvider::new(128)))
        .build()
        .unwrap();
    let stored = qa
        .ingest_document("notes.md", &"Persistent notes about cats and dogs. ".repeat(5))
        .await
        .unwrap();
    index.save(&path).await.unwrap();

    let reopened = Arc::new(InMemoryVectorIndex::open(&path, 128).await.unwrap());
    assert_eq!(reopened.len().await.unwrap(), stored);
    let qa = DocumentQa::builder()
        .with_config(config)
        .with_index(reopened)
        .with_embedder(Arc::new(HashingProvider::new(128)))
        .build()
        .unwrap();
    assert_eq!(qa.list_documents().await.unwrap(), vec!["notes.md".to_string()]);
}

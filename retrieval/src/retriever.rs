//! Adaptive retrieval: choose breadth and cutoff from the question's shape,
//! search the index, widen when a broad question comes back sparse, and
//! optionally expand with neighboring fragments.

use std::sync::Arc;

use docqa_embeddings::{EmbeddingProvider, EmbeddingRequest};
use docqa_vector_store::VectorIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzer::{QuestionAnalysis, QuestionClassifier};
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::expander::ContextExpander;
use crate::fragment::RetrievedResult;

/// Complexity above which a question is retrieved for broadly.
const HIGH_COMPLEXITY: f32 = 7.0;

/// Complexity below which a question is retrieved for narrowly.
const LOW_COMPLEXITY: f32 = 3.0;

/// How many fragments to fetch and how similar they must be.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPlan {
    pub top_k: usize,
    pub similarity_threshold: f32,
}

impl RetrievalPlan {
    /// Plan retrieval for an analyzed question.
    ///
    /// Broad or complex questions fetch three times the base breadth with a
    /// looser cutoff; simple ones fetch half with a stricter cutoff. `top_k`
    /// always lands in `[min_top_k, max_top_k]`.
    pub fn for_analysis(analysis: &QuestionAnalysis, config: &RetrievalConfig) -> Self {
        let base = config.base_top_k;
        let (top_k, similarity_threshold) =
            if analysis.is_broad || analysis.complexity_score > HIGH_COMPLEXITY {
                (
                    config.max_top_k.min(base * 3),
                    config.base_threshold * 0.8,
                )
            } else if analysis.complexity_score < LOW_COMPLEXITY {
                (config.min_top_k.max(base / 2), config.base_threshold * 1.1)
            } else {
                (base, config.base_threshold)
            };

        Self {
            top_k: top_k.min(config.max_top_k).max(config.min_top_k),
            similarity_threshold,
        }
    }
}

/// Retrieves fragments for a question.
pub struct AdaptiveRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    classifier: Arc<dyn QuestionClassifier>,
    expander: ContextExpander,
    config: RetrievalConfig,
}

impl AdaptiveRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        classifier: Arc<dyn QuestionClassifier>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            expander: ContextExpander::new(Arc::clone(&index)),
            index,
            embedder,
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve fragments for `question`, analyzing it first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedResult>> {
        let analysis = self.classifier.analyze(question);
        self.retrieve_with(question, &analysis).await
    }

    /// Retrieve fragments for `question` using an existing analysis.
    ///
    /// Results come back in index order (ascending distance), followed by any
    /// neighbors added by expansion. An empty corpus yields an empty vector.
    pub async fn retrieve_with(
        &self,
        question: &str,
        analysis: &QuestionAnalysis,
    ) -> Result<Vec<RetrievedResult>> {
        let plan = RetrievalPlan::for_analysis(analysis, &self.config);
        debug!(
            "Retrieval plan: top_k={}, threshold={:.3}, broad={}, complexity={:.1}",
            plan.top_k, plan.similarity_threshold, analysis.is_broad, analysis.complexity_score
        );

        let query = self
            .embedder
            .embed(EmbeddingRequest::new(question))
            .await?
            .embedding;

        let mut results: Vec<RetrievedResult> = self
            .search(&query, plan.top_k)
            .await?
            .into_iter()
            .filter(|r| r.similarity() >= plan.similarity_threshold)
            .collect();

        // Broad questions prefer recall: when too little passes the cutoff,
        // widen to the maximum breadth and skip the cutoff entirely.
        if results.len() < self.config.min_top_k && analysis.is_broad {
            let widened = self.search(&query, self.config.max_top_k).await?;
            debug!(
                "Sparse broad retrieval ({} kept); widened to {} unfiltered",
                results.len(),
                widened.len()
            );
            results = widened
                .into_iter()
                .take(self.config.base_top_k * 2)
                .collect();
        }

        if self.config.context_expansion {
            results = self.expander.expand(results).await?;
        }

        Ok(results)
    }

    async fn search(&self, query: &[f32], n: usize) -> Result<Vec<RetrievedResult>> {
        let hits = self.index.search(query, n).await?;
        Ok(hits.iter().filter_map(RetrievedResult::from_hit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::KeywordClassifier;
    use crate::fragment::FragmentKey;
    use docqa_embeddings::HashingProvider;
    use docqa_vector_store::{IndexRecord, InMemoryVectorIndex};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn analysis(is_broad: bool, complexity_score: f32) -> QuestionAnalysis {
        QuestionAnalysis {
            is_broad,
            word_count: 0,
            char_count: 0,
            complexity_score,
            question_types: Vec::new(),
        }
    }

    #[test]
    fn test_plan_for_broad_question() {
        let plan = RetrievalPlan::for_analysis(&analysis(true, 1.0), &RetrievalConfig::default());
        assert_eq!(plan.top_k, 15);
        assert!((plan.similarity_threshold - 0.24).abs() < 1e-6);
    }

    #[test]
    fn test_plan_for_complex_question_is_capped() {
        let config = RetrievalConfig {
            base_top_k: 10,
            ..RetrievalConfig::default()
        };
        let plan = RetrievalPlan::for_analysis(&analysis(false, 8.0), &config);
        assert_eq!(plan.top_k, 20);
    }

    #[test]
    fn test_plan_for_simple_question() {
        let plan = RetrievalPlan::for_analysis(&analysis(false, 1.0), &RetrievalConfig::default());
        assert_eq!(plan.top_k, 3);
        assert!((plan.similarity_threshold - 0.33).abs() < 1e-6);
    }

    #[test]
    fn test_plan_for_medium_question() {
        let plan = RetrievalPlan::for_analysis(&analysis(false, 5.0), &RetrievalConfig::default());
        assert_eq!(plan.top_k, 5);
        assert_eq!(plan.similarity_threshold, 0.3);
    }

    #[test]
    fn test_plan_top_k_always_within_bounds() {
        let config = RetrievalConfig {
            base_top_k: 40,
            min_top_k: 4,
            max_top_k: 12,
            ..RetrievalConfig::default()
        };
        for broad in [false, true] {
            for complexity in [0.0, 2.9, 3.0, 5.0, 7.0, 7.1, 10.0] {
                let plan = RetrievalPlan::for_analysis(&analysis(broad, complexity), &config);
                assert!((4..=12).contains(&plan.top_k), "{broad} {complexity}");
            }
        }
    }

    async fn retriever(texts: &[&str], config: RetrievalConfig) -> AdaptiveRetriever {
        let embedder = HashingProvider::new(4096);
        let index = InMemoryVectorIndex::new(4096);
        let records = texts
            .iter()
            .enumerate()
            .map(|(i, text)| IndexRecord {
                key: FragmentKey::new("doc", i).to_string(),
                text: text.to_string(),
                embedding: embedder.embed_text(text),
                metadata: json!({"source_id": "doc", "chunk_index": i, "total_chunks": texts.len()}),
            })
            .collect();
        index.add(records).await.unwrap();

        AdaptiveRetriever::new(
            Arc::new(index),
            Arc::new(embedder),
            Arc::new(KeywordClassifier::default()),
            config,
        )
    }

    #[tokio::test]
    async fn test_empty_corpus_is_empty() {
        let retriever = retriever(&[], RetrievalConfig::default()).await;
        let results = retriever.retrieve("what are cats").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_filters_unrelated_fragments() {
        let config = RetrievalConfig {
            context_expansion: false,
            ..RetrievalConfig::default()
        };
        let retriever = retriever(&["cats are mammals", "quantum chromodynamics"], config).await;

        let results = retriever.retrieve("cats are mammals").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].fragment.text, "cats are mammals");
    }

    #[tokio::test]
    async fn test_broad_question_falls_back_unfiltered() {
        let config = RetrievalConfig {
            base_top_k: 1,
            min_top_k: 3,
            base_threshold: 0.99,
            context_expansion: false,
            ..RetrievalConfig::default()
        };
        let retriever = retriever(&["alpha", "beta", "gamma", "delta"], config).await;

        // Nothing passes a 0.79 cutoff, so the fallback takes 2 * base_top_k.
        let results = retriever.retrieve("summarize everything").await.unwrap();
        assert_eq!(results.len(), 2);

        let narrow = retriever.retrieve("zeta").await.unwrap();
        assert!(narrow.is_empty());
    }
}

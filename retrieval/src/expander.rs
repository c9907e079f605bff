//! Pulls adjacent fragments into a result set when they read as related.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use docqa_vector_store::VectorIndex;
use tracing::debug;

use crate::error::Result;
use crate::fragment::{Fragment, FragmentKey, RetrievedResult};

/// Minimum Jaccard similarity for a neighbor to be admitted (exclusive).
pub const RELATEDNESS_THRESHOLD: f32 = 0.3;

/// Adds the previous and next fragment of each result when they share enough
/// vocabulary with it. Never removes or reorders input results.
pub struct ContextExpander {
    index: Arc<dyn VectorIndex>,
}

impl ContextExpander {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Expand `results`. Admitted neighbors are appended with distance 0.
    ///
    /// Neighbors are looked up only for the input results, not for neighbors
    /// admitted along the way. Missing or undecodable neighbors are skipped.
    pub async fn expand(&self, results: Vec<RetrievedResult>) -> Result<Vec<RetrievedResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        let mut wanted: Vec<String> = Vec::new();
        for result in &results {
            let key = result.key();
            if let Some(previous) = key.previous() {
                wanted.push(previous.to_string());
            }
            wanted.push(key.next().to_string());
        }

        let neighbors: HashMap<FragmentKey, Fragment> = self
            .index
            .get(&wanted)
            .await?
            .iter()
            .filter_map(Fragment::from_hit)
            .map(|fragment| (fragment.key.clone(), fragment))
            .collect();

        let mut seen: HashSet<FragmentKey> = results.iter().map(|r| r.key().clone()).collect();
        let mut expanded = results.clone();

        for result in &results {
            let key = result.key();
            for neighbor_key in key.previous().into_iter().chain(Some(key.next())) {
                if seen.contains(&neighbor_key) {
                    continue;
                }
                let Some(neighbor) = neighbors.get(&neighbor_key) else {
                    continue;
                };
                if jaccard_similarity(&result.fragment.text, &neighbor.text) > RELATEDNESS_THRESHOLD
                {
                    debug!("Expanded {key} with neighbor {neighbor_key}");
                    seen.insert(neighbor_key);
                    expanded.push(RetrievedResult {
                        fragment: neighbor.clone(),
                        distance: 0.0,
                    });
                }
            }
        }

        Ok(expanded)
    }
}

/// Jaccard similarity of the lower-cased whitespace-token sets. Two empty
/// texts score 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

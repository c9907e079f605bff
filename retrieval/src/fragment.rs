//! Fragments and their keys.
//!
//! Inside the engine a fragment is identified by a structured
//! [`FragmentKey`]. The string form `"{source_id}_chunk_{index}"` is only
//! used when talking to the vector index.

use std::fmt;
use std::str::FromStr;

use docqa_vector_store::IndexHit;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator between the source id and the fragment index in string keys.
const CHUNK_SEPARATOR: &str = "_chunk_";

/// Identity of a fragment within the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentKey {
    /// Source document identifier.
    pub source_id: String,

    /// 0-based position within the source.
    pub index: usize,
}

impl FragmentKey {
    pub fn new(source_id: impl Into<String>, index: usize) -> Self {
        Self {
            source_id: source_id.into(),
            index,
        }
    }

    /// The fragment before this one, if any.
    pub fn previous(&self) -> Option<Self> {
        self.index
            .checked_sub(1)
            .map(|index| Self::new(self.source_id.clone(), index))
    }

    /// The fragment after this one.
    pub fn next(&self) -> Self {
        Self::new(self.source_id.clone(), self.index + 1)
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{CHUNK_SEPARATOR}{}", self.source_id, self.index)
    }
}

/// Error returned when a string is not a fragment key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a fragment key: {0}")]
pub struct ParseFragmentKeyError(String);

impl FromStr for FragmentKey {
    type Err = ParseFragmentKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Source ids may themselves contain the separator; the index is always last.
        let (source_id, index) = s
            .rsplit_once(CHUNK_SEPARATOR)
            .ok_or_else(|| ParseFragmentKeyError(s.to_string()))?;
        let index = index
            .parse()
            .map_err(|_| ParseFragmentKeyError(s.to_string()))?;
        if source_id.is_empty() {
            return Err(ParseFragmentKeyError(s.to_string()));
        }
        Ok(Self::new(source_id, index))
    }
}

/// Metadata stored with every fragment record in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    pub source_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A contiguous piece of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub key: FragmentKey,

    /// Number of fragments the source was split into.
    pub total: usize,

    /// Trimmed, non-empty text.
    pub text: String,
}

impl Fragment {
    pub fn source_id(&self) -> &str {
        &self.key.source_id
    }

    pub fn index(&self) -> usize {
        self.key.index
    }

    /// Metadata to store alongside this fragment.
    pub fn metadata(&self) -> FragmentMetadata {
        FragmentMetadata {
            source_id: self.key.source_id.clone(),
            chunk_index: self.key.index,
            total_chunks: self.total,
        }
    }

    /// Rebuild a fragment from an index hit.
    ///
    /// Typed metadata is preferred. When it cannot be decoded the key string
    /// is parsed instead and `total` falls back to `index + 1`. Returns `None`
    /// when neither works.
    pub fn from_hit(hit: &IndexHit) -> Option<Self> {
        if let Ok(metadata) = serde_json::from_value::<FragmentMetadata>(hit.metadata.clone()) {
            return Some(Self {
                key: FragmentKey::new(metadata.source_id, metadata.chunk_index),
                total: metadata.total_chunks,
                text: hit.text.clone(),
            });
        }

        match hit.key.parse::<FragmentKey>() {
            Ok(key) => {
                let total = key.index + 1;
                Some(Self {
                    key,
                    total,
                    text: hit.text.clone(),
                })
            }
            Err(err) => {
                warn!("Dropping index record with unusable metadata: {err}");
                None
            }
        }
    }
}

/// A fragment returned by retrieval together with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedResult {
    pub fragment: Fragment,

    /// Non-negative; lower means more similar. Neighbors added by expansion carry 0.
    pub distance: f32,
}

impl RetrievedResult {
    /// `1 - distance`.
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }

    pub fn key(&self) -> &FragmentKey {
        &self.fragment.key
    }

    /// Convert a search hit; see [`Fragment::from_hit`].
    pub fn from_hit(hit: &IndexHit) -> Option<Self> {
        Fragment::from_hit(hit).map(|fragment| Self {
            fragment,
            distance: hit.distance.max(0.0),
        })
    }
}

//! # Vector Store
//!
//! The boundary between the retrieval engine and whatever stores fragment
//! embeddings. The engine talks to a [`VectorIndex`]; this crate also ships
//! [`InMemoryVectorIndex`], an exact brute-force index with JSON snapshots.
//!
//! Records are addressed by an opaque string key and carry free-form JSON
//! metadata. Deleting by source and listing sources look at the
//! [`SOURCE_FIELD`] metadata field.

pub mod error;
pub mod index;
pub mod memory;

pub use error::{IndexError, Result};
pub use index::{DeleteFilter, IndexHit, IndexRecord, SOURCE_FIELD, VectorIndex};
pub use memory::InMemoryVectorIndex;

//! In-memory vector index and chunk store.
//!
//! [`KnowledgeBase`] owns both structures and is their only mutation path,
//! so every row id present in the index has a chunk in the store.

pub mod index;
pub mod knowledge;
pub mod store;

pub use index::{Neighbor, VectorIndex};
pub use knowledge::{CommitError, KnowledgeBase, SourceRecord};
pub use store::DocumentStore;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based row position in the vector index.
///
/// Row ids are dense and assigned in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub usize);

impl RowId {
    pub fn new(value: usize) -> Self {
        Self(value)
    }

    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Row id to chunk mapping.

use std::collections::BTreeMap;

use super::RowId;
use crate::documents::Chunk;

/// Chunks keyed by the row id of their embedding.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    chunks: BTreeMap<RowId, Chunk>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk, returning any chunk previously stored under `row`.
    pub fn insert(&mut self, row: RowId, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(row, chunk)
    }

    pub fn get(&self, row: RowId) -> Option<&Chunk> {
        self.chunks.get(&row)
    }

    pub fn remove(&mut self, row: RowId) -> Option<Chunk> {
        self.chunks.remove(&row)
    }

    pub fn contains(&self, row: RowId) -> bool {
        self.chunks.contains_key(&row)
    }

    /// Row ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.chunks.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowId, &Chunk)> {
        self.chunks.iter().map(|(row, chunk)| (*row, chunk))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

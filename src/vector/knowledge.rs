//! The knowledge base: vector index and document store under one owner.

use std::ops::Range;

use thiserror::Error;

use super::{DocumentStore, Neighbor, RowId, VectorIndex};
use crate::documents::{Chunk, SourceId};
use crate::embedding::Embedding;

/// Rejected commit. Nothing was written when this is returned.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommitError {
    #[error("{chunks} chunks but {embeddings} embeddings")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("embedding {position} has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("embedding {position} has a non-finite component")]
    NonFinite { position: usize },
}

/// One ingested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub source_id: SourceId,
    /// SHA-256 of the raw document bytes.
    pub content_hash: String,
    /// Rows this document occupies.
    pub rows: Range<usize>,
    /// UTC seconds at commit time.
    pub ingested_at: u64,
}

/// Owns the [`VectorIndex`] and [`DocumentStore`] and keeps their row ids in
/// step.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    index: VectorIndex,
    store: DocumentStore,
    sources: Vec<SourceRecord>,
}

impl KnowledgeBase {
    pub fn new(dimension: usize) -> Self {
        Self {
            index: VectorIndex::new(dimension),
            store: DocumentStore::new(),
            sources: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Read-only view of the index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Read-only view of the store.
    pub fn document_store(&self) -> &DocumentStore {
        &self.store
    }

    /// Documents committed so far, in commit order.
    pub fn sources(&self) -> &[SourceRecord] {
        &self.sources
    }

    /// Earlier document with the same content hash, if any.
    pub fn find_by_hash(&self, content_hash: &str) -> Option<&SourceRecord> {
        self.sources.iter().find(|s| s.content_hash == content_hash)
    }

    /// Append `chunks` with their `embeddings` as consecutive rows.
    ///
    /// Counts and dimensions are checked for the whole batch before anything
    /// is written, so a rejected commit leaves the knowledge base unchanged.
    /// Returns the assigned row range.
    pub fn commit(
        &mut self,
        chunks: Vec<Chunk>,
        embeddings: Vec<Embedding>,
    ) -> Result<Range<usize>, CommitError> {
        if chunks.len() != embeddings.len() {
            return Err(CommitError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let expected = self.index.dimension();
        if let Some((position, bad)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != expected)
        {
            return Err(CommitError::DimensionMismatch {
                position,
                expected,
                actual: bad.len(),
            });
        }
        if let Some(position) = embeddings
            .iter()
            .position(|e| e.iter().any(|v| !v.is_finite()))
        {
            return Err(CommitError::NonFinite { position });
        }

        let start = self.index.len();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings.iter()) {
            let row = self.index.add(embedding);
            self.store.insert(row, chunk);
        }
        Ok(start..self.index.len())
    }

    /// Commit one document's rows and record it as a source.
    pub fn commit_source(
        &mut self,
        source_id: SourceId,
        content_hash: String,
        chunks: Vec<Chunk>,
        embeddings: Vec<Embedding>,
    ) -> Result<Range<usize>, CommitError> {
        let rows = self.commit(chunks, embeddings)?;
        self.sources.push(SourceRecord {
            source_id,
            content_hash,
            rows: rows.clone(),
            ingested_at: crate::utils::get_utc_timestamp(),
        });
        Ok(rows)
    }

    /// Nearest rows to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        self.index.search(query, k)
    }

    /// First row id present in only one of index and store, if any.
    pub fn find_inconsistency(&self) -> Option<RowId> {
        let rows = self.index.len();
        (0..rows)
            .map(RowId)
            .find(|row| !self.store.contains(*row))
            .or_else(|| self.store.ids().find(|row| row.0 >= rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                text: t.to_string(),
                source_id: SourceId::new("doc"),
                sequence_index: i,
                byte_range: (0, t.len()),
            })
            .collect()
    }

    #[test]
    fn test_commit_assigns_consecutive_rows() {
        let mut kb = KnowledgeBase::new(2);
        let rows = kb
            .commit(chunks(&["a", "b"]), vec![vec![0.0, 1.0], vec![1.0, 0.0]])
            .unwrap();
        assert_eq!(rows, 0..2);
        let rows = kb.commit(chunks(&["c"]), vec![vec![1.0, 1.0]]).unwrap();
        assert_eq!(rows, 2..3);
        assert_eq!(kb.document_store().get(RowId(2)).unwrap().text, "c");
        assert_eq!(kb.find_inconsistency(), None);
    }

    #[test]
    fn test_count_mismatch_writes_nothing() {
        let mut kb = KnowledgeBase::new(2);
        let err = kb.commit(chunks(&["a", "b"]), vec![vec![0.0, 1.0]]).unwrap_err();
        assert_eq!(
            err,
            CommitError::CountMismatch {
                chunks: 2,
                embeddings: 1
            }
        );
        assert!(kb.is_empty());
        assert!(kb.document_store().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_writes_nothing() {
        let mut kb = KnowledgeBase::new(2);
        let err = kb
            .commit(
                chunks(&["a", "b", "c"]),
                vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0]],
            )
            .unwrap_err();
        assert!(matches!(err, CommitError::DimensionMismatch { position: 2, .. }));
        assert_eq!(kb.len(), 0);
        assert!(kb.document_store().is_empty());
    }

    #[test]
    fn test_non_finite_embedding_writes_nothing() {
        let mut kb = KnowledgeBase::new(2);
        let err = kb
            .commit(
                chunks(&["a", "b"]),
                vec![vec![0.0, 1.0], vec![f32::INFINITY, 0.0]],
            )
            .unwrap_err();
        assert_eq!(err, CommitError::NonFinite { position: 1 });
        assert!(kb.is_empty());
        assert!(kb.document_store().is_empty());
    }

    #[test]
    fn test_source_records() {
        let mut kb = KnowledgeBase::new(1);
        kb.commit_source(
            SourceId::new("faq.txt"),
            "abc".to_string(),
            chunks(&["x", "y"]),
            vec![vec![0.0], vec![1.0]],
        )
        .unwrap();
        let record = kb.find_by_hash("abc").unwrap();
        assert_eq!(record.source_id.as_str(), "faq.txt");
        assert_eq!(record.rows, 0..2);
        assert!(kb.find_by_hash("def").is_none());
    }

    #[test]
    fn test_search_through_knowledge_base() {
        let mut kb = KnowledgeBase::new(1);
        kb.commit(chunks(&["far", "near"]), vec![vec![10.0], vec![1.0]])
            .unwrap();
        let hits = kb.search(&[0.0], 1);
        assert_eq!(hits[0].row, RowId(1));
    }
}

//! Document loading and chunking for retrieval-augmented QA.
//!
//! This module provides:
//! - Loaders that turn PDFs, scans and text files into page text
//! - A separator-aware chunker with bounded overlap
//! - The `Chunk` type stored by the knowledge base

pub mod chunker;
pub mod config;
pub mod loader;
pub mod types;

pub use chunker::{Chunker, RawChunk, RecursiveChunker, chunk_text, reassemble};
pub use config::ChunkingConfig;
pub use loader::{
    DocumentLoader, DocumentParseError, FormRecognizerLoader, LoaderRegistry, OcrConfig,
    PdfLoader, TextLoader,
};
pub use types::{Chunk, DocumentKind, DocumentSource, PageText, SourceId, join_pages};

/// Attach source identity and sequence numbers to raw chunks.
pub fn into_chunks(raw: Vec<RawChunk>, source_id: &SourceId) -> Vec<Chunk> {
    raw.into_iter()
        .enumerate()
        .map(|(sequence_index, raw)| Chunk {
            text: raw.content,
            source_id: source_id.clone(),
            sequence_index,
            byte_range: raw.byte_range,
        })
        .collect()
}

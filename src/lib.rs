//! Retrieval-augmented document QA for the HSBC customer-service assistant.
//!
//! Documents are loaded, chunked, embedded and committed to an in-memory
//! knowledge base; questions are answered by an LLM grounded on the nearest
//! chunks. A Refinitiv news summarizer rides on the same chunker and LLM.

pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod http;
pub mod llm;
pub mod logging;
pub mod news;
pub mod pipeline;
pub mod qa;
pub mod utils;
pub mod vector;

pub use config::Settings;
pub use documents::{
    Chunk, ChunkingConfig, DocumentKind, DocumentParseError, DocumentSource, PageText, SourceId,
};
pub use embedding::{Embedding, EmbeddingError, EmbeddingProvider};
pub use llm::{CompletionRequest, LlmCallError, LlmProvider};
pub use pipeline::{PipelineError, RagPipeline};
pub use qa::{Answerer, StoreInconsistencyError};
pub use vector::{DocumentStore, KnowledgeBase, RowId, VectorIndex};

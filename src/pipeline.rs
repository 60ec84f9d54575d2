//! Ingestion and query orchestration.
//!
//! Ingest: load -> chunk -> embed (batched) -> commit under the write lock.
//! Query: embed the question -> exact k-NN over the index.
//!
//! Embedding happens outside the lock, so concurrent `ingest` calls only
//! serialize on the commit and row ids stay dense.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{self, Settings};
use crate::documents::{
    self, Chunk, ChunkingConfig, DocumentKind, DocumentLoader, DocumentParseError,
    DocumentSource, FormRecognizerLoader, LoaderRegistry, SourceId,
};
use crate::embedding::{self, EmbeddingError, EmbeddingProvider, OpenAiEmbedder};
use crate::llm::{LlmCallError, LlmProvider, OpenAiChat};
use crate::qa::{AnswerError, Answerer, StoreInconsistencyError};
use crate::vector::{CommitError, DocumentStore, KnowledgeBase, RowId};

/// Any failure surfaced by [`RagPipeline`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] DocumentParseError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Store(#[from] StoreInconsistencyError),

    #[error(transparent)]
    Llm(#[from] LlmCallError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<AnswerError> for PipelineError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::Store(e) => Self::Store(e),
            AnswerError::Llm(e) => Self::Llm(e),
        }
    }
}

/// Outcome of ingesting a directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents committed.
    pub documents: usize,
    /// Chunks committed across all documents.
    pub chunks: usize,
    /// Files with no loader.
    pub skipped: Vec<PathBuf>,
    /// Documents that failed to parse, with the reason.
    pub failed: Vec<(SourceId, String)>,
}

/// Retrieval-augmented QA over an in-memory knowledge base.
pub struct RagPipeline {
    loaders: LoaderRegistry,
    chunking: ChunkingConfig,
    embedder: Box<dyn EmbeddingProvider>,
    llm: Box<dyn LlmProvider>,
    answerer: Answerer,
    knowledge: Arc<RwLock<KnowledgeBase>>,
    top_k: usize,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("chunking", &self.chunking)
            .field("dimension", &self.embedder.dimension())
            .field("rows", &self.knowledge.read().len())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl RagPipeline {
    /// Create a pipeline with the default loaders (PDF and text).
    pub fn new(
        chunking: ChunkingConfig,
        embedder: Box<dyn EmbeddingProvider>,
        llm: Box<dyn LlmProvider>,
    ) -> Result<Self, PipelineError> {
        chunking.validate().map_err(PipelineError::InvalidConfig)?;
        let dimension = embedder.dimension();
        if dimension == 0 {
            return Err(PipelineError::InvalidConfig(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            loaders: LoaderRegistry::new(),
            chunking,
            embedder,
            llm,
            answerer: Answerer::default(),
            knowledge: Arc::new(RwLock::new(KnowledgeBase::new(dimension))),
            top_k: 3,
        })
    }

    /// Build the OpenAI/Azure-backed pipeline described by `settings`.
    ///
    /// API keys are read from the environment variables named in each
    /// section.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let embed_key = config::api_key(&settings.embedding.api_key_env)
            .map_err(PipelineError::InvalidConfig)?;
        let embedder = OpenAiEmbedder::new(&settings.embedding, &embed_key, settings.retry.clone())?;

        let llm_key =
            config::api_key(&settings.llm.api_key_env).map_err(PipelineError::InvalidConfig)?;
        let llm = OpenAiChat::new(&settings.llm, &llm_key, settings.retry.clone())?;

        Ok(Self::new(settings.chunking.clone(), Box::new(embedder), Box::new(llm))?
            .with_loaders(loader_registry(settings)?)
            .with_answerer(Answerer::new(settings.llm.max_tokens, settings.llm.temperature))
            .with_top_k(settings.retrieval.top_k))
    }

    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn with_answerer(mut self, answerer: Answerer) -> Self {
        self.answerer = answerer;
        self
    }

    /// Number of chunks retrieved by [`ask`](Self::ask).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Shared handle to the knowledge base.
    pub fn knowledge(&self) -> Arc<RwLock<KnowledgeBase>> {
        Arc::clone(&self.knowledge)
    }

    /// Rows committed so far.
    pub fn len(&self) -> usize {
        self.knowledge.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.knowledge.read().is_empty()
    }

    /// Load, chunk, embed and commit one document.
    ///
    /// Returns the number of chunks added. Nothing is committed unless every
    /// chunk was embedded.
    pub fn ingest(&self, source: &DocumentSource) -> Result<usize, PipelineError> {
        let chunks = load_chunks(&self.loaders, source, &self.chunking)?;
        if chunks.is_empty() {
            tracing::warn!(target: "ingest", "{} produced no text, nothing to index", source.id);
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedding::embed_all(self.embedder.as_ref(), &texts)?;

        let content_hash = crate::utils::calculate_hash(&source.bytes);
        let added = chunks.len();
        let rows = {
            let mut kb = self.knowledge.write();
            if let Some(previous) = kb.find_by_hash(&content_hash) {
                tracing::warn!(
                    target: "ingest",
                    "{} has the same content as {}, indexing it again",
                    source.id,
                    previous.source_id
                );
            }
            kb.commit_source(source.id.clone(), content_hash, chunks, embeddings)?
        };

        crate::log_event!(
            "ingest",
            "committed",
            "{} chunk(s) from {} as rows {}..{}",
            added,
            source.id,
            rows.start,
            rows.end
        );
        Ok(added)
    }

    /// Ingest a file, or every supported file below a directory.
    pub fn ingest_path(&self, path: &Path) -> Result<IngestReport, PipelineError> {
        if path.is_dir() {
            return self.ingest_directory(path);
        }
        let source = DocumentSource::from_path(path)?;
        let chunks = self.ingest(&source)?;
        Ok(IngestReport {
            documents: 1,
            chunks,
            ..Default::default()
        })
    }

    /// Ingest every supported file below `dir` in file-name order.
    ///
    /// Unsupported files are skipped and parse failures are recorded; both
    /// leave the rest of the directory unaffected. Embedding and commit
    /// failures stop the walk.
    pub fn ingest_directory(&self, dir: &Path) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport::default();

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(target: "ingest", "skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let supported = DocumentKind::from_path(path).is_some_and(|k| self.loaders.supports(k));
            if !supported {
                tracing::warn!(target: "ingest", "skipping unsupported file {}", path.display());
                report.skipped.push(path.to_path_buf());
                continue;
            }

            let result = DocumentSource::from_path(path)
                .map_err(PipelineError::from)
                .and_then(|source| self.ingest(&source));
            match result {
                Ok(chunks) => {
                    report.documents += 1;
                    report.chunks += chunks;
                }
                Err(PipelineError::Parse(err)) => {
                    tracing::warn!(target: "ingest", "{err}");
                    report.failed.push((err.source_id().clone(), err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            target: "ingest",
            "{}: {} document(s), {} chunk(s), {} skipped, {} failed",
            dir.display(),
            report.documents,
            report.chunks,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Row ids of the `k` chunks nearest to `question`.
    ///
    /// An empty knowledge base or `k == 0` returns no rows without calling
    /// the embedder.
    pub fn query(&self, question: &str, k: usize) -> Result<Vec<RowId>, PipelineError> {
        if k == 0 || self.knowledge.read().is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(question)?;
        embedding::check_dimension(self.embedder.dimension(), &vector)?;

        let rows: Vec<RowId> = self
            .knowledge
            .read()
            .search(&vector, k)
            .into_iter()
            .map(|hit| hit.row)
            .collect();
        crate::debug_event!("query", "hits", "{} for {:?}", rows.len(), question);
        Ok(rows)
    }

    /// Retrieve the top chunks for `question` and answer from them.
    pub fn ask(&self, question: &str) -> Result<String, PipelineError> {
        let rows = self.query(question, self.top_k)?;
        // Copy the hits out so the LLM call runs without holding the lock
        let context = self.snapshot(&rows);
        let answer = self
            .answerer
            .answer(question, &rows, &context, self.llm.as_ref())?;
        Ok(answer)
    }

    /// Chunks behind `rows`, copied out of the shared store.
    pub fn snapshot(&self, rows: &[RowId]) -> DocumentStore {
        let kb = self.knowledge.read();
        let mut store = DocumentStore::new();
        for &row in rows {
            if let Some(chunk) = kb.document_store().get(row) {
                store.insert(row, chunk.clone());
            }
        }
        store
    }
}

/// Load `source` and split it into chunks.
pub fn load_chunks(
    loader: &dyn DocumentLoader,
    source: &DocumentSource,
    chunking: &ChunkingConfig,
) -> Result<Vec<Chunk>, DocumentParseError> {
    let pages = loader.load(source)?;
    let text = documents::join_pages(&pages);
    let raw = documents::chunk_text(&text, chunking);
    tracing::debug!(
        target: "ingest",
        "{}: {} page(s), {} chars, {} chunk(s)",
        source.id,
        pages.len(),
        text.chars().count(),
        raw.len()
    );
    Ok(documents::into_chunks(raw, &source.id))
}

/// Loader registry for `settings`, with OCR when enabled.
pub fn loader_registry(settings: &Settings) -> Result<LoaderRegistry, PipelineError> {
    let registry = LoaderRegistry::new();
    if !settings.ocr.enabled {
        return Ok(registry);
    }
    let key = config::api_key(&settings.ocr.api_key_env).map_err(PipelineError::InvalidConfig)?;
    let ocr = FormRecognizerLoader::new(&settings.ocr, &key, settings.retry.clone())
        .map_err(PipelineError::InvalidConfig)?;
    Ok(registry.with_image_loader(Box::new(ocr)))
}

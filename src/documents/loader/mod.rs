//! Text extraction from source documents.
//!
//! Each loader turns a [`DocumentSource`] into ordered page texts. The
//! [`LoaderRegistry`] dispatches on [`DocumentKind`].

mod ocr;
mod pdf;
mod text;

pub use ocr::{FormRecognizerLoader, OcrConfig};
pub use pdf::{PdfLoader, clean_pdf_text};
pub use text::TextLoader;

use thiserror::Error;

use super::types::{DocumentKind, DocumentSource, PageText, SourceId};

/// Errors raised while extracting text from a source document.
#[derive(Error, Debug)]
pub enum DocumentParseError {
    #[error("unsupported document {source_id}: {reason}")]
    Unsupported { source_id: SourceId, reason: String },

    #[error("failed to read {source_id}: {source}")]
    Read {
        source_id: SourceId,
        source: std::io::Error,
    },

    #[error("failed to extract text from {source_id}: {reason}")]
    Extraction { source_id: SourceId, reason: String },
}

impl DocumentParseError {
    /// Identifier of the document that failed.
    pub fn source_id(&self) -> &SourceId {
        match self {
            Self::Unsupported { source_id, .. }
            | Self::Read { source_id, .. }
            | Self::Extraction { source_id, .. } => source_id,
        }
    }

    pub(crate) fn extraction(source_id: &SourceId, reason: impl Into<String>) -> Self {
        Self::Extraction {
            source_id: source_id.clone(),
            reason: reason.into(),
        }
    }
}

/// Trait for text extraction backends.
pub trait DocumentLoader: Send + Sync {
    /// Extract ordered page texts from a document.
    fn load(&self, source: &DocumentSource) -> Result<Vec<PageText>, DocumentParseError>;
}

/// Dispatches to the loader registered for each document kind.
pub struct LoaderRegistry {
    pdf: Box<dyn DocumentLoader>,
    text: Box<dyn DocumentLoader>,
    image: Option<Box<dyn DocumentLoader>>,
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("has_image_loader", &self.image.is_some())
            .finish()
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self {
            pdf: Box::new(PdfLoader::new()),
            text: Box::new(TextLoader::new()),
            image: None,
        }
    }
}

impl LoaderRegistry {
    /// Registry with PDF and text support; images need [`Self::with_image_loader`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable OCR for scanned images.
    pub fn with_image_loader(mut self, loader: Box<dyn DocumentLoader>) -> Self {
        self.image = Some(loader);
        self
    }

    /// Whether documents of `kind` can be loaded.
    pub fn supports(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Pdf | DocumentKind::Text => true,
            DocumentKind::Image => self.image.is_some(),
        }
    }
}

impl DocumentLoader for LoaderRegistry {
    fn load(&self, source: &DocumentSource) -> Result<Vec<PageText>, DocumentParseError> {
        tracing::debug!(target: "loader", "loading {} as {:?}", source.id, source.kind);
        match source.kind {
            DocumentKind::Pdf => self.pdf.load(source),
            DocumentKind::Text => self.text.load(source),
            DocumentKind::Image => match &self.image {
                Some(loader) => loader.load(source),
                None => Err(DocumentParseError::Unsupported {
                    source_id: source.id.clone(),
                    reason: "image OCR is not configured".to_string(),
                }),
            },
        }
    }
}

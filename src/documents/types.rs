//! Core types for loaded documents and their chunks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::loader::DocumentParseError;

/// Identifier of a source document (usually its path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a source id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for SourceId {
    fn from(path: &Path) -> Self {
        Self(path.display().to_string())
    }
}

/// Supported source document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// Scanned image (PNG or JPEG), text recovered by OCR.
    Image,
    /// Plain text or markdown.
    Text,
}

impl DocumentKind {
    /// Detect the kind from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            "txt" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }

    /// MIME type sent to remote extraction services.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Image => "application/octet-stream",
            Self::Text => "text/plain",
        }
    }
}

/// Raw document content together with its identity.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Identifier carried into chunks and errors.
    pub id: SourceId,

    /// Detected or declared format.
    pub kind: DocumentKind,

    /// Original path, when loaded from disk.
    pub path: Option<PathBuf>,

    /// File content.
    pub bytes: Vec<u8>,
}

impl DocumentSource {
    /// Read a document from disk, detecting its kind from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentParseError> {
        let path = path.as_ref();
        let id = SourceId::from(path);
        let kind = DocumentKind::from_path(path).ok_or_else(|| DocumentParseError::Unsupported {
            source_id: id.clone(),
            reason: format!(
                "unrecognized extension {:?}",
                path.extension().map(|e| e.to_string_lossy().into_owned())
            ),
        })?;
        let bytes = std::fs::read(path).map_err(|e| DocumentParseError::Read {
            source_id: id.clone(),
            source: e,
        })?;
        Ok(Self {
            id,
            kind,
            path: Some(path.to_path_buf()),
            bytes,
        })
    }

    /// Wrap an in-memory byte stream.
    pub fn from_bytes(id: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            id: SourceId::new(id),
            kind,
            path: None,
            bytes,
        }
    }

    /// Wrap plain text, mostly useful for tests and pasted content.
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_bytes(id, DocumentKind::Text, text.into().into_bytes())
    }
}

/// Text extracted from one page of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// One-based page number.
    pub page_number: usize,

    /// Cleaned page text.
    pub text: String,
}

impl PageText {
    /// Create a page.
    pub fn new(page_number: usize, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Join pages into the single text the chunker works on.
///
/// Pages are separated by a paragraph break so the chunker prefers cutting
/// between them.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A chunk of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk's text, a contiguous substring of the document text.
    pub text: String,

    /// Document this chunk came from.
    pub source_id: SourceId,

    /// Position of this chunk within its document.
    pub sequence_index: usize,

    /// Byte range in the joined document text (start, end).
    pub byte_range: (usize, usize),
}

impl Chunk {
    /// Get a preview of the content (first N bytes, on a char boundary).
    pub fn preview(&self, max_bytes: usize) -> &str {
        if self.text.len() <= max_bytes {
            &self.text
        } else {
            let mut end = max_bytes;
            while end > 0 && !self.text.is_char_boundary(end) {
                end -= 1;
            }
            &self.text[..end]
        }
    }

    /// Length of the text in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

//! PDF text extraction with layout cleanup.

use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use regex::Regex;

use super::{DocumentLoader, DocumentParseError};
use crate::documents::types::{DocumentSource, PageText};

static HYPHENATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)-\n(\w+)").expect("valid hyphenation regex"));

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"));

/// Loader for PDF documents backed by `pdf-extract`.
#[derive(Debug, Default)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for PdfLoader {
    fn load(&self, source: &DocumentSource) -> Result<Vec<PageText>, DocumentParseError> {
        // pdf-extract panics on some malformed fonts and encodings
        let raw = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(&source.bytes)
        }))
        .map_err(|payload| {
            DocumentParseError::extraction(
                &source.id,
                format!("PDF parser panicked: {}", panic_message(payload.as_ref())),
            )
        })?
        .map_err(|e| DocumentParseError::extraction(&source.id, e.to_string()))?;

        // pdf-extract separates pages with form feeds
        let pages: Vec<PageText> = raw
            .split('\u{000C}')
            .map(clean_pdf_text)
            .enumerate()
            .map(|(idx, text)| PageText::new(idx + 1, text))
            .collect();

        let non_empty = pages.iter().filter(|p| !p.text.is_empty()).count();
        tracing::debug!(
            target: "loader",
            "extracted {} page(s) from {} ({non_empty} with text)",
            pages.len(),
            source.id
        );

        Ok(pages)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

/// Undo PDF line layout: rejoin hyphenated words, turn single line breaks
/// into spaces, and collapse blank-line runs into one paragraph break.
pub fn clean_pdf_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = HYPHENATED.replace_all(&text, "$1$2");
    PARAGRAPH_BREAK
        .split(text.trim())
        .map(|para| {
            para.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

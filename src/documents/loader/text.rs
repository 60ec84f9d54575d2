use super::{DocumentLoader, DocumentParseError};
use crate::documents::types::{DocumentSource, PageText};

/// Loader for UTF-8 text and markdown files. The whole file is one page.
#[derive(Debug, Default)]
pub struct TextLoader;

impl TextLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for TextLoader {
    fn load(&self, source: &DocumentSource) -> Result<Vec<PageText>, DocumentParseError> {
        let text = std::str::from_utf8(&source.bytes).map_err(|e| {
            DocumentParseError::extraction(&source.id, format!("invalid UTF-8: {e}"))
        })?;
        Ok(vec![PageText::new(1, text)])
    }
}

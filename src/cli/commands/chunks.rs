//! Chunks command: preview chunking offline.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::documents::DocumentSource;
use crate::pipeline;

pub fn run(
    settings: &Settings,
    path: &Path,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    preview: usize,
) -> Result<()> {
    let mut chunking = settings.chunking.clone();
    if let Some(size) = chunk_size {
        chunking.chunk_size = size;
    }
    if let Some(overlap) = chunk_overlap {
        chunking.chunk_overlap = overlap;
    }
    if let Err(e) = chunking.validate() {
        bail!("invalid chunking settings: {e}");
    }

    let loaders = pipeline::loader_registry(settings)?;
    let source = DocumentSource::from_path(path)?;
    let chunks = pipeline::load_chunks(&loaders, &source, &chunking)
        .with_context(|| format!("failed to chunk {}", path.display()))?;

    println!(
        "{}: {} chunk(s) (size {}, overlap {})",
        source.id,
        chunks.len(),
        chunking.chunk_size,
        chunking.chunk_overlap
    );
    for chunk in &chunks {
        let (start, end) = chunk.byte_range;
        println!(
            "\n#{} bytes {start}..{end}, {} chars",
            chunk.sequence_index,
            chunk.char_count()
        );
        println!("{}", chunk.preview(preview).replace('\n', " "));
    }
    Ok(())
}

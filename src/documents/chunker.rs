//! Document chunking strategies.
//!
//! Provides the `Chunker` trait and a recursive separator-aware implementation
//! that splits document text into overlapping windows suitable for embedding.

use super::config::ChunkingConfig;

/// A raw chunk before it is attached to a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Byte range in the source text (start, end).
    pub byte_range: (usize, usize),

    /// The text content of this chunk.
    pub content: String,
}

impl RawChunk {
    /// Get character count.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Trait for document chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split document content into chunks.
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk>;
}

/// Recursive chunker: cuts at the softest separator that fits.
///
/// Algorithm:
/// 1. If the rest of the text fits in `chunk_size`, emit it and stop
/// 2. Otherwise look inside the next `chunk_size` characters for the last
///    occurrence of each separator in priority order; cut after the first one
///    that leaves the chunk longer than `chunk_overlap`
/// 3. Fall back to a hard cut at `chunk_size` characters
/// 4. Start the next chunk inside the trailing `chunk_overlap` characters,
///    right after the highest-priority separator found there
#[derive(Debug, Default)]
pub struct RecursiveChunker;

impl RecursiveChunker {
    /// Create a new recursive chunker.
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk> {
        if content.is_empty() {
            return Vec::new();
        }

        let bounds = char_boundaries(content);
        let total = bounds.len() - 1;
        let size = config.chunk_size.max(1);
        let overlap = config.chunk_overlap.min(size - 1);

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            if total - start <= size {
                chunks.push(slice(content, &bounds, start, total));
                break;
            }

            let end = find_split(
                content,
                &bounds,
                start,
                start + size,
                start + overlap,
                &config.separators,
            );
            chunks.push(slice(content, &bounds, start, end));

            // end > start + overlap, so the window start is always past `start`
            let window_start = end - overlap;
            start = find_next_start(content, &bounds, start, window_start, end, &config.separators);
        }

        chunks
    }
}

/// Split text with the default chunker.
pub fn chunk_text(content: &str, config: &ChunkingConfig) -> Vec<RawChunk> {
    RecursiveChunker::new().chunk(content, config)
}

/// Byte offset of every char start, plus the total length.
fn char_boundaries(content: &str) -> Vec<usize> {
    content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .collect()
}

fn char_index(bounds: &[usize], byte: usize) -> usize {
    // Separator matches always land on char boundaries.
    bounds.binary_search(&byte).unwrap_or_else(|i| i)
}

fn slice(content: &str, bounds: &[usize], start: usize, end: usize) -> RawChunk {
    let (byte_start, byte_end) = (bounds[start], bounds[end]);
    RawChunk {
        byte_range: (byte_start, byte_end),
        content: content[byte_start..byte_end].to_string(),
    }
}

/// Char position (exclusive) where the chunk starting at `start` ends.
fn find_split(
    content: &str,
    bounds: &[usize],
    start: usize,
    limit: usize,
    min_end: usize,
    separators: &[String],
) -> usize {
    let base = bounds[start];
    let window = &content[base..bounds[limit]];

    for sep in separators.iter().filter(|s| !s.is_empty()) {
        if let Some(pos) = window.rfind(sep.as_str()) {
            let end = char_index(bounds, base + pos + sep.len());
            if end > min_end {
                return end;
            }
        }
    }

    limit
}

/// Char position where the chunk after `[chunk_start, end)` begins.
fn find_next_start(
    content: &str,
    bounds: &[usize],
    chunk_start: usize,
    window_start: usize,
    end: usize,
    separators: &[String],
) -> usize {
    let base = bounds[chunk_start];
    let region = &content[base..bounds[end]];

    for sep in separators.iter().filter(|s| !s.is_empty()) {
        let found = region
            .match_indices(sep.as_str())
            .map(|(pos, _)| char_index(bounds, base + pos + sep.len()))
            .find(|&after| after >= window_start);
        if let Some(next) = found {
            return next;
        }
    }

    window_start
}

/// Rebuild the original text from chunks by dropping each chunk's overlap
/// with its predecessor.
pub fn reassemble(chunks: &[RawChunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let (start, end) = chunk.byte_range;
        if end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(start);
        out.push_str(&chunk.content[skip..]);
        covered = end;
    }
    out
}

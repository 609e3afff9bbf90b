//! Overlapping-window text chunker.
//!
//! Splits a document's text into windows of at most `chunk_size`
//! characters, each sharing `chunk_overlap` characters with its
//! predecessor. A window that would end mid-sentence is pulled back to the
//! last sentence end (or, failing that, the last whitespace) in its final
//! fifth, so most chunks end on a natural boundary.
//!
//! Offsets and sizes count `char`s, not bytes, so multi-byte text never
//! splits inside a code point.
//!
//! ```rust
//! use ragbot_core::chunk::{chunk_document, ChunkPolicy};
//! use ragbot_core::models::{Document, DocumentFormat};
//!
//! let doc = Document::new("notes.txt", "notes", DocumentFormat::Text, "Short note.");
//! let chunks = chunk_document(&doc, &ChunkPolicy::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].offset, 0);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{Chunk, Document};

/// Window length and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkPolicy {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.chunk_size > 0 && self.chunk_overlap < self.chunk_size
    }
}

/// Chunk a document's text with the given policy.
///
/// Whitespace-only windows are dropped, so an empty document yields no
/// chunks. Indices are contiguous from 0.
pub fn chunk_document(doc: &Document, policy: &ChunkPolicy) -> Vec<Chunk> {
    chunk_text(&doc.source_id, &doc.text, policy)
}

pub fn chunk_text(source_id: &str, text: &str, policy: &ChunkPolicy) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let size = policy.chunk_size.max(1);
    let step = size - policy.chunk_overlap.min(size - 1);

    let mut chunks = Vec::new();
    let mut next = 0;

    loop {
        // Windows start on content, so offsets strictly increase.
        let Some(start) = (next..total).find(|&p| !chars[p].is_whitespace()) else {
            break;
        };
        let end = (start + size).min(total);
        let cut = if end < total {
            boundary_before(&chars, start, end, size)
        } else {
            end
        };

        let piece: String = chars[start..cut].iter().collect();
        chunks.push(make_chunk(source_id, start, chunks.len(), piece.trim_end()));

        if cut >= total {
            break;
        }
        // A window pulled back to a boundary never leaves a gap.
        next = start + step.min(cut - start);
    }

    chunks
}

/// Pick where a window starting at `start` should end, at or before `end`.
fn boundary_before(chars: &[char], start: usize, end: usize, size: usize) -> usize {
    let floor = (start + size * 4 / 5).max(start + 1);

    let sentence_end = (floor..end)
        .rev()
        .find(|&p| chars[p].is_whitespace() && matches!(chars[p - 1], '.' | '!' | '?'));
    if let Some(p) = sentence_end {
        return p;
    }

    (floor..end)
        .rev()
        .find(|&p| chars[p].is_whitespace())
        .unwrap_or(end)
}

fn make_chunk(source_id: &str, offset: usize, index: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());

    Chunk {
        source_id: source_id.to_string(),
        offset,
        index,
        text: text.to_string(),
        hash: format!("{:x}", hasher.finalize()),
    }
}

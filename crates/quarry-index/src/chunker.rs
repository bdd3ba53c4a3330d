//! Line-boundary chunking with fixed character overlap.

use uuid::Uuid;

/// One chunk of a source file: a contiguous run of whole lines.
///
/// Offsets are character offsets into the original file content, so the
/// overlap between consecutive chunks is exactly
/// `previous.end_offset - next.start_offset` characters.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub file_path: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Chunk {
    /// Stable identity for upsert. See [`chunk_id`].
    #[must_use]
    pub fn id(&self) -> String {
        chunk_id(&self.file_path, self.start_offset)
    }
}

/// Deterministic chunk identity derived from file path and start offset.
///
/// Same inputs yield the same id across runs, so re-indexing unchanged
/// content overwrites in place instead of accumulating duplicates.
/// UUIDv5 keeps the id a valid vector store point id.
#[must_use]
pub fn chunk_id(file_path: &str, start_offset: usize) -> String {
    let name = format!("{file_path}:{start_offset}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Target chunk size in characters (default 800). A single line
    /// longer than this becomes its own oversized chunk.
    pub chunk_size: usize,
    /// Characters of the previous chunk re-included at the start of the
    /// next, rounded down to a line boundary (default 100).
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 100,
        }
    }
}

#[derive(Clone, Copy)]
struct Line {
    char_off: usize,
    byte_off: usize,
    chars: usize,
    bytes: usize,
}

/// Split file content into overlapping chunks on line boundaries.
///
/// Whole lines accumulate until the next line would exceed the target
/// size; lines are never split across chunks, so no chunk exceeds the
/// target unless a single line does. Empty and whitespace-only content
/// yields no chunks. Output is in file order (ascending
/// `start_offset`).
#[must_use]
pub fn chunk_file(file_path: &str, content: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    let mut current_chars = 0usize;

    let mut char_off = 0usize;
    let mut byte_off = 0usize;

    for raw in content.split_inclusive('\n') {
        let line = Line {
            char_off,
            byte_off,
            chars: raw.chars().count(),
            bytes: raw.len(),
        };

        if !current.is_empty() && current_chars + line.chars > config.chunk_size {
            // The tail may not eat the room the incoming line needs, or
            // the next chunk would blow past the target on its own.
            let tail_budget = config.chunk_size.saturating_sub(line.chars);
            let (tail, tail_chars) =
                flush(&mut chunks, file_path, content, &current, config, tail_budget);
            current = tail;
            current_chars = tail_chars;
        }

        current.push(line);
        current_chars += line.chars;
        char_off += line.chars;
        byte_off += line.bytes;
    }

    if !current.is_empty() {
        flush(&mut chunks, file_path, content, &current, config, 0);
    }

    chunks
}

/// Emit the accumulated lines as one chunk (unless whitespace-only) and
/// return the trailing lines that seed the next chunk's overlap.
fn flush(
    chunks: &mut Vec<Chunk>,
    file_path: &str,
    content: &str,
    lines: &[Line],
    config: &ChunkerConfig,
    tail_budget: usize,
) -> (Vec<Line>, usize) {
    let first = lines[0];
    let last = lines[lines.len() - 1];
    let text = &content[first.byte_off..last.byte_off + last.bytes];

    if text.trim().is_empty() {
        return (Vec::new(), 0);
    }

    chunks.push(Chunk {
        file_path: file_path.to_owned(),
        text: text.to_owned(),
        start_offset: first.char_off,
        end_offset: last.char_off + last.chars,
    });

    // Overlap tail: trailing whole lines totalling at most `overlap`
    // characters, within the caller's budget. Never the whole chunk —
    // the next chunk would then reuse this start offset and collide on
    // id.
    let max_tail = config.overlap.min(tail_budget);
    let mut tail_start = lines.len();
    let mut tail_chars = 0usize;
    while tail_start > 1 {
        let line = lines[tail_start - 1];
        if tail_chars + line.chars > max_tail {
            break;
        }
        tail_chars += line.chars;
        tail_start -= 1;
    }

    (lines[tail_start..].to_vec(), tail_chars)
}

//! Overlapping character-window text chunker.
//!
//! Splits the concatenated corpus into [`Chunk`]s of at most `max_chars`
//! characters. Adjacent chunks share exactly `overlap_chars` characters so
//! that a sentence cut by a window boundary is still seen whole by at least
//! one chunk.
//!
//! Window ends are pulled back to a line break (or, failing that, any
//! whitespace) when one exists far enough into the window; otherwise the
//! window is cut at `max_chars`. Lengths are counted in `char`s and slicing
//! never splits a UTF-8 sequence.

use crate::models::Chunk;

/// Split text into overlapping chunks with contiguous indices starting at 0.
///
/// Returns an empty vector for empty input.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    let overlap = overlap_chars.min(max_chars - 1);

    // Byte offset of every char boundary, including the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + max_chars).min(total);
        let end = if hard_end < total {
            soft_end(&chars, start + overlap + 1, hard_end)
        } else {
            hard_end
        };

        chunks.push(Chunk {
            index: chunks.len(),
            text: text[bounds[start]..bounds[end]].to_string(),
        });

        if end == total {
            break;
        }
        // end > start + overlap, so this always advances
        start = end - overlap;
    }

    chunks
}

/// Latest window end in `min_end..=hard_end` that falls right after a line
/// break, else right after whitespace, else `hard_end`.
fn soft_end(chars: &[char], min_end: usize, hard_end: usize) -> usize {
    if min_end > hard_end {
        return hard_end;
    }
    let after = |pred: fn(char) -> bool| (min_end..=hard_end).rev().find(|&e| pred(chars[e - 1]));
    after(|c| c == '\n')
        .or_else(|| after(char::is_whitespace))
        .unwrap_or(hard_end)
}

/// Rebuild the source text from chunks produced with the same overlap.
pub fn merge_chunks(chunks: &[Chunk], overlap_chars: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap_chars));
        }
    }
    out
}

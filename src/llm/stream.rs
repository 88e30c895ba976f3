//! Incremental decoding of streamed chat responses.
//!
//! Providers stream either Server-Sent Events (`data: {...}` lines) or
//! newline-delimited JSON. Network chunks do not respect line boundaries, so
//! bytes are buffered in a [`LineBuffer`] and only complete lines are handed
//! to the provider's line parser.

use std::collections::VecDeque;

use anyhow::Result;
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// A lazy, finite stream of answer fragments. Concatenating every `Ok`
/// fragment yields the full answer; an `Err` item ends the stream. A stream
/// that ends without an `Err` has delivered the complete answer.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// What a provider's line parser made of one line.
#[derive(Debug, PartialEq)]
pub enum LineEvent {
    Fragment(String),
    Skip,
    Done,
}

/// Accumulates bytes and yields complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and drain every complete line (without `\r\n` / `\n`).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(decode_line(&line[..line.len() - 1]));
        }
        lines
    }

    /// The trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        Some(decode_line(&line))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

struct DecodeState<S, F> {
    bytes: std::pin::Pin<Box<S>>,
    lines: LineBuffer,
    pending: VecDeque<Result<String>>,
    parse: F,
    finished: bool,
}

impl<S, F> DecodeState<S, F>
where
    F: FnMut(&str) -> Result<LineEvent>,
{
    /// Feed lines to the parser until one ends the stream.
    fn handle_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            match (self.parse)(&line) {
                Ok(LineEvent::Fragment(f)) if !f.is_empty() => self.pending.push_back(Ok(f)),
                Ok(LineEvent::Fragment(_)) | Ok(LineEvent::Skip) => {}
                Ok(LineEvent::Done) => {
                    self.finished = true;
                    return;
                }
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turn a byte stream into a [`FragmentStream`] using `parse` per line.
///
/// The stream completes only once `parse` reports [`LineEvent::Done`]. A
/// connection that closes before that yields a final error, so a cut-off
/// reply is never mistaken for a whole one.
pub fn decode_lines<S, B, E, F>(bytes: S, parse: F) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
    F: FnMut(&str) -> Result<LineEvent> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        lines: LineBuffer::default(),
        pending: VecDeque::new(),
        parse,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.lines.push(chunk.as_ref());
                    st.handle_lines(lines);
                }
                Some(Err(e)) => {
                    st.pending
                        .push_back(Err(anyhow::Error::new(e).context("reading response stream")));
                    st.finished = true;
                }
                None => {
                    let tail = st.lines.finish().into_iter().collect();
                    st.handle_lines(tail);
                    // neither an end marker nor a parse error in the tail
                    if !st.finished {
                        st.pending
                            .push_back(Err(anyhow::anyhow!("stream ended before completion")));
                    }
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

/// Wrap already-known fragments as a [`FragmentStream`].
#[cfg(test)]
pub(crate) fn from_fragments<I>(fragments: I) -> FragmentStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    stream::iter(fragments.into_iter().map(Ok)).boxed()
}

/// Parse an SSE line: comments and non-`data:` fields are skipped, the
/// payload of a `data:` line is returned trimmed.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

//! Core data models that flow through ingestion and chat.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A document produced by a [`DocumentSource`](crate::source::DocumentSource).
///
/// Immutable once loaded; the session discards documents after chunking and
/// study-material generation.
#[derive(Debug, Clone)]
pub struct Document {
    /// Display name (file name or Drive title).
    pub name: String,
    /// Where the document came from (`file://…` or a Drive web link).
    pub uri: Option<String>,
    /// MIME type of the original file, before text extraction.
    pub content_type: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub text: String,
}

/// A segment of the concatenated corpus text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in ingestion order, starting at 0.
    pub index: usize,
    pub text: String,
}

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Human => "you",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Notes and quiz questions generated when a corpus is ingested.
#[derive(Debug, Clone, Default)]
pub struct StudyMaterial {
    pub notes: String,
    pub questions: String,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

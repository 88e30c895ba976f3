//! # Notes Harness
//!
//! Study notes, practice questions and retrieval-augmented chat over a folder
//! of documents.
//!
//! A folder link is resolved to documents, their text is turned into
//! structured notes and 2-mark / 5-mark questions by a chat model, and the
//! same text is chunked and embedded into an in-memory index. Questions are
//! then answered from the most relevant chunks, streamed back as they are
//! generated.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │   Source    │──▶│  Extract +  │──▶│ VectorIndex │
//! │ Drive / FS  │   │ Chunk+Embed │   │  (memory)   │
//! └─────────────┘   └──────┬──────┘   └──────┬──────┘
//!                          ▼                 │
//!                   ┌─────────────┐          │
//!                   │ Notes + Qs  │          │
//!                   └─────────────┘          ▼
//!   utterance ──▶ rewrite ──▶ retrieve ──▶ answer ──▶ stream ──▶ history
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Session error taxonomy |
//! | [`models`] | Core data types |
//! | [`link`] | Folder link parsing |
//! | [`source`] | Document sources (Google Drive, filesystem) |
//! | [`extract`] | Text extraction from PDF and Office files |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index |
//! | [`llm`] | Chat model abstraction and streaming |
//! | [`rewrite`] | History-aware query rewriting |
//! | [`answer`] | Grounded answer generation |
//! | [`study`] | Notes and question generation |
//! | [`session`] | Session state machine |
//! | [`repl`] | Interactive terminal front end |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod link;
pub mod llm;
pub mod models;
pub mod repl;
pub mod rewrite;
pub mod session;
pub mod source;
pub mod study;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use session::{Session, SessionState, Turn};

//! Error taxonomy surfaced to the caller of a [`Session`](crate::session::Session).
//!
//! Provider internals (HTTP clients, extraction, config parsing) report
//! failures as [`anyhow::Error`] with context. The session maps each failure
//! onto one of these variants at the stage where it happened, so the caller
//! can tell an invalid link apart from an unreachable source, a failed
//! embedding call, or a model that never answered.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed folder link or empty utterance.
    #[error("{0}")]
    InvalidInput(String),

    /// A chat turn was submitted before any corpus was ingested.
    #[error("no documents loaded yet; submit a folder link first")]
    NotReady,

    /// The document source failed or returned nothing usable.
    #[error("document source unavailable: {0}")]
    SourceUnavailable(String),

    /// The embedding provider failed or timed out.
    #[error("embedding failed: {0}")]
    EmbeddingFailure(String),

    /// The language model failed, timed out, or returned no content.
    #[error("generation failed: {0}")]
    GenerationFailure(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_link() -> Self {
        Self::InvalidInput("invalid link".to_string())
    }

    pub fn source_unavailable(err: anyhow::Error) -> Self {
        Self::SourceUnavailable(format!("{:#}", err))
    }

    pub fn embedding_failure(err: anyhow::Error) -> Self {
        Self::EmbeddingFailure(format!("{:#}", err))
    }

    pub fn generation_failure(err: anyhow::Error) -> Self {
        Self::GenerationFailure(format!("{:#}", err))
    }

    /// Short machine-friendly label, used as a `tracing` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::NotReady => "not_ready",
            Error::SourceUnavailable(_) => "source_unavailable",
            Error::EmbeddingFailure(_) => "embedding_failure",
            Error::GenerationFailure(_) => "generation_failure",
            Error::Config(_) => "config",
        }
    }
}

/// Awaits `fut` for at most `limit`, turning an elapsed deadline into an
/// [`anyhow::Error`] naming the operation.
pub(crate) async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> anyhow::Result<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "{} timed out after {}s",
            operation,
            limit.as_secs_f64()
        )),
    }
}

//! The session conductor: owns the corpus, the conversation history and the
//! state machine that sequences ingestion and chat turns.
//!
//! ```text
//!   Empty ──submit_link──▶ Ready ──begin_turn──▶ Processing
//!                            ▲                       │
//!                            └── stream consumed, ───┘
//!                                failed or dropped
//! ```
//!
//! A [`Turn`] borrows the session mutably for as long as it lives, so a
//! second turn (or a new link) cannot start while an answer is streaming.
//! History is only touched when a turn's stream has been consumed to the
//! end: the human message and the complete assistant reply are appended
//! together. A turn that fails, times out, or is dropped early leaves the
//! history exactly as it was.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::answer;
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{with_timeout, Error, Result};
use crate::index::VectorIndex;
use crate::link::{parse_folder_link, FolderId};
use crate::llm::{create_chat_model, ChatModel, FragmentStream};
use crate::models::{Message, SearchHit, StudyMaterial};
use crate::rewrite::rewrite_query;
use crate::source::{concat_documents, create_source, DocumentSource};
use crate::study;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No corpus ingested yet.
    Empty,
    /// A corpus is indexed and the session accepts chat turns.
    Ready,
    /// A turn is in flight.
    Processing,
}

/// Summary of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub folder: FolderId,
    pub documents: usize,
    pub chars: usize,
    pub chunks: usize,
}

pub struct Session {
    id: Uuid,
    config: Config,
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn ChatModel>,
    state: SessionState,
    history: Vec<Message>,
    index: Option<VectorIndex>,
    study: StudyMaterial,
    folder: Option<FolderId>,
    turns: u64,
}

impl Session {
    pub fn new(
        config: Config,
        source: Arc<dyn DocumentSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let history = vec![Message::assistant(config.session.welcome.clone())];
        Self {
            id: Uuid::new_v4(),
            config,
            source,
            embedder,
            model,
            state: SessionState::Empty,
            history,
            index: None,
            study: StudyMaterial::default(),
            folder: None,
            turns: 0,
        }
    }

    /// Build a session with the providers named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let setup = |what: &str, e: anyhow::Error| Error::Config(format!("{}: {:#}", what, e));
        let source = create_source(&config.source).map_err(|e| setup("document source", e))?;
        let embedder =
            create_provider(&config.embedding).map_err(|e| setup("embedding provider", e))?;
        let model = create_chat_model(&config.llm).map_err(|e| setup("chat model", e))?;
        tracing::debug!(
            source = source.name(),
            embedding_model = embedder.model_name(),
            chat_model = model.model_name(),
            "providers ready"
        );
        Ok(Self::new(
            config,
            Arc::from(source),
            Arc::from(embedder),
            Arc::from(model),
        ))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The transcript, starting with the welcome message.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn study_material(&self) -> &StudyMaterial {
        &self.study
    }

    /// Folder of the active corpus, if any.
    pub fn folder(&self) -> Option<&FolderId> {
        self.folder.as_ref()
    }

    /// Number of indexed chunks in the active corpus.
    pub fn indexed_chunks(&self) -> usize {
        self.index.as_ref().map_or(0, VectorIndex::len)
    }

    /// Ingest the folder behind `link` and start a fresh conversation on it.
    ///
    /// Loads the documents, generates study material, chunks the corpus and
    /// builds the vector index. Nothing is committed unless every step
    /// succeeds: on error the session keeps its previous corpus, history and
    /// state.
    pub async fn submit_link(&mut self, link: &str) -> Result<IngestReport> {
        let folder = parse_folder_link(link)?;
        let span = tracing::info_span!("ingest", session_id = %self.id, folder = %folder);

        let result = self.ingest(&folder).instrument(span.clone()).await;
        match result {
            Ok((index, study, mut report)) => {
                report.chunks = index.len();
                self.index = Some(index);
                self.study = study;
                self.folder = Some(folder);
                self.history = vec![Message::assistant(self.config.session.welcome.clone())];
                self.state = SessionState::Ready;
                span.in_scope(|| {
                    tracing::info!(
                        documents = report.documents,
                        chars = report.chars,
                        chunks = report.chunks,
                        "corpus ready"
                    )
                });
                Ok(report)
            }
            Err(e) => {
                span.in_scope(|| tracing::warn!(kind = e.kind(), error = %e, "ingestion failed"));
                Err(e)
            }
        }
    }

    async fn ingest(
        &self,
        folder: &FolderId,
    ) -> Result<(VectorIndex, StudyMaterial, IngestReport)> {
        let docs = self
            .source
            .load(folder)
            .await
            .map_err(Error::source_unavailable)?;
        let corpus = concat_documents(&docs);
        if corpus.trim().is_empty() {
            return Err(Error::SourceUnavailable(format!(
                "folder {} contains no text",
                folder
            )));
        }
        tracing::debug!(documents = docs.len(), source = self.source.name(), "documents loaded");

        let study = if self.config.session.generate_study_material {
            self.generate_study_material(&corpus).await?
        } else {
            StudyMaterial::default()
        };

        let chunking = &self.config.chunking;
        let chunks = chunk_text(&corpus, chunking.max_chars, chunking.overlap_chars);
        let index = VectorIndex::build(
            self.embedder.as_ref(),
            chunks,
            self.config.embedding.batch_size,
        )
        .await
        .map_err(Error::embedding_failure)?;

        let report = IngestReport {
            folder: folder.clone(),
            documents: docs.len(),
            chars: corpus.chars().count(),
            chunks: 0,
        };
        Ok((index, study, report))
    }

    async fn generate_study_material(&self, corpus: &str) -> Result<StudyMaterial> {
        let limit = self.config.llm.timeout();
        let notes = with_timeout(
            "notes generation",
            limit,
            study::generate_notes(self.model.as_ref(), corpus),
        )
        .await
        .map_err(Error::generation_failure)?;
        let questions = with_timeout(
            "question generation",
            limit,
            study::generate_questions(self.model.as_ref(), &notes),
        )
        .await
        .map_err(Error::generation_failure)?;
        Ok(StudyMaterial { notes, questions })
    }

    /// Start a chat turn: rewrite the utterance into a search query, retrieve
    /// context and open the answer stream.
    ///
    /// The returned [`Turn`] yields the answer fragment by fragment.
    pub async fn begin_turn(&mut self, utterance: &str) -> Result<Turn<'_>> {
        if self.state == SessionState::Empty {
            return Err(Error::NotReady);
        }
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(Error::InvalidInput("message is empty".to_string()));
        }

        self.turns += 1;
        self.state = SessionState::Processing;
        let span = tracing::info_span!("turn", session_id = %self.id, turn = self.turns);
        let idle_timeout = self.config.llm.stream_idle_timeout();

        let mut turn = Turn {
            session: self,
            utterance: utterance.to_string(),
            query: String::new(),
            context: Vec::new(),
            answer: String::new(),
            fragments: None,
            idle_timeout,
            span: span.clone(),
            phase: Phase::Streaming,
        };
        // an early return drops `turn`, which puts the session back to Ready
        turn.open().instrument(span).await?;
        Ok(turn)
    }

    /// Run a whole turn and return the complete answer.
    pub async fn ask(&mut self, utterance: &str) -> Result<String> {
        self.begin_turn(utterance).await?.collect().await
    }

    /// Forget the conversation but keep the corpus. No-op while empty.
    pub fn reset(&mut self) {
        if self.state == SessionState::Ready {
            self.history = vec![Message::assistant(self.config.session.welcome.clone())];
            tracing::info!(session_id = %self.id, "conversation reset");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Committed,
    Failed,
}

/// One in-flight question and its streamed answer.
pub struct Turn<'a> {
    session: &'a mut Session,
    utterance: String,
    query: String,
    context: Vec<SearchHit>,
    answer: String,
    fragments: Option<FragmentStream>,
    idle_timeout: Duration,
    span: tracing::Span,
    phase: Phase,
}

impl Turn<'_> {
    async fn open(&mut self) -> Result<()> {
        let session = &*self.session;
        let llm_timeout = session.config.llm.timeout();

        let query = with_timeout(
            "query rewriting",
            llm_timeout,
            rewrite_query(session.model.as_ref(), &session.history, &self.utterance),
        )
        .await
        .map_err(Error::generation_failure)?;

        let index = session.index.as_ref().ok_or(Error::NotReady)?;
        let context = with_timeout(
            "retrieval",
            session.config.embedding.retry_budget(),
            index.query(
                session.embedder.as_ref(),
                &query,
                session.config.retrieval.top_k,
            ),
        )
        .await
        .map_err(Error::embedding_failure)?;
        tracing::debug!(query = %query, hits = context.len(), "retrieved context");

        let fragments = with_timeout(
            "answer generation",
            llm_timeout,
            answer::stream(
                session.model.as_ref(),
                &context,
                &session.history,
                &self.utterance,
            ),
        )
        .await
        .map_err(Error::generation_failure)?;

        self.query = query;
        self.context = context;
        self.fragments = Some(fragments);
        Ok(())
    }

    /// The standalone search query the utterance was rewritten into.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Retrieved chunks the answer is grounded on, best first.
    pub fn context(&self) -> &[SearchHit] {
        &self.context
    }

    /// Answer text received so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Next answer fragment, or `None` once the answer is complete.
    ///
    /// Reaching the end appends the human message and the full answer to the
    /// history and returns the session to `Ready`. A provider error, an
    /// empty answer or a gap longer than the idle timeout fails the turn
    /// without touching the history.
    pub async fn next_fragment(&mut self) -> Result<Option<String>> {
        match self.phase {
            Phase::Committed => return Ok(None),
            Phase::Failed => {
                return Err(Error::GenerationFailure("turn has already failed".to_string()))
            }
            Phase::Streaming => {}
        }

        loop {
            let Some(stream) = self.fragments.as_mut() else {
                return Err(self.fail(anyhow::anyhow!("answer stream was not opened")));
            };
            let next = tokio::time::timeout(self.idle_timeout, stream.next()).await;
            match next {
                Err(_) => {
                    let secs = self.idle_timeout.as_secs_f64();
                    return Err(self.fail(anyhow::anyhow!(
                        "answer stream stalled for more than {}s",
                        secs
                    )));
                }
                Ok(Some(Ok(fragment))) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    self.answer.push_str(&fragment);
                    return Ok(Some(fragment));
                }
                Ok(Some(Err(e))) => return Err(self.fail(e)),
                Ok(None) => return self.commit().map(|()| None),
            }
        }
    }

    /// Drain the stream and return the complete answer.
    pub async fn collect(mut self) -> Result<String> {
        while self.next_fragment().await?.is_some() {}
        Ok(std::mem::take(&mut self.answer))
    }

    /// Abandon the turn. Equivalent to dropping it.
    pub fn cancel(self) {}

    fn commit(&mut self) -> Result<()> {
        if self.answer.trim().is_empty() {
            return Err(self.fail(anyhow::anyhow!("model returned an empty answer")));
        }
        self.fragments = None;
        self.session
            .history
            .push(Message::human(self.utterance.clone()));
        self.session
            .history
            .push(Message::assistant(self.answer.clone()));
        self.session.state = SessionState::Ready;
        self.phase = Phase::Committed;
        tracing::info!(
            parent: &self.span,
            answer_chars = self.answer.chars().count(),
            history = self.session.history.len(),
            "turn completed"
        );
        Ok(())
    }

    fn fail(&mut self, err: anyhow::Error) -> Error {
        self.fragments = None;
        self.session.state = SessionState::Ready;
        self.phase = Phase::Failed;
        let err = Error::generation_failure(err);
        tracing::warn!(parent: &self.span, error = %err, "turn failed");
        err
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        if self.phase == Phase::Streaming {
            tracing::debug!(parent: &self.span, "turn dropped before completion");
        }
        self.session.state = SessionState::Ready;
    }
}

//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use notes_harness::config::Config;
use notes_harness::embedding::EmbeddingProvider;
use notes_harness::link::FolderId;
use notes_harness::llm::stream::FragmentStream;
use notes_harness::llm::{ChatModel, Prompt};
use notes_harness::models::Document;
use notes_harness::source::DocumentSource;
use notes_harness::Session;

pub mod http;

pub const LINK: &str = "https://drive.google.com/drive/folders/1AbC_study-notes";

// ─── Chat model ─────────────────────────────────────────────────────

/// One scripted model reply.
pub enum Reply {
    /// Fragments delivered in order; `complete` joins them.
    Text(Vec<&'static str>),
    /// Fragments, then a stream that never yields again.
    Stall(Vec<&'static str>),
    /// Fragments, then a provider error.
    FailAfter(Vec<&'static str>, &'static str),
    /// The request itself fails.
    Error(&'static str),
}

pub fn text(s: &'static str) -> Reply {
    Reply::Text(vec![s])
}

/// Chat model that plays back [`Reply`]s in order and records prompts.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Reply>>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn next(&self, prompt: &Prompt) -> Result<Reply> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Error(msg)) => bail!("{}", msg),
            Some(reply) => Ok(reply),
            None => bail!("scripted chat ran out of replies"),
        }
    }
}

fn owned(parts: Vec<&'static str>) -> Vec<Result<String>> {
    parts.into_iter().map(|p| Ok(p.to_string())).collect()
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted-chat"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        match self.next(prompt)? {
            Reply::Text(parts) => Ok(parts.concat()),
            Reply::Stall(_) | Reply::FailAfter(..) | Reply::Error(_) => {
                bail!("reply kind only supported when streaming")
            }
        }
    }

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        Ok(match self.next(prompt)? {
            Reply::Text(parts) => stream::iter(owned(parts)).boxed(),
            Reply::Stall(parts) => stream::iter(owned(parts)).chain(stream::pending()).boxed(),
            Reply::FailAfter(parts, msg) => {
                let mut items = owned(parts);
                items.push(Err(anyhow::anyhow!("{}", msg)));
                stream::iter(items).boxed()
            }
            Reply::Error(msg) => bail!("{}", msg),
        })
    }
}

// ─── Embeddings ─────────────────────────────────────────────────────

pub const BOW_DIMS: usize = 256;

/// Bag-of-words embedder: lowercase alphanumeric words hashed into buckets.
#[derive(Default)]
pub struct BagOfWords {
    pub calls: AtomicUsize,
}

impl BagOfWords {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; BOW_DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let word = word.to_lowercase();
            if STOP_WORDS.contains(&word.as_str()) {
                continue;
            }
            let mut h: u32 = 2166136261;
            for b in word.bytes() {
                h ^= b as u32;
                h = h.wrapping_mul(16777619);
            }
            v[(h as usize) % BOW_DIMS] += 1.0;
        }
        v
    }
}

const STOP_WORDS: &[&str] = &["the", "what", "and", "are", "for", "with", "from"];

#[async_trait]
impl EmbeddingProvider for BagOfWords {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        BOW_DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        4
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service returned 503")
    }
}

// ─── Documents ──────────────────────────────────────────────────────

/// In-memory folder contents, keyed by nothing: every folder id gets them.
pub struct MemorySource {
    docs: Mutex<Vec<(String, String)>>,
    pub loads: AtomicUsize,
}

impl MemorySource {
    pub fn new(docs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            docs: Mutex::new(
                docs.iter()
                    .map(|(n, t)| (n.to_string(), t.to_string()))
                    .collect(),
            ),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn replace(&self, docs: &[(&str, &str)]) {
        *self.docs.lock().unwrap() = docs
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect();
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, _folder: &FolderId) -> Result<Vec<Document>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let docs = self.docs.lock().unwrap();
        if docs.is_empty() {
            bail!("folder is empty");
        }
        Ok(docs
            .iter()
            .map(|(name, text)| Document {
                name: name.clone(),
                uri: None,
                content_type: "text/plain".to_string(),
                updated_at: None,
                text: text.clone(),
            })
            .collect())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

pub const GEOGRAPHY: &[(&str, &str)] = &[
    (
        "europe.txt",
        "Rivers shape the landscape of central Europe.\n\
         The capital of France is Paris.\n\
         Germany borders nine countries.\n",
    ),
    (
        "climate.txt",
        "Monsoon rains arrive in India each summer.\n\
         Glaciers store most of the planet's fresh water.\n",
    ),
];

/// Small chunks so each sentence lands in its own neighbourhood.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.chunking.max_chars = 60;
    config.chunking.overlap_chars = 10;
    config.retrieval.top_k = 2;
    config.llm.stream_idle_timeout_secs = 1;
    config.llm.timeout_secs = 5;
    config.embedding.timeout_secs = 5;
    config
}

pub fn session_with(
    config: Config,
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatModel>,
) -> Session {
    Session::new(config, source, embedder, chat)
}

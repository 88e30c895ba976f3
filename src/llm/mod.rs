//! Chat model abstraction and its HTTP providers.
//!
//! | Provider | Endpoint | Streaming |
//! |----------|----------|-----------|
//! | `cohere` | `/v2/chat` | SSE `content-delta` events |
//! | `openai` | `/v1/chat/completions` | SSE `data:` lines ending in `[DONE]` |
//! | `ollama` | `/api/chat` | newline-delimited JSON |
//!
//! Every provider takes the same [`Prompt`]: a system text plus the ordered
//! conversation. Requests are not retried; a failure is reported to the
//! session, which surfaces it as a generation failure.

pub mod stream;

mod cohere;
mod ollama;
mod openai;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::LlmConfig;
use crate::models::{Message, Role};

pub use stream::FragmentStream;

/// System instructions plus the conversation to send to a chat model.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<Message>,
}

impl Prompt {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
        }
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn user(self, text: impl Into<String>) -> Self {
        self.message(Message::human(text))
    }

    /// Role-tagged messages in the OpenAI-style shape shared by all three
    /// providers. The system text goes first when non-empty.
    pub(crate) fn chat_messages(&self) -> Vec<ChatMessage<'_>> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !self.system.is_empty() {
            out.push(ChatMessage {
                role: "system",
                content: &self.system,
            });
        }
        out.extend(self.messages.iter().map(|m| ChatMessage {
            role: match m.role {
                Role::Human => "user",
                Role::Assistant => "assistant",
            },
            content: &m.text,
        }));
        out
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// A language model that can answer a [`Prompt`] in full or as a stream.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Run the prompt to completion and return the whole reply.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Open a streamed reply. Resolves once the response headers arrive;
    /// fragments are read lazily from the returned stream.
    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream>;
}

/// Instantiate the chat model named by `llm.provider`.
pub fn create_chat_model(config: &LlmConfig) -> Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "cohere" => Ok(Box::new(cohere::CohereChat::new(config)?)),
        "openai" => Ok(Box::new(openai::OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(ollama::OllamaChat::new(config)?)),
        other => bail!("Unknown LLM provider: '{}'", other),
    }
}

/// Client without a total timeout: streamed replies may legitimately run
/// longer than `timeout_secs`, so completions set one per request instead.
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("building HTTP client")
}

fn api_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))
}

fn endpoint(config: &LlmConfig, default_base: &str, path: &str) -> String {
    let base = config.url.as_deref().unwrap_or(default_base);
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Send the request and fail on a non-success status, keeping the body.
async fn send_checked(req: reqwest::RequestBuilder, label: &str) -> Result<reqwest::Response> {
    let response = req
        .send()
        .await
        .with_context(|| format!("{} request failed", label))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{} API error {}: {}", label, status, body.trim())
}

/// Canned chat model for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies with queued strings in order and records every prompt.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<String>>,
        pub prompts: Mutex<Vec<Prompt>>,
    }

    impl ScriptedModel {
        pub fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn next(&self, prompt: &Prompt) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            self.next(prompt)
        }

        async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
            let reply = self.next(prompt)?;
            Ok(stream::from_fragments(
                reply.split_inclusive(' ').map(str::to_string).collect::<Vec<_>>(),
            ))
        }
    }
}

//! Ollama `/api/chat`. Streams newline-delimited JSON objects.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::stream::{decode_lines, LineEvent};
use super::{endpoint, http_client, send_checked, ChatMessage, ChatModel, FragmentStream, Prompt};
use crate::config::LlmConfig;

const DEFAULT_BASE: &str = "http://localhost:11434";

pub struct OllamaChat {
    model: String,
    url: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: std::time::Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama provider"))?;
        Ok(Self {
            model,
            url: endpoint(config, DEFAULT_BASE, "/api/chat"),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
            client: http_client()?,
        })
    }

    fn request<'a>(&'a self, prompt: &'a Prompt, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: prompt.chat_messages(),
            stream,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let req = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&self.request(prompt, false));
        let json: serde_json::Value = send_checked(req, "Ollama")
            .await?
            .json()
            .await
            .context("decoding Ollama response")?;
        if let Some(err) = json["error"].as_str() {
            bail!("Ollama error: {}", err);
        }
        json["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Ollama response has no message.content"))
    }

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        let req = self.client.post(&self.url).json(&self.request(prompt, true));
        let response = send_checked(req, "Ollama").await?;
        Ok(decode_lines(response.bytes_stream(), parse_stream_line))
    }
}

/// A line carries a content fragment and may also be the final one.
fn parse_stream_line(line: &str) -> Result<LineEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineEvent::Skip);
    }
    let obj: serde_json::Value =
        serde_json::from_str(line).with_context(|| format!("invalid Ollama line: {}", line))?;
    if let Some(err) = obj["error"].as_str() {
        bail!("Ollama stream error: {}", err);
    }
    if obj["done"].as_bool().unwrap_or(false) {
        // the closing object carries stats, not text
        return Ok(LineEvent::Done);
    }
    Ok(LineEvent::Fragment(
        obj["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    ))
}

//! OpenAI Chat Completions, or any gateway that speaks the same protocol
//! (set `llm.url`).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::stream::{decode_lines, sse_data, LineEvent};
use super::{api_key, endpoint, http_client, send_checked, ChatMessage, ChatModel, FragmentStream, Prompt};
use crate::config::LlmConfig;

const DEFAULT_BASE: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIChat {
    model: String,
    url: String,
    api_key: String,
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
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            url: endpoint(config, DEFAULT_BASE, "/v1/chat/completions"),
            api_key: api_key("OPENAI_API_KEY")?,
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
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let req = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&self.request(prompt, false));
        let json: serde_json::Value = send_checked(req, "OpenAI")
            .await?
            .json()
            .await
            .context("decoding OpenAI response")?;
        parse_completion(&json)
    }

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        let req = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt, true));
        let response = send_checked(req, "OpenAI").await?;
        Ok(decode_lines(response.bytes_stream(), parse_stream_line))
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    if let Some(err) = json.get("error") {
        bail!("OpenAI error: {}", err);
    }
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("OpenAI response has no choices[0].message.content"))
}

fn parse_stream_line(line: &str) -> Result<LineEvent> {
    let data = match sse_data(line) {
        None | Some("") => return Ok(LineEvent::Skip),
        Some("[DONE]") => return Ok(LineEvent::Done),
        Some(data) => data,
    };
    let chunk: serde_json::Value =
        serde_json::from_str(data).with_context(|| format!("invalid OpenAI chunk: {}", data))?;
    if let Some(err) = chunk.get("error") {
        bail!("OpenAI stream error: {}", err);
    }
    Ok(LineEvent::Fragment(
        chunk["choices"][0]["delta"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    ))
}

//! Cohere Chat API v2.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::stream::{decode_lines, sse_data, LineEvent};
use super::{api_key, endpoint, http_client, send_checked, ChatMessage, ChatModel, FragmentStream, Prompt};
use crate::config::LlmConfig;

const DEFAULT_BASE: &str = "https://api.cohere.com";
const DEFAULT_MODEL: &str = "command-r";

/// Requires the `CO_API_KEY` environment variable.
pub struct CohereChat {
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

impl CohereChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            url: endpoint(config, DEFAULT_BASE, "/v2/chat"),
            api_key: api_key("CO_API_KEY")?,
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
impl ChatModel for CohereChat {
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
        let json: serde_json::Value = send_checked(req, "Cohere")
            .await?
            .json()
            .await
            .context("decoding Cohere response")?;
        parse_completion(&json)
    }

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        let req = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt, true));
        let response = send_checked(req, "Cohere").await?;
        Ok(decode_lines(response.bytes_stream(), parse_stream_line))
    }
}

/// Concatenate the text parts of `message.content`.
fn parse_completion(json: &serde_json::Value) -> Result<String> {
    let parts = json["message"]["content"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Cohere response has no message content"))?;
    Ok(parts
        .iter()
        .filter(|p| p["type"].as_str().unwrap_or("text") == "text")
        .filter_map(|p| p["text"].as_str())
        .collect())
}

/// `event:` lines are ignored; the event type is repeated inside the data.
fn parse_stream_line(line: &str) -> Result<LineEvent> {
    let Some(data) = sse_data(line) else {
        return Ok(LineEvent::Skip);
    };
    if data.is_empty() {
        return Ok(LineEvent::Skip);
    }
    let event: serde_json::Value =
        serde_json::from_str(data).with_context(|| format!("invalid Cohere event: {}", data))?;
    match event["type"].as_str() {
        Some("content-delta") => Ok(LineEvent::Fragment(
            event["delta"]["message"]["content"]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        )),
        Some("message-end") => Ok(LineEvent::Done),
        Some("error") => bail!("Cohere stream error: {}", event),
        _ => Ok(LineEvent::Skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};

    #[test]
    fn completion_joins_text_parts() {
        let json = serde_json::json!({
            "id": "x",
            "message": {
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "Paris is "},
                    {"type": "text", "text": "the capital."}
                ]
            }
        });
        assert_eq!(parse_completion(&json).unwrap(), "Paris is the capital.");
    }

    #[test]
    fn completion_without_content_is_error() {
        let json = serde_json::json!({"message": "nope"});
        assert!(parse_completion(&json).is_err());
    }

    #[test]
    fn stream_events_are_classified() {
        assert_eq!(parse_stream_line("event: content-delta").unwrap(), LineEvent::Skip);
        assert_eq!(parse_stream_line("").unwrap(), LineEvent::Skip);
        assert_eq!(
            parse_stream_line(r#"data: {"type":"message-start","id":"1"}"#).unwrap(),
            LineEvent::Skip
        );
        assert_eq!(
            parse_stream_line(
                r#"data: {"type":"content-delta","index":0,"delta":{"message":{"content":{"text":" the capital."}}}}"#
            )
            .unwrap(),
            LineEvent::Fragment(" the capital.".to_string())
        );
        assert_eq!(
            parse_stream_line(r#"data: {"type":"message-end","delta":{"finish_reason":"COMPLETE"}}"#)
                .unwrap(),
            LineEvent::Done
        );
    }

    #[test]
    fn malformed_event_is_error() {
        assert!(parse_stream_line("data: {not json").is_err());
    }

    #[tokio::test]
    async fn stream_cut_before_message_end_fails() {
        let body = concat!(
            "event: message-start\n",
            "data: {\"type\":\"message-start\",\"id\":\"1\"}\n\n",
            "event: content-delta\n",
            "data: {\"type\":\"content-delta\",\"index\":0,\"delta\":{\"message\":{\"content\":{\"text\":\"Paris\"}}}}\n\n",
        );
        let parts = vec![Ok::<_, std::io::Error>(body.as_bytes().to_vec())];
        let items: Vec<Result<String>> = decode_lines(stream::iter(parts), parse_stream_line)
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Paris");
        assert!(items[1]
            .as_ref()
            .unwrap_err()
            .to_string()
            .contains("ended before completion"));
    }
}

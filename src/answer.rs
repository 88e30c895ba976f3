//! Grounded answer generation.
//!
//! Retrieved chunks are numbered and placed in the system prompt, most
//! relevant first. The conversation history follows as chat messages, then
//! the new utterance.

use anyhow::Result;

use crate::llm::{ChatModel, FragmentStream, Prompt};
use crate::models::{Message, SearchHit};

const ANSWER_INSTRUCTION: &str = "You are a study assistant helping a student \
revise their course material. Answer the student's latest message using only \
the context below. If the context is empty or does not contain the answer, say \
that the notes do not cover it and answer from the conversation alone. Be \
concise.";

/// Assemble the answer prompt from context, history and the utterance.
pub fn answer_prompt(context: &[SearchHit], history: &[Message], utterance: &str) -> Prompt {
    let mut system = String::from(ANSWER_INSTRUCTION);
    system.push_str("\n\nContext:\n");
    if context.is_empty() {
        system.push_str("(no matching passages)\n");
    }
    for (i, hit) in context.iter().enumerate() {
        system.push_str(&format!("[{}] {}\n\n", i + 1, hit.chunk.text.trim()));
    }

    Prompt {
        system: system.trim_end().to_string(),
        messages: history.to_vec(),
    }
    .user(utterance)
}

/// Streamed answer; the fragments concatenate to the full reply.
pub async fn stream(
    model: &dyn ChatModel,
    context: &[SearchHit],
    history: &[Message],
    utterance: &str,
) -> Result<FragmentStream> {
    model
        .stream(&answer_prompt(context, history, utterance))
        .await
}

//! History-aware query rewriting.
//!
//! A follow-up like "and what about its capital?" is useless as a vector
//! search query on its own. Before retrieval, the conversation so far and the
//! new utterance are sent to the chat model, which condenses them into one
//! standalone search query.

use anyhow::Result;

use crate::llm::{ChatModel, Prompt};
use crate::models::Message;

pub const REWRITE_INSTRUCTION: &str = "Given the conversation so far and the \
latest user message, write a search query to look up information relevant to \
the latest message. Include only the relevant keywords and names. Reply with \
the query alone, without quotes or commentary.";

/// Build the rewriting prompt: history, then the new utterance.
pub fn rewrite_prompt(history: &[Message], utterance: &str) -> Prompt {
    Prompt {
        system: REWRITE_INSTRUCTION.to_string(),
        messages: history.to_vec(),
    }
    .user(utterance)
}

/// Ask `model` for a standalone search query.
///
/// Falls back to `utterance` when the model replies with nothing usable.
pub async fn rewrite_query(
    model: &dyn ChatModel,
    history: &[Message],
    utterance: &str,
) -> Result<String> {
    let reply = model.complete(&rewrite_prompt(history, utterance)).await?;
    let query = clean_query(&reply);
    if query.is_empty() {
        tracing::warn!("query rewriter returned an empty reply; searching with the utterance");
        return Ok(utterance.to_string());
    }
    tracing::debug!(query = %query, "rewrote query");
    Ok(query.to_string())
}

/// Trim the reply and strip one pair of surrounding quotes.
fn clean_query(reply: &str) -> &str {
    let trimmed = reply.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('`', '`')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    trimmed
}

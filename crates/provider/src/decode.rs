//! Wire payload decoding.
//!
//! Accepts both the streaming-delta schema (`choices[0].delta`) and the
//! complete-message schema (`choices[0].message`), plus the usage-only frame
//! sent last when `include_usage` is requested.

use crate::sse;
use qcore::{Error, FinishReason, ResponseChunk, Result};
use serde::Deserialize;

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Message>,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

/// Decode a single JSON payload into a chunk.
pub fn decode_event(data: &str) -> Result<ResponseChunk> {
    let completion: Completion =
        serde_json::from_str(data).map_err(|e| Error::decode(e, data))?;
    let has_usage = completion.usage.is_some();
    let (prompt_tokens, completion_tokens) = completion
        .usage
        .map(|u| {
            (
                u.prompt_tokens.unwrap_or_default(),
                u.completion_tokens.unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    let Some(choice) = completion.choices.into_iter().next() else {
        if has_usage {
            return Ok(ResponseChunk::default().with_usage(prompt_tokens, completion_tokens));
        }
        return Err(Error::decode("no choices and no usage", data));
    };

    let message = choice.delta.or(choice.message);
    if message.is_none() && choice.finish_reason.is_none() {
        return Err(Error::decode("no delta or message", data));
    }

    let (content, reasoning_content) = message
        .map(|m| (m.content.unwrap_or_default(), m.reasoning_content))
        .unwrap_or_default();

    Ok(ResponseChunk {
        content,
        reasoning_content,
        prompt_tokens,
        completion_tokens,
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::from),
    })
}

/// Decode a raw body into chunks.
///
/// The body is either one JSON document or SSE text. Any payload that fails
/// to decode fails the whole body.
pub fn decode(raw: &str) -> Result<Vec<ResponseChunk>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    if raw.lines().any(|line| line.starts_with("data:")) {
        return raw.lines().filter_map(sse::data).map(decode_event).collect();
    }

    decode_event(raw).map(|chunk| vec![chunk])
}

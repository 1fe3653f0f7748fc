//! Normalized response chunks

use serde::{Deserialize, Serialize};

/// One unit of provider output, normalized across wire schemas.
///
/// Produced by the decoder per wire event. Chunk order is wire-arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseChunk {
    /// The textual content of this chunk, possibly empty.
    pub content: String,

    /// The reasoning content, for reasoning models.
    pub reasoning_content: Option<String>,

    /// Prompt tokens reported with this chunk, zero when absent.
    pub prompt_tokens: u32,

    /// Completion tokens reported with this chunk, zero when absent.
    pub completion_tokens: u32,

    /// The provider-reported finish reason.
    pub finish_reason: Option<FinishReason>,
}

impl ResponseChunk {
    /// Create a content-only chunk.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Set the finish reason of this chunk.
    pub fn with_finish(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    /// Set the token usage of this chunk.
    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }

    /// Whether the provider reported a natural stop.
    pub fn is_stop(&self) -> bool {
        matches!(self.finish_reason, Some(FinishReason::Stop))
    }
}

/// The reason the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished naturally
    Stop,

    /// Any other provider-specific reason (`length`, `content_filter`, ...)
    Other(String),
}

impl From<&str> for FinishReason {
    fn from(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Token usage accumulated over one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,

    /// Number of tokens in the completion
    pub completion_tokens: u32,
}

impl Usage {
    /// Add the usage reported by a chunk.
    pub fn accept(&mut self, chunk: &ResponseChunk) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(chunk.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(chunk.completion_tokens);
    }

    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

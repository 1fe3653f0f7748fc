//! Model descriptors

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// An OpenAI-compatible chat completions endpoint plus the model to ask.
///
/// Immutable once built. The registry hands out `Arc<Model>` so concurrent
/// requests share one instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Model {
    /// The model identifier sent in the request body.
    pub name: CompactString,

    /// Base URL of the API, e.g. `https://api.deepseek.com/v1`.
    pub base_url: String,

    /// Bearer credential.
    #[serde(default)]
    pub api_key: String,

    /// Whether to send `thinking: {"type": "disabled"}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_disabled: Option<bool>,

    /// Whether streaming requests ask for a trailing usage frame.
    #[serde(default)]
    pub include_usage: bool,
}

impl Model {
    /// Create a new model descriptor.
    pub fn new(
        name: impl Into<CompactString>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            thinking_disabled: None,
            include_usage: false,
        }
    }

    /// Disable provider-side thinking for this model.
    pub fn without_thinking(mut self) -> Self {
        self.thinking_disabled = Some(true);
        self
    }

    /// Ask for token usage on streaming requests.
    pub fn with_usage(mut self) -> Self {
        self.include_usage = true;
        self
    }

    /// Whether requests must carry the disabled-thinking flag.
    pub fn disables_thinking(&self) -> bool {
        self.thinking_disabled.unwrap_or(false)
    }

    /// The chat completions endpoint for this model.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

//! OpenAI-compatible request body.
//!
//! Optional fields use `skip_serializing_if` so provider-specific extras
//! (like DeepSeek's `thinking`) are simply absent when unused.

use qcore::Request as Outbound;
use serde::Serialize;
use serde_json::{Value, json};

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// The role of the author.
    pub role: &'static str,
    /// The message text.
    pub content: String,
}

/// Chat completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: String,
    /// The messages to send.
    pub messages: Vec<Message>,
    /// Whether to stream the response.
    pub stream: bool,
    /// Stream options (e.g. include_usage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<Value>,
    /// Disabled-thinking flag (DeepSeek-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
}

impl Request {
    /// Build the body for a resolved prompt.
    pub fn new(req: &Outbound) -> Self {
        let model = &req.model;
        Self {
            model: model.name.to_string(),
            messages: vec![Message {
                role: "user",
                content: req.prompt.clone(),
            }],
            stream: req.stream,
            stream_options: (req.stream && model.include_usage)
                .then(|| json!({ "include_usage": true })),
            thinking: model
                .disables_thinking()
                .then(|| json!({ "type": "disabled" })),
        }
    }
}

impl From<&Outbound> for Request {
    fn from(req: &Outbound) -> Self {
        Self::new(req)
    }
}

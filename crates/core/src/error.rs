//! Error taxonomy shared by every quill crate.

use compact_str::CompactString;

/// Result alias used across quill.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving, sending or decoding a completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No template provider supplied a template for the task key.
    #[error("prompt template not found for key: {0}")]
    PromptTemplateNotFound(CompactString),

    /// A template provider failed while looking up a template.
    #[error("prompt template provider failed for key {key}: {reason}")]
    PromptTemplate {
        /// The task key being resolved.
        key: CompactString,
        /// The provider's failure message.
        reason: String,
    },

    /// The task input cannot fill the template, e.g. a `{{placeholder}}`
    /// was left unresolved after substitution.
    #[error("invalid prompt parameters: {0}")]
    InvalidPromptParameters(String),

    /// No model could be resolved for the task key.
    #[error("model not found for key: {0}")]
    ModelNotFound(CompactString),

    /// The model registry was constructed without any model.
    #[error("model registry requires at least one model")]
    EmptyRegistry,

    /// The endpoint answered with a non-2xx status.
    #[error("http error {status}: {body}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// Network failure or timeout below the HTTP layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wire payload matched none of the known response schemas.
    #[error("failed to decode response ({reason}): {payload}")]
    Decode {
        /// Why decoding failed.
        reason: String,
        /// The raw payload that failed to decode.
        payload: String,
    },

    /// A single-shot request produced no data at all.
    #[error("generate returned nothing")]
    GenerateNothingReturned,

    /// The caller cancelled the request.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the host may retry the request against another model.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport(_))
    }

    /// Build a decode error from a serde failure and the offending payload.
    pub fn decode(reason: impl ToString, payload: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.to_string(),
            payload: payload.into(),
        }
    }
}

//! OpenAI-compatible wire client for quill.

pub use {
    decode::{decode, decode_event},
    http::HttpProvider,
    request::{Message, Request},
    reqwest::Client,
    sse::LineBuffer,
};

mod decode;
mod http;
mod request;
pub mod sse;

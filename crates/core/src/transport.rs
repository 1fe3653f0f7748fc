//! The seam between the engine and the network.

use crate::{Model, ResponseChunk, Result};
use futures_core::Stream;
use std::{pin::Pin, sync::Arc, time::Duration};

/// A lazy, ordered sequence of decoded chunks.
///
/// Dropping the stream releases the underlying connection.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ResponseChunk>> + Send>>;

/// One outbound completion request.
#[derive(Debug, Clone)]
pub struct Request {
    /// The resolved prompt, sent as a single user message.
    pub prompt: String,
    /// The target model.
    pub model: Arc<Model>,
    /// Whether to ask for an SSE stream.
    pub stream: bool,
    /// Whole-request timeout.
    pub timeout: Duration,
}

/// Issues completion requests.
///
/// Implementations surface non-2xx answers as [`crate::Error::Http`] and
/// network failures or timeouts as [`crate::Error::Transport`], yielded from
/// the returned stream.
pub trait Transport: Send + Sync {
    /// Send the request and return its chunks.
    fn send(&self, request: Request) -> ChunkStream;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request) -> ChunkStream {
        (**self).send(request)
    }
}

//! Test doubles for the transport and event seams.

use crate::{
    ChunkStream, EventHandler, ResponseChunk, Result, StopReason, Transport, transport::Request,
};
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use std::{collections::VecDeque, time::Duration};

/// A transport that replays scripted chunks.
///
/// Each `send` consumes the next script; the last script is replayed once
/// the queue runs dry.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<VecDeque<Vec<Result<ResponseChunk>>>>,
    last: Mutex<Vec<Result<ResponseChunk>>>,
    delay: Option<Duration>,
    hang: bool,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Replay `script` on every request.
    pub fn new(script: Vec<Result<ResponseChunk>>) -> Self {
        Self::sequence([script])
    }

    /// Replay one script per request, in order.
    pub fn sequence(scripts: impl IntoIterator<Item = Vec<Result<ResponseChunk>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Replay content-only chunks.
    pub fn texts<'a>(contents: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            contents
                .into_iter()
                .map(|c| Ok(ResponseChunk::text(c)))
                .collect(),
        )
    }

    /// Sleep before yielding each chunk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Never end the stream after the script is exhausted.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    fn next_script(&self) -> Vec<Result<ResponseChunk>> {
        let mut last = self.last.lock();
        if let Some(script) = self.scripts.lock().pop_front() {
            *last = script;
        }
        last.clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> ChunkStream {
        self.requests.lock().push(request);
        let delay = self.delay;
        let chunks = stream::iter(self.next_script()).then(move |chunk| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            chunk
        });

        if self.hang {
            Box::pin(chunks.chain(stream::pending()))
        } else {
            Box::pin(chunks)
        }
    }
}

/// An event captured by [`RecordingEvents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `on_params`
    Params(String),
    /// `on_chunk`
    Chunk(ResponseChunk),
    /// `on_stop`
    Stop(StopReason),
}

/// An event handler that records everything it sees.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<(String, Event)>>,
}

impl RecordingEvents {
    /// Every event, with its task key, in arrival order.
    pub fn events(&self) -> Vec<(String, Event)> {
        self.events.lock().clone()
    }

    /// Stop reasons, in arrival order.
    pub fn stops(&self) -> Vec<StopReason> {
        self.collect(|e| match e {
            Event::Stop(reason) => Some(reason.clone()),
            _ => None,
        })
    }

    /// Chunks, in arrival order.
    pub fn chunks(&self) -> Vec<ResponseChunk> {
        self.collect(|e| match e {
            Event::Chunk(chunk) => Some(chunk.clone()),
            _ => None,
        })
    }

    /// Params payloads, in arrival order.
    pub fn params(&self) -> Vec<String> {
        self.collect(|e| match e {
            Event::Params(params) => Some(params.clone()),
            _ => None,
        })
    }

    fn collect<T>(&self, f: impl Fn(&Event) -> Option<T>) -> Vec<T> {
        self.events.lock().iter().filter_map(|(_, e)| f(e)).collect()
    }

    fn record(&self, key: &str, event: Event) {
        self.events.lock().push((key.to_owned(), event));
    }
}

impl EventHandler for RecordingEvents {
    fn on_params(&self, key: &str, params: &str) {
        self.record(key, Event::Params(params.to_owned()));
    }

    fn on_chunk(&self, key: &str, chunk: &ResponseChunk) {
        self.record(key, Event::Chunk(chunk.clone()));
    }

    fn on_stop(&self, key: &str, reason: &StopReason) {
        self.record(key, Event::Stop(reason.clone()));
    }
}

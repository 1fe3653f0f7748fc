//! Per-task completion events.
//!
//! The engine reports every decoded chunk and every terminal condition to an
//! [`EventHandler`], independent of what reaches the caller. Handlers are
//! called from the task driving the request and must not block.

use crate::ResponseChunk;
use serde::{Deserialize, Serialize};

/// Why a completion stopped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The provider reported `finish_reason: "stop"`.
    LlmFinishReasonStop,
    /// The wire sequence ended.
    StreamFinished,
    /// The caller tore down the request.
    Cancelled,
    /// The request failed.
    Error(String),
}

/// Observer of completion events.
pub trait EventHandler: Send + Sync {
    /// The normalized task input, as JSON, before the request is sent.
    fn on_params(&self, _key: &str, _params: &str) {}

    /// A chunk arrived from the wire.
    fn on_chunk(&self, _key: &str, _chunk: &ResponseChunk) {}

    /// The completion stopped, or the provider signalled a stop.
    fn on_stop(&self, _key: &str, _reason: &StopReason) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl EventHandler for NoopEvents {}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl EventHandler for TracingEvents {
    fn on_params(&self, key: &str, params: &str) {
        tracing::debug!("[{key}] params: {params}");
    }

    fn on_chunk(&self, key: &str, chunk: &ResponseChunk) {
        tracing::trace!(
            "[{key}] chunk: content={:?}, reasoning={:?}, finish={:?}",
            chunk.content,
            chunk.reasoning_content.as_ref().map(|s| s.len()),
            chunk.finish_reason
        );
    }

    fn on_stop(&self, key: &str, reason: &StopReason) {
        match reason {
            StopReason::Error(e) => tracing::error!("[{key}] stopped with error: {e}"),
            StopReason::Cancelled => tracing::warn!("[{key}] cancelled"),
            reason => tracing::debug!("[{key}] stopped: {reason:?}"),
        }
    }
}

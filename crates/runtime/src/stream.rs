//! The consumer side of a streaming completion.

use futures_core::Stream;
use qcore::Result;
use std::{
    pin::Pin,
    task::{Context, Poll, ready},
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// Outputs of one streaming completion, in arrival order.
///
/// Dropping the stream cancels the request: before the end the request is
/// abandoned, after it the producer stops draining the wire. A wire failure is
/// yielded as the last item.
pub struct OutputStream<T> {
    rx: UnboundedReceiver<Result<T>>,
    token: CancellationToken,
    finished: bool,
}

impl<T> OutputStream<T> {
    pub(crate) fn new(rx: UnboundedReceiver<Result<T>>, token: CancellationToken) -> Self {
        Self {
            rx,
            token,
            finished: false,
        }
    }

    /// Cancel the request. Outputs already produced are still yielded.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the stream has yielded its last item.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<T> Stream for OutputStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        let item = ready!(this.rx.poll_recv(cx));
        if item.is_none() {
            this.finished = true;
        }
        Poll::Ready(item)
    }
}

impl<T> Drop for OutputStream<T> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("output stream dropped before its end");
        }
        self.token.cancel();
    }
}

impl<T> std::fmt::Debug for OutputStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("finished", &self.finished)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

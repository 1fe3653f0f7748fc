//! Workflows: tasks that combine several completions.
//!
//! A workflow gets an [`Environment`] holding the engine that runs it, so it
//! can issue any number of completions, single-shot or streaming, and
//! combine their outputs. Caller-provided tools travel alongside.

use crate::{Engine, OutputStream};
use futures_core::Stream;
use futures_util::StreamExt;
use qcore::{Result, Transport};
use std::future::Future;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// What a workflow runs against.
pub struct Environment<T> {
    /// The engine running the workflow.
    pub engine: Engine<T>,

    /// Span every completion of the workflow is recorded under.
    pub span: Span,
}

impl<T> Clone for Environment<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            span: self.span.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Environment<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("engine", &self.engine)
            .finish()
    }
}

/// A task producing one output from several completions.
pub trait Workflow<T: Transport>: Send + Sync {
    /// Caller-provided helpers, `()` when none.
    type Tools: Send + Sync;

    /// The final output.
    type Output: Send;

    /// Key naming the workflow in logs.
    fn key(&self) -> &str;

    /// Run the workflow.
    fn run(
        &self,
        env: &Environment<T>,
        tools: &Self::Tools,
    ) -> impl Future<Output = Result<Self::Output>> + Send;
}

/// A task streaming outputs from several completions.
pub trait StreamWorkflow<T: Transport>: Send {
    /// Caller-provided helpers, `()` when none.
    type Tools: Send;

    /// One streamed output.
    type Output: Send;

    /// Key naming the workflow in logs.
    fn key(&self) -> &str;

    /// Stream the workflow's outputs. A failure ends the stream.
    fn stream(
        self,
        env: Environment<T>,
        tools: Self::Tools,
    ) -> impl Stream<Item = Result<Self::Output>> + Send;
}

impl<T: Transport + 'static> Engine<T> {
    /// The environment a workflow named `key` runs in.
    pub fn environment(&self, key: &str) -> Environment<T> {
        Environment {
            engine: self.clone(),
            span: tracing::info_span!("workflow", key),
        }
    }

    /// Run a workflow to its output.
    pub async fn run<W: Workflow<T>>(&self, workflow: &W, tools: &W::Tools) -> Result<W::Output> {
        let env = self.environment(workflow.key());
        let span = env.span.clone();
        async {
            tracing::debug!("workflow started");
            let output = workflow.run(&env, tools).await;
            if let Err(e) = &output {
                tracing::warn!("workflow failed: {e}");
            }
            output
        }
        .instrument(span)
        .await
    }

    /// Stream a workflow's outputs.
    ///
    /// The workflow runs on its own task. Dropping the returned stream stops
    /// it, which in turn drops and cancels its inner streams.
    pub fn run_stream<W>(&self, workflow: W, tools: W::Tools) -> OutputStream<W::Output>
    where
        W: StreamWorkflow<T> + 'static,
        W::Output: 'static,
    {
        let env = self.environment(workflow.key());
        let span = env.span.clone();
        let outputs = workflow.stream(env, tools);
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        tokio::spawn(forward(outputs, tx, token.clone()).instrument(span));
        OutputStream::new(rx, token)
    }
}

/// Forward workflow outputs to the caller until the first failure.
async fn forward<O, S>(outputs: S, tx: UnboundedSender<Result<O>>, token: CancellationToken)
where
    S: Stream<Item = Result<O>> + Send,
{
    let mut outputs = std::pin::pin!(outputs);
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("workflow stream dropped");
                return;
            }
            next = outputs.next() => next,
        };

        let Some(output) = next else {
            tracing::debug!("workflow finished");
            return;
        };

        let failed = output.is_err();
        if tx.send(output).is_err() || failed {
            return;
        }
    }
}

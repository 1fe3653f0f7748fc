//! quill runtime: the completion engine.
//!
//! The [`Engine`] resolves a task's prompt, picks a model from the
//! [`Registry`], sends the request through a [`Transport`] and turns the
//! decoded chunks into task outputs. Every chunk and terminal condition is
//! reported to the configured [`EventHandler`]. A [`Workflow`] combines
//! several completions through the same engine.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use provider::HttpProvider;
//! use qcore::{Model, Registry, StaticTemplates, Templates, TextCompletion};
//! use runtime::Engine;
//!
//! let registry = Registry::new([Model::new("deepseek-chat", base_url, key)])?;
//! let engine = Engine::new(HttpProvider::default(), registry)
//!     .with_templates(Templates::new().with(StaticTemplates::new().with("translate", "Translate: {{text}}")));
//! let task = TextCompletion::new("translate", &input);
//! let mut stream = engine.stream(task).await?;
//! while let Some(fragment) = stream.next().await {
//!     print!("{}", fragment?);
//! }
//! ```

pub use {
    stream::OutputStream,
    workflow::{Environment, StreamWorkflow, Workflow},
};

use futures_util::StreamExt;
use qcore::{
    Assembler, ChunkStream, Completion, Error, EventHandler, PromptInput, Registry, Request,
    ResponseChunk, Result, StopReason, StreamCompletion, Templates, TracingEvents, Transport,
    Usage, trim_symbols,
};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;

mod stream;
mod workflow;

/// The completion engine.
///
/// Cheap to clone; clones share the transport, registry, templates and
/// event handler.
pub struct Engine<T> {
    transport: Arc<T>,
    registry: Registry,
    templates: Templates,
    events: Arc<dyn EventHandler>,
}

impl<T: Transport + 'static> Engine<T> {
    /// Create an engine with no template providers that logs its events.
    pub fn new(transport: T, registry: Registry) -> Self {
        Self {
            transport: Arc::new(transport),
            registry,
            templates: Templates::new(),
            events: Arc::new(TracingEvents),
        }
    }

    /// Set the template provider chain.
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    /// Set the event handler.
    pub fn with_events(mut self, events: Arc<dyn EventHandler>) -> Self {
        self.events = events;
        self
    }

    /// The model registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run a single-shot completion.
    pub async fn generate<C: Completion>(&self, task: &C) -> Result<C::Output> {
        self.generate_with_cancel(task, CancellationToken::new()).await
    }

    /// Run a single-shot completion that gives up when `token` fires.
    pub async fn generate_with_cancel<C: Completion>(
        &self,
        task: &C,
        token: CancellationToken,
    ) -> Result<C::Output> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.events.on_stop(task.key(), &StopReason::Cancelled);
                Err(Error::Cancelled)
            }
            output = self.generate_once(task) => output,
        }
    }

    async fn generate_once<C: Completion>(&self, task: &C) -> Result<C::Output> {
        let key = task.key();
        let request = self.prepare(task, false).await?;
        let mut wire = self.transport.send(request);
        let chunk = match wire.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                self.events.on_stop(key, &StopReason::Error(e.to_string()));
                return Err(e);
            }
            None => {
                let e = Error::GenerateNothingReturned;
                tracing::warn!("[{key}] {e}");
                self.events.on_stop(key, &StopReason::Error(e.to_string()));
                return Err(e);
            }
        };

        self.events.on_chunk(key, &chunk);
        if chunk.is_stop() {
            self.events.on_stop(key, &StopReason::LlmFinishReasonStop);
        }

        let mut usage = Usage::default();
        usage.accept(&chunk);
        log_usage(key, &usage);

        let text = trim_symbols(&chunk.content, task.start_symbol(), task.end_symbol());
        Ok(task.output(text))
    }

    /// Start a streaming completion.
    ///
    /// Template, prompt and model errors are returned before the request is
    /// sent. The request runs on its own task until the stream ends or is
    /// dropped.
    pub async fn stream<C: StreamCompletion>(&self, task: C) -> Result<OutputStream<C::Output>> {
        let request = self.prepare(&task, true).await?;
        let wire = self.transport.send(request);
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        tokio::spawn(drive(task, wire, self.events.clone(), tx, token.clone()));
        Ok(OutputStream::new(rx, token))
    }

    /// Resolve the prompt and model for a task.
    async fn prepare<C: Completion>(&self, task: &C, stream: bool) -> Result<Request> {
        let key = task.key();
        let template = match task.template() {
            Some(template) => template.to_owned(),
            None => self.templates.find(key).await?,
        };

        let input = task.input().normalized();
        let prompt = qcore::resolve(&template, &input)?;
        let selection = self.registry.resolve(key, task.preferred_model())?;
        tracing::debug!(
            "[{key}] model {} (preferred: {}, stream: {stream})",
            selection.model.name,
            selection.preferred
        );

        let params = serde_json::to_string(&input).unwrap_or_default();
        self.events.on_params(key, &params);
        tracing::trace!("[{key}] prompt: {prompt}");
        Ok(Request {
            prompt,
            model: selection.model,
            stream,
            timeout: task.timeout(),
        })
    }
}

impl<T> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            templates: self.templates.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("templates", &self.templates)
            .finish()
    }
}

/// Drive one streaming request to completion.
///
/// Owns the wire and the assembler. Once the assembler is terminal, or the
/// provider reports a stop, the sender is dropped to end the caller's stream
/// and the wire is drained for events only, until it ends or the caller drops
/// the stream.
async fn drive<C: StreamCompletion>(
    task: C,
    mut wire: ChunkStream,
    events: Arc<dyn EventHandler>,
    tx: UnboundedSender<Result<C::Output>>,
    token: CancellationToken,
) {
    let key = task.key();
    let mut assembler = Assembler::new(&task);
    let mut usage = Usage::default();
    let mut tx = Some(tx);

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                if tx.is_some() {
                    tracing::warn!("[{key}] stream cancelled");
                    events.on_stop(key, &StopReason::Cancelled);
                } else {
                    tracing::debug!("[{key}] output closed, drain abandoned");
                    log_usage(key, &usage);
                    events.on_stop(key, &StopReason::StreamFinished);
                }
                return;
            }
            next = wire.next() => next,
        };

        let chunk: ResponseChunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                events.on_stop(key, &StopReason::Error(e.to_string()));
                if let Some(tx) = tx {
                    let _ = tx.send(Err(e));
                }
                return;
            }
            None => break,
        };

        events.on_chunk(key, &chunk);
        usage.accept(&chunk);
        if chunk.is_stop() {
            events.on_stop(key, &StopReason::LlmFinishReasonStop);
        }

        let Some(sender) = &tx else {
            continue;
        };

        let mut outputs: Vec<_> = assembler.push(&chunk.content).into_iter().collect();
        let done = chunk.is_stop() || assembler.state().is_terminal();
        if done {
            outputs.extend(assembler.finish());
        }

        for output in outputs {
            if sender.send(Ok(output)).is_err() {
                tracing::warn!("[{key}] receiver dropped");
                events.on_stop(key, &StopReason::Cancelled);
                return;
            }
        }

        if done {
            tx = None;
        }
    }

    if let Some(output) = assembler.finish()
        && let Some(sender) = &tx
    {
        let _ = sender.send(Ok(output));
    }

    if assembler.emitted() == 0 {
        tracing::warn!(
            "[{key}] stream produced no output: state={:?}, start={:?}, end={:?}, cache={:?}",
            assembler.state(),
            task.start_symbol(),
            task.end_symbol(),
            assembler.cache()
        );
    }

    log_usage(key, &usage);
    events.on_stop(key, &StopReason::StreamFinished);
}

fn log_usage(key: &str, usage: &Usage) {
    tracing::debug!(
        "[{key}] usage: prompt={}, completion={}, total={}",
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total()
    );
}

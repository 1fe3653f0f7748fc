//! The `generate` and `stream` commands

use crate::Config;
use anyhow::{Result, anyhow};
use clap::Args;
use futures_util::StreamExt;
use provider::HttpProvider;
use qcore::{Completion, NormalizedInput, Registry, TextCompletion};
use runtime::Engine;
use std::{future::Future, io::Write, time::Duration};

/// Completion command arguments
#[derive(Debug, Args)]
pub struct CompleteCmd {
    /// The task key, used for template lookup and routing
    pub key: String,

    /// Template input as `key=value`, repeatable
    #[arg(short, long = "input", value_parser = parse_input)]
    pub inputs: Vec<(String, String)>,

    /// Use this configured model instead of the rotation
    #[arg(short, long)]
    pub model: Option<String>,

    /// Drop everything up to and including this symbol
    #[arg(long)]
    pub start: Option<String>,

    /// Drop everything from this symbol onward
    #[arg(long)]
    pub end: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Inline template, used instead of the configured one
    #[arg(long)]
    pub template: Option<String>,
}

impl CompleteCmd {
    /// Build the task described by the arguments
    pub fn task(&self, config: &Config, registry: &Registry) -> Result<TextCompletion> {
        let input: NormalizedInput = self.inputs.iter().cloned().collect();
        let timeout = self
            .timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.timeout());
        let mut task = TextCompletion::new(self.key.as_str(), &input)
            .with_timeout(timeout)
            .with_symbols(self.start.clone(), self.end.clone());

        if let Some(template) = &self.template {
            task = task.with_template(template.clone());
        }

        if let Some(name) = &self.model {
            let model = registry
                .get(name)
                .ok_or_else(|| anyhow!("model {name} is not configured"))?;
            task = task.with_model(model);
        }

        Ok(task)
    }

    /// Run a single-shot completion and print the result
    pub async fn generate(&self, config: &Config) -> Result<()> {
        let engine = engine(config)?;
        let task = self.task(config, engine.registry())?;
        let output = with_fallback(engine.registry(), &task, config.defaults.retries, |task| {
            let engine = engine.clone();
            async move { engine.generate(&task).await }
        })
        .await?;
        println!("{output}");
        Ok(())
    }

    /// Stream a completion, printing fragments as they arrive
    pub async fn stream(&self, config: &Config) -> Result<()> {
        let engine = engine(config)?;
        let mut task = self.task(config, engine.registry())?;
        let mut model = engine
            .registry()
            .resolve(task.key(), task.preferred_model())?
            .model;
        let mut retries = config.defaults.retries;
        let mut stdout = std::io::stdout();

        loop {
            let mut stream = engine.stream(task.clone()).await?;
            let mut printed = false;
            let failure = loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::warn!("interrupted");
                        println!();
                        return Ok(());
                    }
                    next = stream.next() => match next {
                        Some(Ok(fragment)) => {
                            print!("{fragment}");
                            stdout.flush()?;
                            printed = true;
                        }
                        Some(Err(e)) => break e,
                        None => {
                            println!();
                            return Ok(());
                        }
                    }
                }
            };

            if printed || !failure.is_retryable() || retries == 0 {
                return Err(failure.into());
            }

            retries -= 1;
            model = engine.registry().fallback(&model.name);
            tracing::warn!("{failure}, retrying with {}", model.name);
            task = task.with_model(model.clone());
        }
    }
}

/// Build an engine over HTTP from the configuration
fn engine(config: &Config) -> Result<Engine<HttpProvider>> {
    Ok(Engine::new(HttpProvider::default(), config.registry()?).with_templates(config.templates()))
}

/// Run `attempt` on `task`, falling back to the next model while it fails
/// with a retryable error, at most `retries` times.
///
/// The first attempt uses the task's own model selection. Each retry pins the
/// task to a model other than the one that just failed, so routed and
/// preferred keys fall back too.
pub async fn with_fallback<O, F, Fut>(
    registry: &Registry,
    task: &TextCompletion,
    retries: u32,
    mut attempt: F,
) -> qcore::Result<O>
where
    F: FnMut(TextCompletion) -> Fut,
    Fut: Future<Output = qcore::Result<O>>,
{
    let mut task = task.clone();
    let mut model = registry.resolve(task.key(), task.preferred_model())?.model;
    let mut left = retries;
    loop {
        match attempt(task.clone()).await {
            Err(e) if e.is_retryable() && left > 0 => {
                left -= 1;
                model = registry.fallback(&model.name);
                tracing::warn!("{e}, retrying with {}", model.name);
                task = task.with_model(model.clone());
            }
            result => return result,
        }
    }
}

/// Parse a `key=value` input pair
fn parse_input(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((key.trim().to_owned(), value.to_owned()))
}


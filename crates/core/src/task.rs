//! Completion tasks
//!
//! A task names a prompt template (its key), carries the input that fills
//! the template, and decides how raw model text becomes output. Single-shot
//! tasks implement [`Completion`]; streaming tasks add [`StreamCompletion`]
//! with a per-invocation cache and a chunk reducer.

use crate::{Error, Model, Result};
use compact_str::CompactString;
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    hash::BuildHasher,
    sync::Arc,
    time::Duration,
};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Start symbol used by delimited text tasks.
pub const DEFAULT_START_SYMBOL: &str = "^^";

/// End symbol used by delimited text tasks.
pub const DEFAULT_END_SYMBOL: &str = "$$";

/// Task input projected to template parameters.
pub type NormalizedInput = BTreeMap<String, String>;

/// Input that can be projected into template parameters.
pub trait PromptInput {
    /// The key/value projection used to fill `{{key}}` placeholders.
    fn normalized(&self) -> NormalizedInput;
}

impl PromptInput for NormalizedInput {
    fn normalized(&self) -> NormalizedInput {
        self.clone()
    }
}

impl<S: BuildHasher> PromptInput for HashMap<String, String, S> {
    fn normalized(&self) -> NormalizedInput {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Project a serializable struct into template parameters.
///
/// Strings are used as-is, numbers and booleans by their JSON text, arrays
/// and objects as compact JSON. `null` fields are omitted so their
/// placeholders stay unresolved.
pub fn normalize<T: Serialize + ?Sized>(input: &T) -> Result<NormalizedInput> {
    let value = serde_json::to_value(input)
        .map_err(|e| Error::InvalidPromptParameters(format!("unserializable input: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(Error::InvalidPromptParameters(
            "input must serialize to a map".into(),
        ));
    };

    Ok(fields
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        })
        .collect())
}

/// A single-shot completion task.
pub trait Completion: Send + Sync + 'static {
    /// The task input.
    type Input: PromptInput + Send + Sync;

    /// The task output.
    type Output: Send + 'static;

    /// Stable identity used for template lookup, routing and events.
    fn key(&self) -> &str;

    /// The task input.
    fn input(&self) -> &Self::Input;

    /// An inline template, consulted before any template provider.
    fn template(&self) -> Option<&str> {
        None
    }

    /// Request timeout, enforced by the wire client.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Everything up to and including this symbol is noise.
    fn start_symbol(&self) -> Option<&str> {
        None
    }

    /// Everything from this symbol onward is noise.
    fn end_symbol(&self) -> Option<&str> {
        None
    }

    /// A model to use instead of the registry rotation.
    fn preferred_model(&self) -> Option<Arc<Model>> {
        None
    }

    /// Turn the trimmed response text into the final output.
    fn output(&self, text: String) -> Self::Output;
}

/// A completion task that can be streamed.
pub trait StreamCompletion: Completion {
    /// Per-invocation accumulator.
    type Cache: Debug + Send;

    /// Fresh cache for a new invocation.
    fn initial_cache(&self) -> Self::Cache;

    /// Reduce one trimmed text fragment into an optional output.
    fn reduce(&self, fragment: &str, cache: &mut Self::Cache) -> Step<Self::Output>;
}

/// The result of reducing one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<T> {
    /// Output to emit, if any.
    pub output: Option<T>,

    /// Whether the stream should stop after this fragment.
    pub stop: bool,
}

impl<T> Step<T> {
    /// Emit an output and keep going.
    pub fn emit(output: T) -> Self {
        Self {
            output: Some(output),
            stop: false,
        }
    }

    /// Emit nothing and keep going.
    pub fn skip() -> Self {
        Self {
            output: None,
            stop: false,
        }
    }

    /// Mark this step as the last one.
    pub fn stop(mut self) -> Self {
        self.stop = true;
        self
    }
}

/// A plain text task.
///
/// Streams each fragment as it arrives and keeps the full text in its cache.
/// `generate` returns the trimmed response text.
#[derive(Debug, Clone)]
pub struct TextCompletion {
    key: CompactString,
    input: NormalizedInput,
    template: Option<String>,
    timeout: Duration,
    start_symbol: Option<String>,
    end_symbol: Option<String>,
    model: Option<Arc<Model>>,
}

impl TextCompletion {
    /// Create a new text task for the given template key.
    pub fn new(key: impl Into<CompactString>, input: &impl PromptInput) -> Self {
        Self {
            key: key.into(),
            input: input.normalized(),
            template: None,
            timeout: DEFAULT_TIMEOUT,
            start_symbol: None,
            end_symbol: None,
            model: None,
        }
    }

    /// Use an inline template instead of looking one up by key.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the start and end symbols.
    pub fn with_symbols(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start_symbol = start;
        self.end_symbol = end;
        self
    }

    /// Use the default `^^` / `$$` delimiters.
    pub fn delimited(self) -> Self {
        self.with_symbols(
            Some(DEFAULT_START_SYMBOL.into()),
            Some(DEFAULT_END_SYMBOL.into()),
        )
    }

    /// Prefer a specific model over the registry rotation.
    pub fn with_model(mut self, model: Arc<Model>) -> Self {
        self.model = Some(model);
        self
    }
}

impl Completion for TextCompletion {
    type Input = NormalizedInput;
    type Output = String;

    fn key(&self) -> &str {
        &self.key
    }

    fn input(&self) -> &NormalizedInput {
        &self.input
    }

    fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn start_symbol(&self) -> Option<&str> {
        self.start_symbol.as_deref()
    }

    fn end_symbol(&self) -> Option<&str> {
        self.end_symbol.as_deref()
    }

    fn preferred_model(&self) -> Option<Arc<Model>> {
        self.model.clone()
    }

    fn output(&self, text: String) -> String {
        text
    }
}

impl StreamCompletion for TextCompletion {
    type Cache = String;

    fn initial_cache(&self) -> String {
        String::new()
    }

    fn reduce(&self, fragment: &str, cache: &mut String) -> Step<String> {
        cache.push_str(fragment);
        Step::emit(fragment.to_owned())
    }
}

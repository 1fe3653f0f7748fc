//! Prompt templates and resolution

use crate::{Error, Result, task::NormalizedInput};
use compact_str::CompactString;
use futures_util::future::{self, BoxFuture};
use std::{collections::BTreeMap, sync::Arc};

/// Marker opening a placeholder.
const OPEN: &str = "{{";

/// Marker closing a placeholder.
const CLOSE: &str = "}}";

/// Fill every `{{key}}` of `template` with the matching input value.
///
/// Input keys without a placeholder are ignored. Fails with
/// [`Error::InvalidPromptParameters`] if any `{{` remains afterwards.
pub fn resolve(template: &str, input: &NormalizedInput) -> Result<String> {
    let mut prompt = template.to_owned();
    for (key, value) in input {
        prompt = prompt.replace(&format!("{OPEN}{key}{CLOSE}"), value);
    }

    if let Some(start) = prompt.find(OPEN) {
        let rest = &prompt[start..];
        let placeholder = match rest.find(CLOSE) {
            Some(end) => &rest[..end + CLOSE.len()],
            None => rest,
        };
        return Err(Error::InvalidPromptParameters(format!(
            "unresolved placeholder `{placeholder}`"
        )));
    }

    Ok(prompt)
}

/// A source of prompt templates keyed by task key.
pub trait TemplateProvider: Send + Sync {
    /// Look up the template for `key`. `Ok(None)` lets the next provider try.
    fn template<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
}

/// Templates held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: BTreeMap<CompactString, String>,
}

impl StaticTemplates {
    /// Create an empty template set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the template for `key`.
    pub fn insert(&mut self, key: impl Into<CompactString>, template: impl Into<String>) {
        self.templates.insert(key.into(), template.into());
    }

    /// Builder-style [`StaticTemplates::insert`].
    pub fn with(mut self, key: impl Into<CompactString>, template: impl Into<String>) -> Self {
        self.insert(key, template);
        self
    }

    /// Number of templates held.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no template is held.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl<K: Into<CompactString>, V: Into<String>> FromIterator<(K, V)> for StaticTemplates {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            templates: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl TemplateProvider for StaticTemplates {
    fn template<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(future::ready(Ok(self.templates.get(key).cloned())))
    }
}

/// An ordered chain of template providers; the first hit wins.
#[derive(Clone, Default)]
pub struct Templates {
    providers: Vec<Arc<dyn TemplateProvider>>,
}

impl Templates {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to the chain.
    pub fn with(mut self, provider: impl TemplateProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Find the template for `key`.
    pub async fn find(&self, key: &str) -> Result<String> {
        for provider in &self.providers {
            match provider.template(key).await {
                Ok(Some(template)) => return Ok(template),
                Ok(None) => continue,
                Err(Error::PromptTemplateNotFound(_)) => continue,
                Err(e) => {
                    tracing::error!("template provider failed for {key}: {e}");
                    return Err(match e {
                        Error::PromptTemplate { .. } => e,
                        other => Error::PromptTemplate {
                            key: key.into(),
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }

        tracing::error!("prompt template not found for {key}");
        Err(Error::PromptTemplateNotFound(key.into()))
    }

    /// Number of providers in the chain.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain has no provider.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates")
            .field("providers", &self.providers.len())
            .finish()
    }
}

//! Ordered candidate models with a rotating current index.

use crate::{Error, Model, Result};
use compact_str::CompactString;
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

/// Ordered list of candidate models with a rotating "current" index.
///
/// The index is the only mutable state and sits behind a mutex, so
/// concurrent `advance()` calls are serialized and readers always see a
/// consistent model. Callers get `Arc<Model>` clones and never hold the lock
/// while talking to the network.
pub struct Registry {
    inner: Arc<Inner>,
}

struct Inner {
    /// Candidate models, in fallback order.
    models: Vec<Arc<Model>>,
    /// Task key → model name.
    routes: BTreeMap<CompactString, CompactString>,
    /// Index of the current model.
    index: Mutex<usize>,
}

/// A model picked for one request.
#[derive(Debug, Clone)]
pub struct Selection {
    /// The selected model.
    pub model: Arc<Model>,
    /// Whether a caller-preferred model known to the registry was used.
    pub preferred: bool,
}

/// Info about a single registry entry returned by `list()`.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Model name.
    pub name: CompactString,
    /// Whether this is the current model.
    pub current: bool,
}

impl Registry {
    /// Create a registry; the first model becomes current.
    ///
    /// Returns [`Error::EmptyRegistry`] if `models` is empty.
    pub fn new(models: impl IntoIterator<Item = Model>) -> Result<Self> {
        let models: Vec<_> = models.into_iter().map(Arc::new).collect();
        if models.is_empty() {
            return Err(Error::EmptyRegistry);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                models,
                routes: BTreeMap::new(),
                index: Mutex::new(0),
            }),
        })
    }

    /// Attach task-key routes. Must be called before the registry is shared.
    ///
    /// Routes naming an unknown model are kept; they fail at resolution time
    /// with [`Error::ModelNotFound`].
    pub fn with_routes<K, V>(self, routes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<CompactString>,
        V: Into<CompactString>,
    {
        let routes = routes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Arc::new(Inner {
                models: self.inner.models.clone(),
                routes,
                index: Mutex::new(*self.inner.index.lock()),
            }),
        }
    }

    /// The current model, or `preferred` when given.
    pub fn current(&self, preferred: Option<Arc<Model>>) -> Selection {
        if let Some(model) = preferred {
            let known = self.get(&model.name).is_some();
            return Selection {
                model,
                preferred: known,
            };
        }

        let index = *self.inner.index.lock();
        Selection {
            model: self.inner.models[index].clone(),
            preferred: false,
        }
    }

    /// Resolve the model for a task: preferred, then route, then current.
    pub fn resolve(&self, key: &str, preferred: Option<Arc<Model>>) -> Result<Selection> {
        if preferred.is_some() {
            return Ok(self.current(preferred));
        }

        if let Some(name) = self.inner.routes.get(key) {
            let Some(model) = self.get(name) else {
                tracing::warn!("route for {key} names unknown model {name}");
                return Err(Error::ModelNotFound(key.into()));
            };
            return Ok(Selection {
                model,
                preferred: false,
            });
        }

        Ok(self.current(None))
    }

    /// Rotate to the next model, wrapping around.
    pub fn advance(&self) -> Arc<Model> {
        let mut index = self.inner.index.lock();
        *index = (*index + 1) % self.inner.models.len();
        let model = self.inner.models[*index].clone();
        tracing::debug!("advanced to model {}", model.name);
        model
    }

    /// Rotate to the next model that is not named `failed`.
    ///
    /// Used after a request to `failed` went wrong, which may be a routed or
    /// preferred model rather than the current one. With a single model the
    /// same model comes back.
    pub fn fallback(&self, failed: &str) -> Arc<Model> {
        let len = self.inner.models.len();
        let mut index = self.inner.index.lock();
        for _ in 0..len {
            *index = (*index + 1) % len;
            if self.inner.models[*index].name != failed {
                break;
            }
        }

        let model = self.inner.models[*index].clone();
        tracing::debug!("fell back from {failed} to {}", model.name);
        model
    }

    /// Index of the current model.
    pub fn index(&self) -> usize {
        *self.inner.index.lock()
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.inner.models.iter().find(|m| m.name == name).cloned()
    }

    /// All models, in fallback order.
    pub fn models(&self) -> &[Arc<Model>] {
        &self.inner.models
    }

    /// List all models with their current status.
    pub fn list(&self) -> Vec<Entry> {
        let index = self.index();
        self.inner
            .models
            .iter()
            .enumerate()
            .map(|(i, m)| Entry {
                name: m.name.clone(),
                current: i == index,
            })
            .collect()
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.inner.models.len()
    }

    /// Always false; an empty registry cannot be built.
    pub fn is_empty(&self) -> bool {
        self.inner.models.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("current", &self.index())
            .field("count", &self.inner.models.len())
            .field("routes", &self.inner.routes.len())
            .finish()
    }
}

impl Clone for Registry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

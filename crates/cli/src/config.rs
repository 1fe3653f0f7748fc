//! Configuration for the CLI

use anyhow::{Result, bail};
use qcore::{Model, Registry, StaticTemplates, Templates};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

static CONFIG: LazyLock<PathBuf> =
    LazyLock::new(|| dirs::home_dir().unwrap_or_default().join(".config/quill.toml"));

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Candidate models, in fallback order
    #[serde(default)]
    pub models: Vec<Model>,

    /// Task key to model name
    #[serde(default)]
    pub routes: BTreeMap<String, String>,

    /// Prompt templates by task key
    #[serde(default)]
    pub templates: BTreeMap<String, String>,

    /// Request defaults
    #[serde(default)]
    pub defaults: Defaults,
}

/// Request defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds
    #[serde(default = "Defaults::timeout")]
    pub timeout: u64,

    /// How many times a retryable failure moves on to the next model
    #[serde(default)]
    pub retries: u32,
}

impl Defaults {
    fn timeout() -> u64 {
        qcore::DEFAULT_TIMEOUT.as_secs()
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: Self::timeout(),
            retries: 0,
        }
    }
}

impl Config {
    /// The default configuration path
    pub fn path() -> &'static Path {
        CONFIG.as_path()
    }

    /// Parse a TOML string, expanding `${VAR}` from the environment
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(&expand_env_vars(text))?)
    }

    /// Load the configuration from the file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Self::path());
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        Self::from_toml(&text)
    }

    /// Save the configuration to the file
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path.unwrap_or(Self::path());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string(self)?)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// The starter configuration written by `quill init`
    pub fn example() -> Self {
        Self {
            models: vec![Model {
                name: "deepseek-chat".into(),
                base_url: "https://api.deepseek.com/v1".into(),
                api_key: "${DEEPSEEK_API_KEY}".into(),
                thinking_disabled: Some(true),
                include_usage: true,
            }],
            routes: [("translate".to_owned(), "deepseek-chat".to_owned())]
                .into_iter()
                .collect(),
            templates: [(
                "translate".to_owned(),
                "Translate the following text to {{lang}}. \
                 Wrap the translation in ^^ and $$.\n\n{{text}}"
                    .to_owned(),
            )]
            .into_iter()
            .collect(),
            defaults: Defaults::default(),
        }
    }

    /// Build the model registry, checking every route target exists
    pub fn registry(&self) -> Result<Registry> {
        if self.models.is_empty() {
            bail!("no models configured");
        }

        for (key, name) in &self.routes {
            if !self.models.iter().any(|m| m.name == name.as_str()) {
                bail!("route {key} names unknown model {name}");
            }
        }

        Ok(Registry::new(self.models.clone())?.with_routes(self.routes.clone()))
    }

    /// The configured templates as a provider chain
    pub fn templates(&self) -> Templates {
        Templates::new().with(
            self.templates
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect::<StaticTemplates>(),
        )
    }

    /// The default request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.timeout)
    }
}

/// Expand `${VAR}` patterns in a string with environment variable values.
///
/// Unknown variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        if let Ok(value) = std::env::var(&tail[..end]) {
            result.push_str(&value);
        }
        rest = &tail[end + 1..];
    }

    result.push_str(rest);
    result
}

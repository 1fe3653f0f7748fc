//! quill CLI

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};
pub use {
    complete::{CompleteCmd, with_fallback},
    config::{Config, Defaults, expand_env_vars},
};

mod complete;
mod config;

/// Crates whose logs `-v` turns up.
const CRATES: [&str; 4] = ["quill", "quill_core", "quill_provider", "quill_runtime"];

/// quill CLI
#[derive(Debug, Parser)]
#[command(name = "quill", version, about)]
pub struct App {
    /// Verbosity level (use -v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file, defaults to ~/.config/quill.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single-shot completion
    Generate(CompleteCmd),

    /// Stream a completion
    Stream(CompleteCmd),

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl App {
    /// Initialize tracing subscriber based on verbosity
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = match self.verbose {
                0 => "info".to_owned(),
                1 => crates("debug"),
                2 => crates("trace"),
                3 => "debug".to_owned(),
                _ => "trace".to_owned(),
            };
            EnvFilter::new(directive)
        });

        fmt()
            .without_time()
            .with_env_filter(filter)
            .with_target(self.verbose != 0)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load the configuration from `--config` or the default path
    pub fn load_config(&self) -> anyhow::Result<Config> {
        Config::load(self.config.as_deref())
    }

    /// Write the starter configuration
    pub fn init_config(&self, force: bool) -> anyhow::Result<()> {
        let path = self.config.as_deref().unwrap_or(Config::path());
        if path.exists() && !force {
            anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
        }
        Config::example().save(Some(path))
    }
}

fn crates(level: &str) -> String {
    CRATES
        .iter()
        .map(|c| format!("{c}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

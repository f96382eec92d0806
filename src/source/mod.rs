//! Configuration sources.
//!
//! # Responsibilities
//! - Define the contract every configuration layer implements
//! - Adapt process-boundary inputs (files, environment, `.env`, flags) to that contract
//!
//! # Design Decisions
//! - A source only returns a nested [`Table`]; flattening and merging belong to `config::loader`
//! - Parsing is delegated to format crates (serde_yaml, serde_json, toml)
//! - Sources are re-read on every reload, nothing is cached here

pub mod defaults;
pub mod dotenv;
pub mod env;
pub mod file;
pub mod flags;

use std::path::PathBuf;

use thiserror::Error;

use crate::value::Table;

pub use defaults::Defaults;
pub use dotenv::DotEnvSource;
pub use env::EnvSource;
pub use file::{FileFormat, FileSource};
pub use flags::FlagSource;

/// One layer of configuration.
pub trait Source: Send + Sync {
    /// Human-readable name for logs and errors.
    fn name(&self) -> String;

    /// Load this layer as a (possibly nested) table.
    fn load(&self) -> Result<Table, SourceError>;
}

/// A source failed to produce its table.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name}: cannot read {path}: {error}")]
    Io {
        source_name: String,
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("{source_name}: cannot parse {path}: {message}")]
    Parse {
        source_name: String,
        path: PathBuf,
        message: String,
    },

    #[error("{source_name}: unsupported file format for {path}")]
    UnsupportedFormat { source_name: String, path: PathBuf },

    #[error("{source_name}: {error}")]
    Other {
        source_name: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SourceError {
    /// Name of the source that failed.
    pub fn source_name(&self) -> &str {
        match self {
            SourceError::Io { source_name, .. }
            | SourceError::Parse { source_name, .. }
            | SourceError::UnsupportedFormat { source_name, .. }
            | SourceError::Other { source_name, .. } => source_name,
        }
    }
}

impl<F> Source for F
where
    F: Fn() -> Result<Table, SourceError> + Send + Sync,
{
    fn name(&self) -> String {
        "closure".to_string()
    }

    fn load(&self) -> Result<Table, SourceError> {
        self()
    }
}

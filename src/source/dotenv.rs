//! `.env` style files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::value::{Table, Value};

use super::{Source, SourceError};

/// Reads `KEY=value` lines. Keys are kept as written.
#[derive(Debug, Clone)]
pub struct DotEnvSource {
    path: PathBuf,
}

impl DotEnvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Source for DotEnvSource {
    fn name(&self) -> String {
        format!("dotenv({})", self.path.display())
    }

    fn load(&self) -> Result<Table, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|error| SourceError::Io {
            source_name: self.name(),
            path: self.path.clone(),
            error,
        })?;
        Ok(parse(&content))
    }
}

fn parse(content: &str) -> Table {
    let mut out = Table::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        out.insert(key.trim().to_string(), Value::String(value.to_string()));
    }
    out
}

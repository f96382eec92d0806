//! Environment variables filtered by prefix.
//!
//! `APP_SERVER_HOST=x` with prefix `APP` becomes `server.host = "x"`.

use crate::value::{Table, Value};

use super::{Source, SourceError};

/// Reads variables starting with `<PREFIX>_`.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    /// Fixed variable set instead of the process environment.
    vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
    /// Read from the process environment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: None,
        }
    }

    /// Read from an explicit variable list.
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    fn translate(&self, name: &str) -> Option<String> {
        let marker = format!("{}_", self.prefix);
        let rest = name.strip_prefix(&marker)?;
        if rest.is_empty() {
            return None;
        }
        Some(rest.replace('_', ".").to_lowercase())
    }
}

impl Source for EnvSource {
    fn name(&self) -> String {
        format!("env({})", self.prefix)
    }

    fn load(&self) -> Result<Table, SourceError> {
        let vars: Vec<(String, String)> = match &self.vars {
            Some(vars) => vars.clone(),
            // Non-UTF-8 variables can never match a UTF-8 prefix.
            None => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        };

        let mut out = Table::new();
        for (name, value) in vars {
            if let Some(key) = self.translate(&name) {
                out.insert(key, Value::String(value));
            }
        }
        tracing::debug!(prefix = %self.prefix, keys = out.len(), "Environment source loaded");
        Ok(out)
    }
}

//! Structured configuration files (YAML, JSON, TOML).

use std::fs;
use std::path::{Path, PathBuf};

use crate::value::{Table, Value};

use super::{Source, SourceError};

/// Supported file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
    Toml,
}

impl FileFormat {
    /// Detect the format from `.yaml`/`.yml`, `.json` or `.toml`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(FileFormat::Yaml),
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// A configuration file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: Option<FileFormat>,
}

impl FileSource {
    /// Format is detected from the extension. An unknown extension fails on load.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = FileFormat::from_path(&path);
        Self { path, format }
    }

    pub fn with_format(path: impl AsRef<Path>, format: FileFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format: Some(format),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_error(&self, message: impl ToString) -> SourceError {
        SourceError::Parse {
            source_name: self.name(),
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl Source for FileSource {
    fn name(&self) -> String {
        format!("file({})", self.path.display())
    }

    fn load(&self) -> Result<Table, SourceError> {
        let format = self.format.ok_or_else(|| SourceError::UnsupportedFormat {
            source_name: self.name(),
            path: self.path.clone(),
        })?;

        let content = fs::read_to_string(&self.path).map_err(|error| SourceError::Io {
            source_name: self.name(),
            path: self.path.clone(),
            error,
        })?;

        let table = match format {
            FileFormat::Yaml => {
                let raw: serde_yaml::Value =
                    serde_yaml::from_str(&content).map_err(|e| self.parse_error(e))?;
                match raw {
                    // An empty document is an empty layer.
                    serde_yaml::Value::Null => Table::new(),
                    serde_yaml::Value::Mapping(map) => yaml_table(map),
                    _ => return Err(self.parse_error("top level must be a mapping")),
                }
            }
            FileFormat::Json => {
                let raw: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(&content).map_err(|e| self.parse_error(e))?;
                json_table(raw)
            }
            FileFormat::Toml => {
                let raw: toml::Table = toml::from_str(&content).map_err(|e| self.parse_error(e))?;
                toml_table(raw)
            }
        };

        tracing::debug!(path = ?self.path, ?format, keys = table.len(), "File source loaded");
        Ok(table)
    }
}

fn json_table(map: serde_json::Map<String, serde_json::Value>) -> Table {
    map.into_iter()
        .filter_map(|(k, v)| Some((k, from_json(v)?)))
        .collect()
}

fn from_json(value: serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;
    Some(match value {
        Json::Null => return None,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64()?),
        },
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::List(items.into_iter().filter_map(from_json).collect()),
        Json::Object(map) => Value::Map(json_table(map)),
    })
}

fn yaml_table(map: serde_yaml::Mapping) -> Table {
    map.into_iter()
        .filter_map(|(k, v)| Some((yaml_key(k)?, from_yaml(v)?)))
        .collect()
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value as Yaml;
    match key {
        Yaml::String(s) => Some(s),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn from_yaml(value: serde_yaml::Value) -> Option<Value> {
    use serde_yaml::Value as Yaml;
    Some(match value {
        Yaml::Null => return None,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64()?),
        },
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::List(items.into_iter().filter_map(from_yaml).collect()),
        Yaml::Mapping(map) => Value::Map(yaml_table(map)),
        Yaml::Tagged(tagged) => return from_yaml(tagged.value),
    })
}

fn toml_table(table: toml::Table) -> Table {
    table.into_iter().map(|(k, v)| (k, from_toml(v))).collect()
}

fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Integer(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => Value::Map(toml_table(table)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::flatten;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_path(Path::new("a.yaml")), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_path(Path::new("a.YML")), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_path(Path::new("a.json")), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_path(Path::new("a.toml")), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_path(Path::new("a.ini")), None);
        assert_eq!(FileFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "config.yaml",
            "server:\n  host: localhost\n  port: 8080\n  ratio: 0.5\nfeatures: [a, b]\nempty: {}\nnothing: ~\n",
        );
        let flat = flatten(&FileSource::new(path).load().unwrap());
        assert_eq!(flat.get("server.host"), Some(&Value::from("localhost")));
        assert_eq!(flat.get("server.port"), Some(&Value::Integer(8080)));
        assert_eq!(flat.get("server.ratio"), Some(&Value::Float(0.5)));
        assert_eq!(
            flat.get("features"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(flat.get("empty"), Some(&Value::empty_map()));
        assert!(flat.get("nothing").is_none());
    }

    #[test]
    fn test_empty_yaml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "empty.yml", "");
        assert!(FileSource::new(path).load().unwrap().is_empty());
    }

    #[test]
    fn test_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.json", r#"{"server": {"host": "localhost", "port": 8080}}"#);
        let flat = flatten(&FileSource::new(path).load().unwrap());
        assert_eq!(flat.get("server.port"), Some(&Value::Integer(8080)));
    }

    #[test]
    fn test_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.toml", "[server]\nhost = \"localhost\"\nport = 8080\n");
        let flat = flatten(&FileSource::new(path).load().unwrap());
        assert_eq!(flat.get("server.host"), Some(&Value::from("localhost")));
        assert_eq!(flat.get("server.port"), Some(&Value::Integer(8080)));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "broken.json", "{not json");
        let err = FileSource::new(path).load().unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.ini", "a=1");
        let err = FileSource::new(path).load().unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedFormat { .. }));
    }
}

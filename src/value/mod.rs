//! Configuration value model.
//!
//! # Data Flow
//! ```text
//! Source::load()
//!     → Table (nested tree of Value)
//!     → path.rs flatten (dot-joined keys)
//!     → FlatMap (stored by config::store)
//!     → coerce.rs (typed reads, binding, validation)
//! ```
//!
//! # Design Decisions
//! - Closed set of variants; every consumer pattern-matches instead of probing types
//! - Nested tables only exist inside source trees; a flat map holds a `Map` only when it is empty
//! - Lists are opaque leaves and are never walked as trees

pub mod coerce;
pub mod path;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

pub use coerce::{parse_duration, CoerceError, FromValue, ValueKind};
pub use path::{flatten, unflatten};

/// Nested key/value tree produced by a source.
pub type Table = BTreeMap<String, Value>;

/// Flat mapping from dot-joined key to leaf value.
pub type FlatMap = BTreeMap<String, Value>;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    StringList(Vec<String>),
    IntList(Vec<i64>),
    /// Heterogeneous list as produced by file formats.
    List(Vec<Value>),
    /// Nested table. Only ever empty once flattened.
    Map(Table),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Duration(_) => ValueKind::Duration,
            Value::StringList(_) => ValueKind::StringList,
            Value::IntList(_) => ValueKind::IntList,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    /// Shorthand for an empty nested table.
    pub fn empty_map() -> Self {
        Value::Map(Table::new())
    }

    pub fn as_map(&self) -> Option<&Table> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Duration(d) => write!(f, "{:?}", d),
            Value::StringList(items) => write!(f, "[{}]", items.join(" ")),
            Value::IntList(items) => {
                let parts: Vec<String> = items.iter().map(|n| n.to_string()).collect();
                write!(f, "[{}]", parts.join(" "))
            }
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(" "))
            }
            Value::Map(map) => {
                write!(f, "map[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Duration(d) => serializer.serialize_str(&format!("{:?}", d)),
            Value::StringList(items) => items.serialize(serializer),
            Value::IntList(items) => items.serialize(serializer),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(table) => {
                let mut map = serializer.serialize_map(Some(table.len()))?;
                for (k, v) in table {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StringList(items)
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Value::IntList(items)
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Map(table)
    }
}

/// Build a [`Table`] from `key => value` pairs.
///
/// ```
/// use layerconf::table;
/// let defaults = table! { "server.host" => "localhost", "server.port" => 3000 };
/// assert_eq!(defaults.len(), 2);
/// ```
#[macro_export]
macro_rules! table {
    () => { $crate::value::Table::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut table = $crate::value::Table::new();
        $( table.insert(::std::string::String::from($key), $crate::value::Value::from($value)); )+
        table
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::from(8080).to_string(), "8080");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(Duration::from_millis(1500)).to_string(), "1.5s");
    }

    #[test]
    fn test_serialize_nested() {
        let mut inner = Table::new();
        inner.insert("port".into(), Value::Integer(80));
        let mut root = Table::new();
        root.insert("server".into(), Value::Map(inner));
        root.insert("tags".into(), Value::StringList(vec!["a".into(), "b".into()]));

        let json = serde_json::to_string(&Value::Map(root)).unwrap();
        assert_eq!(json, r#"{"server":{"port":80},"tags":["a","b"]}"#);
    }

    #[test]
    fn test_table_macro() {
        let t = table! { "a" => "x", "b" => 2, "c" => false };
        assert_eq!(t.get("a"), Some(&Value::String("x".into())));
        assert_eq!(t.get("b"), Some(&Value::Integer(2)));
        assert_eq!(t.get("c"), Some(&Value::Bool(false)));
    }
}

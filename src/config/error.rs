//! Error types for lookups, binding, validation and reload.

use thiserror::Error;

use crate::source::SourceError;
use crate::value::{CoerceError, ValueKind};
use crate::watch::WatchError;

/// Top-level error for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Typed lookup on a key that is not present.
    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    /// Value present but not convertible to the requested type.
    #[error("type mismatch for key {key:?}: expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        actual: ValueKind,
        #[source]
        cause: CoerceError,
    },

    /// A source failed; nothing was published.
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl ConfigError {
    pub(crate) fn mismatch(key: &str, cause: CoerceError) -> Self {
        ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: cause.expected,
            actual: cause.actual,
            cause,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// First failure while populating a schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("bind: field {field} ({key}): {reason}")]
pub struct BindError {
    /// Field path within the target, e.g. `pool.size`.
    pub field: String,
    /// Configuration key the field is bound to.
    pub key: String,
    pub reason: BindFailure,
}

/// Why a field could not be populated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindFailure {
    #[error("{0}")]
    Value(CoerceError),

    #[error("default {literal:?}: {cause}")]
    Default { literal: String, cause: CoerceError },
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("validation failed: {}", render_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Violations recorded for one key.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }
}

fn render_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = ValidationError {
            errors: vec![
                FieldError::new("server.port", "required"),
                FieldError::new("server.host", "value \"\" does not match pattern \".+\""),
            ],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: server.port: required; server.host: value \"\" does not match pattern \".+\""
        );
        assert_eq!(err.for_field("server.port").count(), 1);
    }

    #[test]
    fn test_violations_are_errors() {
        let field = FieldError::new("a", "required");
        let boxed: Box<dyn std::error::Error> = Box::new(field.clone());
        assert_eq!(boxed.to_string(), "a: required");

        let err: ConfigError = ValidationError { errors: vec![field] }.into();
        assert_eq!(err.to_string(), "validation failed: a: required");
        assert_eq!(ValidationError::default().to_string(), "validation failed: ");
    }

    #[test]
    fn test_key_not_found_display() {
        let err = ConfigError::KeyNotFound { key: "a.b".into() };
        assert_eq!(err.to_string(), "key not found: a.b");
    }

    #[test]
    fn test_bind_error_display() {
        let err = BindError {
            field: "port".into(),
            key: "server.port".into(),
            reason: BindFailure::Default {
                literal: "abc".into(),
                cause: CoerceError {
                    expected: ValueKind::Integer,
                    actual: ValueKind::String,
                    detail: None,
                },
            },
        };
        assert_eq!(
            err.to_string(),
            "bind: field port (server.port): default \"abc\": cannot convert string to integer"
        );
    }
}

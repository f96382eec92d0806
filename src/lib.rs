//! Layered configuration: merge defaults, files, dotenv, environment and
//! flags into one flat key space, then read it typed, bind it to structs,
//! validate it and reload it when the file changes.

// Core
pub mod config;
pub mod source;
pub mod value;

// Change notification
pub mod watch;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{
    BindError, BindFailure, Config, ConfigBuilder, ConfigError, ConfigResult, Descriptor,
    FieldError, FieldSpec, HotReload, Rule, Rules, Schema, ValidationError,
};
pub use source::{Source, SourceError};
pub use value::{flatten, parse_duration, unflatten, CoerceError, FlatMap, FromValue, Table, Value, ValueKind};
pub use watch::{WatchError, Watcher};

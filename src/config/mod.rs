//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! sources (defaults, file, dotenv, env, flags, custom)
//!     → loader.rs (load each in order, flatten, later keys win)
//!     → store.rs (publish the merged flat map with one atomic swap)
//!     → access.rs (typed lookups), schema.rs (struct binding),
//!       validation.rs (rule checks)
//!
//! On file change:
//!     watcher.rs (debounced signal)
//!     → store.rs reload
//!     → change handlers, only if the reload succeeded
//! ```
//!
//! # Design Decisions
//! - A snapshot is immutable once published; changes require a full reload
//! - A failed reload never replaces the current snapshot
//! - Binding and schema validation share one field descriptor

pub mod access;
pub mod error;
pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use error::{BindError, BindFailure, ConfigError, ConfigResult, FieldError, ValidationError};
pub use loader::{merge_sources, ConfigBuilder};
pub use schema::{shared_descriptor, Descriptor, FieldSpec, Schema};
pub use store::Config;
pub use validation::{Predicate, Rule, Rules};
pub use watcher::HotReload;

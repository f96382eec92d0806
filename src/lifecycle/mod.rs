//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Cancellation (shutdown.rs):
//!     Watcher::stop() → Shutdown::trigger() → debounce loops exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary stops its watchers and exits
//! ```
//!
//! # Design Decisions
//! - Cancellation is a broadcast, each background loop holds its own receiver
//! - Triggering is idempotent; a second trigger is a no-op

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;

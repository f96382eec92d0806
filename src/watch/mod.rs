//! Debounced change notification.
//!
//! # Data Flow
//! ```text
//! ChangeSignal (notify / channel)
//!     → Subscription (event queue)
//!     → debounce.rs loop: write/create resets a single deadline
//!     → deadline expires → callbacks, in registration order
//! ```
//!
//! # Design Decisions
//! - One background task per watcher owns the deadline; nobody else touches it
//! - Signal errors are logged and skipped; only a closed queue ends the loop
//! - Stop is non-blocking and never waits on callbacks

pub mod debounce;
pub mod signal;

use thiserror::Error;

pub use debounce::{Watcher, WatcherState, DEFAULT_DEBOUNCE};
pub use signal::{ChangeKind, ChangeSignal, ChannelSignal, FileSignal, SignalEvent, SignalSender, Subscription};

/// Errors from starting a watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("watcher requires a running tokio runtime")]
    NoRuntime,

    #[error("watcher is already running")]
    AlreadyRunning,

    #[error("watcher was stopped and cannot be restarted")]
    Terminated,

    #[error("change signal already has a subscriber")]
    AlreadySubscribed,

    #[error("no file to watch")]
    NoPath,
}

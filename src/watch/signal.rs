//! Change signal sources.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;

use super::WatchError;

/// Kind of change reported by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Write,
    Create,
    Other,
}

/// One item on a subscription queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    Changed(ChangeKind),
    /// Non-fatal error reported by the underlying watcher.
    Error(String),
}

/// Live subscription. Dropping it releases the underlying watch.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SignalEvent>,
    guard: Option<Box<dyn Send>>,
}

impl Subscription {
    /// Subscription whose resources are kept alive by `guard`.
    pub fn new(events: mpsc::UnboundedReceiver<SignalEvent>, guard: Option<Box<dyn Send>>) -> Self {
        Self { events, guard }
    }

    pub(crate) fn into_parts(self) -> (mpsc::UnboundedReceiver<SignalEvent>, Option<Box<dyn Send>>) {
        (self.events, self.guard)
    }
}

/// Something that can report changes to a path.
pub trait ChangeSignal: Send + Sync {
    fn subscribe(&self, path: &Path) -> Result<Subscription, WatchError>;
}

/// File system notifications via `notify`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSignal;

impl FileSignal {
    pub fn new() -> Self {
        Self
    }
}

fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Modify(ModifyKind::Name(_)) => {
            ChangeKind::Other
        }
        EventKind::Modify(_) => ChangeKind::Write,
        _ => ChangeKind::Other,
    }
}

impl ChangeSignal for FileSignal {
    fn subscribe(&self, path: &Path) -> Result<Subscription, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => SignalEvent::Changed(classify(&event.kind)),
                Err(e) => SignalEvent::Error(e.to_string()),
            };
            let _ = tx.send(event);
        })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = ?path, "File signal subscribed");

        let guard: Box<RecommendedWatcher> = Box::new(watcher);
        Ok(Subscription::new(rx, Some(guard)))
    }
}

/// In-process signal driven through a [`SignalSender`].
///
/// Supports a single subscriber.
pub struct ChannelSignal {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<SignalEvent>>>,
}

/// Sending half of a [`ChannelSignal`]. Dropping every sender closes the signal.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<SignalEvent>,
}

impl ChannelSignal {
    pub fn new() -> (Self, SignalSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signal = Self {
            receiver: Mutex::new(Some(rx)),
        };
        (signal, SignalSender { tx })
    }
}

impl ChangeSignal for ChannelSignal {
    fn subscribe(&self, _path: &Path) -> Result<Subscription, WatchError> {
        let rx = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(WatchError::AlreadySubscribed)?;
        Ok(Subscription::new(rx, None))
    }
}

impl SignalSender {
    /// Returns false once the subscriber is gone.
    pub fn send(&self, event: SignalEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn write(&self) -> bool {
        self.send(SignalEvent::Changed(ChangeKind::Write))
    }

    pub fn create(&self) -> bool {
        self.send(SignalEvent::Changed(ChangeKind::Create))
    }
}

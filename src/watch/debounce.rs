//! Debounce loop and watcher lifecycle.
//!
//! # States
//! ```text
//! Idle ──start()──▶ Running ──stop() / queue closed──▶ Stopped
//! ```
//! A stopped watcher cannot be started again.

use std::future::pending;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::lifecycle::Shutdown;
use crate::observability::metrics;

use super::signal::{ChangeKind, ChangeSignal, FileSignal, SignalEvent};
use super::WatchError;

/// Quiet period used when a zero debounce is requested.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle state of a [`Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Running,
    Stopped,
}

/// Collapses bursts of change signals for one path into single notifications.
pub struct Watcher {
    path: PathBuf,
    debounce: Duration,
    signal: Arc<dyn ChangeSignal>,
    callbacks: Arc<Mutex<Vec<Callback>>>,
    state: WatcherState,
    /// Cleared by `stop()` or when the loop exits; checked before every firing.
    active: Arc<AtomicBool>,
    shutdown: Shutdown,
    guard: Option<Box<dyn Send>>,
    task: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Watch a file through the file system.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> Self {
        Self::with_signal(path, debounce, Arc::new(FileSignal::new()))
    }

    /// Watch `path` through a custom signal.
    pub fn with_signal(path: impl AsRef<Path>, debounce: Duration, signal: Arc<dyn ChangeSignal>) -> Self {
        let debounce = if debounce.is_zero() { DEFAULT_DEBOUNCE } else { debounce };
        Self {
            path: path.as_ref().to_path_buf(),
            debounce,
            signal,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            state: WatcherState::Idle,
            active: Arc::new(AtomicBool::new(false)),
            shutdown: Shutdown::new(),
            guard: None,
            task: None,
        }
    }

    /// Register a callback fired once per quiet period that saw a change.
    ///
    /// Callbacks run on the watcher's background task.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Subscribe to the signal and spawn the debounce loop.
    ///
    /// # Errors
    ///
    /// Fails without changing state if the subscription cannot be made or no
    /// tokio runtime is available.
    pub fn start(&mut self) -> Result<(), WatchError> {
        match self.state {
            WatcherState::Running => return Err(WatchError::AlreadyRunning),
            WatcherState::Stopped => return Err(WatchError::Terminated),
            WatcherState::Idle => {}
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;

        let subscription = self.signal.subscribe(&self.path)?;
        let (events, guard) = subscription.into_parts();

        self.active.store(true, Ordering::SeqCst);
        let debounce_loop = DebounceLoop {
            events,
            shutdown: self.shutdown.subscribe(),
            callbacks: Arc::clone(&self.callbacks),
            active: Arc::clone(&self.active),
            debounce: self.debounce,
        };
        self.task = Some(runtime.spawn(debounce_loop.run()));
        self.guard = guard;
        self.state = WatcherState::Running;

        tracing::info!(path = ?self.path, debounce_ms = self.debounce.as_millis() as u64, "Watcher started");
        Ok(())
    }

    /// Cancel any pending notification and release the subscription.
    ///
    /// Does not wait for the background task. A callback already running may
    /// finish, but no new one starts after this returns.
    pub fn stop(&mut self) {
        if self.state != WatcherState::Running {
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        self.shutdown.trigger();
        self.guard = None;
        self.state = WatcherState::Stopped;
        tracing::info!(path = ?self.path, "Watcher stopped");
    }

    /// Current state. A loop that ended because its queue closed reports `Stopped`.
    pub fn state(&self) -> WatcherState {
        match self.state {
            WatcherState::Running if !self.active.load(Ordering::SeqCst) => WatcherState::Stopped,
            state => state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == WatcherState::Running
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Wait for the background task to exit.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

struct DebounceLoop {
    events: mpsc::UnboundedReceiver<SignalEvent>,
    shutdown: broadcast::Receiver<()>,
    callbacks: Arc<Mutex<Vec<Callback>>>,
    active: Arc<AtomicBool>,
    debounce: Duration,
}

impl DebounceLoop {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;

        loop {
            let expiry = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                _ = self.shutdown.recv() => {
                    tracing::debug!("Debounce loop received shutdown signal, exiting loop");
                    break;
                }
                event = self.events.recv() => match event {
                    None => {
                        tracing::warn!("Change signal closed, watcher exiting");
                        break;
                    }
                    Some(SignalEvent::Changed(kind @ (ChangeKind::Write | ChangeKind::Create))) => {
                        metrics::record_watch_event(kind);
                        tracing::debug!(?kind, "Change signal received, debounce reset");
                        deadline = Some(Instant::now() + self.debounce);
                    }
                    Some(SignalEvent::Changed(kind)) => {
                        metrics::record_watch_event(kind);
                    }
                    Some(SignalEvent::Error(e)) => {
                        tracing::warn!(error = %e, "Change signal error ignored");
                    }
                },
                _ = expiry => {
                    deadline = None;
                    self.fire();
                }
            }
        }
    }

    fn fire(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        metrics::record_notification();
        tracing::debug!(callbacks = callbacks.len(), "Quiet period elapsed, notifying");
        for callback in callbacks {
            callback();
        }
    }
}

impl Drop for DebounceLoop {
    // Also runs when a callback panics and unwinds the task.
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::signal::{ChannelSignal, SignalSender};
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn watcher(debounce_ms: u64) -> (Watcher, SignalSender, Arc<AtomicUsize>) {
        let (signal, sender) = ChannelSignal::new();
        let watcher = Watcher::with_signal("config.yaml", Duration::from_millis(debounce_ms), Arc::new(signal));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        watcher.on_change(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (watcher, sender, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once() {
        let (mut watcher, sender, calls) = watcher(300);
        watcher.start().unwrap();

        for _ in 0..5 {
            sender.write();
            sleep(Duration::from_millis(50)).await;
        }
        sleep(Duration::from_millis(1000)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_signals_fire_each() {
        let (mut watcher, sender, calls) = watcher(100);
        watcher.start().unwrap();

        for _ in 0..3 {
            sender.create();
            sleep(Duration::from_millis(250)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_before_quiet_period() {
        let (mut watcher, sender, calls) = watcher(300);
        watcher.start().unwrap();

        sender.write();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        sender.write();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_events_and_errors_ignored() {
        let (mut watcher, sender, calls) = watcher(100);
        watcher.start().unwrap();

        sender.send(SignalEvent::Changed(ChangeKind::Other));
        sender.send(SignalEvent::Error("transient".into()));
        sleep(Duration::from_millis(500)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(watcher.is_running());
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_callbacks_in_registration_order() {
        let (signal, sender) = ChannelSignal::new();
        let mut watcher = Watcher::with_signal("x", Duration::from_millis(50), Arc::new(signal));
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            watcher.on_change(move || order.lock().unwrap().push(i));
        }
        watcher.start().unwrap();

        sender.write();
        sleep(Duration::from_millis(200)).await;

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending() {
        let (mut watcher, sender, calls) = watcher(300);
        watcher.start().unwrap();

        sender.write();
        sleep(Duration::from_millis(100)).await;
        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Stopped);

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        watcher.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_signal_ends_running() {
        let (mut watcher, sender, _calls) = watcher(100);
        watcher.start().unwrap();
        assert!(watcher.is_running());

        drop(sender);
        watcher.join().await;
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let (mut watcher, _sender, _calls) = watcher(100);
        watcher.start().unwrap();
        assert!(matches!(watcher.start(), Err(WatchError::AlreadyRunning)));
        watcher.stop();
        watcher.stop();
        assert!(matches!(watcher.start(), Err(WatchError::Terminated)));
    }

    #[test]
    fn test_start_without_runtime() {
        let (mut watcher, _sender, _calls) = watcher(100);
        assert!(matches!(watcher.start(), Err(WatchError::NoRuntime)));
        assert_eq!(watcher.state(), WatcherState::Idle);
    }

    #[test]
    fn test_zero_debounce_uses_default() {
        let (signal, _sender) = ChannelSignal::new();
        let watcher = Watcher::with_signal("x", Duration::ZERO, Arc::new(signal));
        assert_eq!(watcher.debounce(), DEFAULT_DEBOUNCE);
    }

    #[tokio::test]
    async fn test_failed_subscribe_stays_idle() {
        let (signal, _sender) = ChannelSignal::new();
        let signal = Arc::new(signal);
        let _first = signal.subscribe(Path::new("x")).unwrap();

        let mut watcher = Watcher::with_signal("x", Duration::from_millis(10), signal);
        assert!(matches!(watcher.start(), Err(WatchError::AlreadySubscribed)));
        assert_eq!(watcher.state(), WatcherState::Idle);
    }
}

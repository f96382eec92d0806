//! Hot reload: a debounced file watcher driving [`Config::reload`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::error::ConfigResult;
use crate::config::store::Config;
use crate::watch::{ChangeSignal, FileSignal, WatchError, Watcher, WatcherState};

/// Running hot reload for one [`Config`]. Dropping it stops watching.
pub struct HotReload {
    watcher: Watcher,
}

impl HotReload {
    /// Stop watching. Pending changes are discarded.
    pub fn stop(&mut self) {
        self.watcher.stop();
    }

    pub fn state(&self) -> WatcherState {
        self.watcher.state()
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_running()
    }

    pub fn path(&self) -> &Path {
        self.watcher.path()
    }

    /// Wait until the background task has exited.
    pub async fn join(&mut self) {
        self.watcher.join().await;
    }
}

impl Config {
    /// Reload whenever the watched file changes, then run change handlers.
    ///
    /// Reloads run on the watcher task. Prefer a multi-thread runtime: on a
    /// current-thread runtime a slow source stalls every other task until it
    /// returns.
    ///
    /// Watches the last file source registered on the builder. A failed
    /// reload is logged and the current snapshot stays published; handlers
    /// only run after a successful reload.
    ///
    /// # Errors
    ///
    /// [`WatchError::NoPath`] if no file source was registered, or any error
    /// from starting the watcher.
    pub fn watch(self: &Arc<Self>, debounce: Duration) -> Result<HotReload, WatchError> {
        self.watch_with_signal(debounce, Arc::new(FileSignal::new()))
    }

    /// Like [`Config::watch`] with a custom change signal.
    pub fn watch_with_signal(
        self: &Arc<Self>,
        debounce: Duration,
        signal: Arc<dyn ChangeSignal>,
    ) -> Result<HotReload, WatchError> {
        let path = self.watch_path().ok_or(WatchError::NoPath)?.to_path_buf();
        let mut watcher = Watcher::with_signal(&path, debounce, signal);

        let config = Arc::clone(self);
        watcher.on_change(move || match reload_blocking(&config) {
            Ok(()) => config.notify_change(),
            Err(e) => tracing::warn!(error = %e, "Hot reload skipped, keeping current configuration"),
        });
        watcher.start()?;

        tracing::info!(path = ?path, "Hot reload enabled");
        Ok(HotReload { watcher })
    }
}

/// Sources do blocking I/O. A multi-thread runtime hands the worker off
/// first; a current-thread runtime reloads inline.
fn reload_blocking(config: &Config) -> ConfigResult<()> {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| config.reload()),
        _ => config.reload(),
    }
}

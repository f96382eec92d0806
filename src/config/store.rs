//! The merged configuration store.
//!
//! # Concurrency
//! - The flat map lives behind an `ArcSwap`: readers load the current
//!   snapshot without blocking, reload builds a new map off to the side and
//!   publishes it with a single pointer swap
//! - Change handlers sit behind their own mutex, separate from the data
//! - Sources are never called while any lock is held

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::config::error::ConfigResult;
use crate::config::loader::{merge_sources, ConfigBuilder};
use crate::observability::metrics;
use crate::source::Source;
use crate::value::{unflatten, FlatMap, Table, Value};

type ChangeHandler = Arc<dyn Fn(&Config) + Send + Sync>;

/// Layered configuration merged from an ordered list of sources.
pub struct Config {
    data: ArcSwap<FlatMap>,
    sources: Vec<Box<dyn Source>>,
    handlers: Mutex<Vec<ChangeHandler>>,
    watch_path: Option<PathBuf>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub(crate) fn from_parts(sources: Vec<Box<dyn Source>>, watch_path: Option<PathBuf>) -> Self {
        Self {
            data: ArcSwap::from_pointee(FlatMap::new()),
            sources,
            handlers: Mutex::new(Vec::new()),
            watch_path,
        }
    }

    /// Re-read every source and publish the merged result.
    ///
    /// # Errors
    ///
    /// Returns the failing source's error unchanged. The previously published
    /// snapshot stays in place.
    pub fn reload(&self) -> ConfigResult<()> {
        let started = Instant::now();
        let merged = match merge_sources(&self.sources) {
            Ok(merged) => merged,
            Err(e) => {
                metrics::record_reload("error", started.elapsed());
                tracing::error!(source = %e.source_name(), error = %e, "Config reload failed, keeping current snapshot");
                return Err(e.into());
            }
        };

        let keys = merged.len();
        self.data.store(Arc::new(merged));

        metrics::record_reload("ok", started.elapsed());
        metrics::record_key_count(keys);
        tracing::info!(sources = self.sources.len(), keys, "Configuration loaded");
        Ok(())
    }

    /// Independent copy of the current flat map.
    pub fn snapshot(&self) -> FlatMap {
        self.data.load().as_ref().clone()
    }

    /// Shared handle to the current snapshot, without copying.
    pub fn current(&self) -> Arc<FlatMap> {
        self.data.load_full()
    }

    /// Nested view of the current snapshot.
    pub fn tree(&self) -> Table {
        unflatten(&self.data.load())
    }

    /// Raw stored value for a key.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.data.load().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.load().contains_key(key)
    }

    /// Register a handler run after each successful watcher-driven reload.
    ///
    /// Handlers run in registration order on the watcher's background task.
    pub fn on_change<F>(&self, handler: F)
    where
        F: Fn(&Config) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    pub(crate) fn notify_change(&self) {
        // Copy out so handlers may register more handlers without deadlocking.
        let handlers: Vec<ChangeHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler(self);
        }
    }

    /// Path of the last registered file source.
    pub fn watch_path(&self) -> Option<&Path> {
        self.watch_path.as_deref()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("Config")
            .field("sources", &names)
            .field("keys", &self.data.load().len())
            .field("watch_path", &self.watch_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{EnvSource, SourceError};
    use crate::table;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_reload_publishes_merge() {
        let config = Config::builder()
            .with_defaults(table! { "server.host" => "default", "server.port" => 3000 })
            .with_defaults(table! { "server.port" => 8080 })
            .with_source(EnvSource::from_vars("APP", [("APP_SERVER_HOST", "envhost")]))
            .build();
        config.reload().unwrap();

        let snapshot = config.snapshot();
        assert_eq!(snapshot.get("server.host"), Some(&Value::from("envhost")));
        assert_eq!(snapshot.get("server.port"), Some(&Value::Integer(8080)));
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let fail = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fail);
        let config = Config::builder()
            .with_defaults(table! { "a" => 1 })
            .with_source(move || {
                if flag.load(Ordering::SeqCst) {
                    Err(SourceError::Other {
                        source_name: "flaky".into(),
                        error: "gone".into(),
                    })
                } else {
                    Ok(table! { "b" => 2 })
                }
            })
            .build();

        config.reload().unwrap();
        let before = config.snapshot();

        fail.store(true, Ordering::SeqCst);
        let err = config.reload().unwrap_err();
        assert!(matches!(err, crate::ConfigError::Source(SourceError::Other { .. })));
        assert_eq!(config.snapshot(), before);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let config = Config::builder().with_defaults(table! { "a" => 1 }).build();
        config.reload().unwrap();

        let mut copy = config.snapshot();
        copy.insert("a".into(), Value::Integer(99));
        copy.insert("b".into(), Value::Integer(2));

        assert_eq!(config.value("a"), Some(Value::Integer(1)));
        assert!(!config.contains("b"));
    }

    #[test]
    fn test_tree_view() {
        let config = Config::builder()
            .with_defaults(table! { "server.host" => "h", "server.port" => 1 })
            .build();
        config.reload().unwrap();

        let tree = config.tree();
        let server = tree.get("server").and_then(Value::as_map).unwrap();
        assert_eq!(server.get("host"), Some(&Value::from("h")));
    }

    #[test]
    fn test_handlers_run_in_order() {
        let config = Config::builder().build();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            config.on_change(move |_| order.lock().unwrap().push(i));
        }
        config.notify_change();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_handler_may_register_handler() {
        let config = Arc::new(Config::builder().build());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        config.on_change(move |c| {
            counter.fetch_add(1, Ordering::SeqCst);
            c.on_change(|_| {});
        });
        config.notify_change();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let config = Arc::new(
            Config::builder()
                .with_defaults(table! { "a" => 1, "b" => 1 })
                .build(),
        );
        config.reload().unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let config = Arc::clone(&config);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let snap = config.current();
                        assert_eq!(snap.get("a"), snap.get("b"));
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            config.reload().unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }
}

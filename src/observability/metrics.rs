//! Metrics emitted by the store and watchers.
//!
//! # Metrics
//! - `layerconf_reloads_total` (counter): reloads by `outcome` (`ok` / `error`)
//! - `layerconf_reload_duration_seconds` (histogram): time spent merging sources
//! - `layerconf_reload_keys` (gauge): keys in the last published snapshot
//! - `layerconf_watch_events_total` (counter): change signals by `kind`
//! - `layerconf_watch_notifications_total` (counter): debounced notifications fired
//! - `layerconf_validation_failures_total` (counter): individual rule violations

use std::time::Duration;

use crate::watch::ChangeKind;

pub fn record_reload(outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("layerconf_reloads_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("layerconf_reload_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_key_count(keys: usize) {
    ::metrics::gauge!("layerconf_reload_keys").set(keys as f64);
}

pub fn record_watch_event(kind: ChangeKind) {
    let kind = match kind {
        ChangeKind::Write => "write",
        ChangeKind::Create => "create",
        ChangeKind::Other => "other",
    };
    ::metrics::counter!("layerconf_watch_events_total", "kind" => kind).increment(1);
}

pub fn record_notification() {
    ::metrics::counter!("layerconf_watch_notifications_total").increment(1);
}

pub fn record_validation_failures(count: usize) {
    ::metrics::counter!("layerconf_validation_failures_total").increment(count as u64);
}

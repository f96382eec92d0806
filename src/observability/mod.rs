//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! store.rs (reload), validation.rs, watch loop
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing a subscriber or recorder is the
//!   binary's job
//! - Metrics are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

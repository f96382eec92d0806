//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber for the binary
//! - Pick the log level from `RUST_LOG`, falling back to the CLI level
//!
//! # Design Decisions
//! - JSON output for machine parsing, plain text for terminals
//! - Installing twice is not an error; the second call is ignored

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `level` is any `EnvFilter` directive, e.g. `info` or `layerconf=debug`.
pub fn init(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("warn", false);
        init("debug", true);
        tracing::info!("still logging");
    }
}

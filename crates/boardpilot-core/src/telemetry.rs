//! Centralised tracing initialisation for boardpilot binaries.
//!
//! Call [`init_tracing`] once at program start. Safe to call more than once;
//! only the first call takes effect (the global subscriber can only be set
//! once per process).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `verbose` — default to DEBUG instead of INFO when `RUST_LOG` is unset.
/// * `json` — emit newline-delimited JSON log lines for aggregation
///   pipelines.
pub fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

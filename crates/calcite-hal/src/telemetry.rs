//! `tracing` subscriber initialisation for control-loop processes.
//!
//! The caching layer emits `trace!` events for every forwarded write and
//! `warn!` events for failed writes and clamped thresholds.  Call
//! [`init_tracing`] once at startup to see them.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`); use `calcite_hal=trace` to see every forwarded write. |
//! | `CALCITE_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is left in place.
pub fn init_tracing() -> bool {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if use_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
            .is_ok()
    }
}

fn use_json() -> bool {
    std::env::var("CALCITE_LOG_FORMAT").as_deref() == Ok("json")
}

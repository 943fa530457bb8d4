//! Email intake service: validates a captured email and its campaign source, verifies the
//! address with a vendor, records an audit row, and hands accepted addresses to the
//! marketing platform and the configured webhooks.

pub mod app;
pub mod category;
pub mod clients;
pub mod config;
mod error;
pub mod utils;
pub mod web;

#[cfg(test)]
mod test_utils;

pub use app::{App, AppState};
pub use error::{Error, Result};
pub use web::serve;

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Human readable logs for development, `RUST_LOG` overrides the `debug` default.
pub fn init_dbg_tracing() {
    tracing_subscriber::fmt()
        .without_time()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(env_filter("debug"))
        .compact()
        .init();
}

/// JSON logs for production, `RUST_LOG` overrides the `info` default.
pub fn init_production_tracing() {
    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_env_filter(env_filter("info"))
        .init();
}

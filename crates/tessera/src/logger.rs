//! # Logging
//!
//! Installs a `tracing-subscriber` fmt subscriber. `RUST_LOG` wins when set;
//! otherwise the configured filter applies.

use tracing_subscriber::fmt::time;
use tracing_subscriber::EnvFilter;

use crate::HeadlessError;

/// Installs the global subscriber. Call once, early.
///
/// # Errors
///
/// [`HeadlessError::Logger`] if `default_filter` does not parse or a
/// subscriber is already installed.
pub fn init(default_filter: &str) -> Result<(), HeadlessError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|err| HeadlessError::Logger(format!("bad filter {default_filter:?}: {err}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(time::uptime())
        .with_target(true)
        .try_init()
        .map_err(|err| HeadlessError::Logger(err.to_string()))
}

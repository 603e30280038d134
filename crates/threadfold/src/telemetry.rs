//! JSON structured logging bootstrap.
//!
//! Installs a global `tracing-subscriber` formatter emitting one JSON object
//! per event. The filter comes from `THREADFOLD_LOG` (same syntax as
//! `RUST_LOG`) and defaults to `info`.

use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "THREADFOLD_LOG";
const DEFAULT_FILTER: &str = "info";

/// Install the JSON subscriber as the global default.
///
/// # Errors
///
/// Returns [`Error::Telemetry`] if a global subscriber is already set.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .try_init()
        .map_err(|err| Error::Telemetry(err.to_string()))
}

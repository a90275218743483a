//! Logging setup for the `tally` binary.
//!
//! Libraries only emit `tracing` events; this is the one place a subscriber is
//! installed. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};

const DEFAULT_FILTER: &str = "tally=info,tally_storage=info,warn";

/// Install the global subscriber. Logs go to stderr so stdout stays parseable.
pub fn init_logging(json: bool) -> CliResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| CliError::Telemetry(e.to_string()))?;

    tracing::debug!(json, "Logging initialized");
    Ok(())
}

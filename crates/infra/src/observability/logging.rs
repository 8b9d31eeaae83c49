//! Structured logging setup for hosts embedding the core
//!
//! Filter directives come from `FINSYNC_LOG`, then `RUST_LOG`, defaulting to
//! `info`. Spans emitted by the core carry the provider id, so JSON output is
//! enough to follow one provider's sync across a batch.

use finsync_domain::{FinSyncError, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FINSYNC_LOG";
const DEFAULT_DIRECTIVES: &str = "info";

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber.
///
/// Fails when a subscriber is already installed or the directives are invalid.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.map_err(|e| FinSyncError::Config(format!("cannot install tracing subscriber: {e}")))
}

fn env_filter() -> Result<EnvFilter> {
    let directives = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|_| DEFAULT_DIRECTIVES.to_string());
    EnvFilter::try_new(&directives)
        .map_err(|e| FinSyncError::Config(format!("invalid log filter '{directives}': {e}")))
}

//! Structured logging setup on `tracing`.
//!
//! Configured from the environment: `PLANPILOT_LOG` carries an env-filter
//! directive (default `info`), `PLANPILOT_LOG_FORMAT` selects `text` or
//! `json` output. Everything goes to stdout with UTC timestamps.

use crate::error::PlanError;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_env("PLANPILOT_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

fn determine_format() -> Result<String, PlanError> {
    let format = std::env::var("PLANPILOT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    if format != "json" && format != "text" {
        return Err(PlanError::Config(format!(
            "invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format)
}

/// Initialize the global subscriber. Call once at process startup.
pub fn init_logging() -> Result<(), PlanError> {
    let filter = build_env_filter();
    let format = determine_format()?;

    let base = Registry::default().with(filter);
    if format == "json" {
        base.with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(std::io::stdout),
        )
        .init();
    } else {
        base.with(
            fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(std::io::stdout),
        )
        .init();
    }

    Ok(())
}

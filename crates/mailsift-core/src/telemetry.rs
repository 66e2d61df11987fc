use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

use crate::config::AppConfig;

static INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to set tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Initialize structured logging driven by `RUST_LOG` (default `info`).
/// JSON lines are emitted outside of `dev`; pretty output otherwise.
/// Calling this more than once is a no-op.
pub fn init_logging(app: &AppConfig) -> Result<(), TelemetryError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let env_filter = build_filter()?;
    let json_format = !app.env.eq_ignore_ascii_case("dev");

    let result = if json_format {
        Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            )
            .try_init()
    } else {
        Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    result.map_err(|err| TelemetryError::SubscriberInit(err.to_string()))?;
    let _ = INITIALIZED.set(());
    tracing::debug!(service = %app.service_name, env = %app.env, "logging initialized");
    Ok(())
}

fn build_filter() -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| TelemetryError::SubscriberInit(err.to_string()))
}

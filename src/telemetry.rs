use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging. `RUST_LOG` takes precedence over the
/// configured level. Logs go to stderr so command output on stdout stays clean.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("runbook telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the log lines of one request
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span carrying the common attributes of an API request
pub fn create_request_span(method: &str, path: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "api_request",
        http.method = method,
        http.path = path,
        correlation.id = correlation_id,
        caller = tracing::field::Empty,
    )
}

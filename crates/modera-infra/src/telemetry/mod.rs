//! Tracing subscriber initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "modera=debug,tower_http=debug";

#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub json: bool,
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_telemetry(options: &TelemetryOptions) -> Result<(), Box<dyn std::error::Error>> {
    let registry = tracing_subscriber::registry().with(env_filter());

    if options.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    tracing::info!(
        service = %options.service_name,
        version = %options.service_version,
        environment = %options.environment,
        host = %host,
        "Telemetry initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

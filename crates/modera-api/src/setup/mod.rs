//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use modera_core::Config;
use modera_infra::TelemetryOptions;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    modera_infra::init_telemetry(&TelemetryOptions {
        service_name: env!("CARGO_PKG_NAME").to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        environment: config.server.environment.clone(),
        json: config.server.json_logs(),
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        storage_backend = %config.storage.backend,
        upload_bucket = %config.storage.upload_bucket,
        results_bucket = %config.storage.results_bucket,
        "Configuration loaded and validated successfully"
    );

    let pool = match config.database.url.as_deref() {
        Some(url) => Some(database::setup_database(&config.database, url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, verdicts are stored in the results bucket only");
            None
        }
    };

    let state = services::initialize_services(&config, pool).await?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}

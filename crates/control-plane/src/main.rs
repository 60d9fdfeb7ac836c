use anyhow::{Context, Result};
use teamdeploy_control_plane::{
    DeploymentService, PendingTierService, ReconcileWorker, WorkerConfig,
};
use teamdeploy_core::telemetry::{init_telemetry, TelemetryConfig};
use teamdeploy_storage::StorageBackend;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Configure via environment variables:
    // - SERVICE_NAME: Service name (default: "teamdeploy-worker")
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "teamdeploy_control_plane=info")
    // - LOG_FORMAT: "json" for structured output
    let mut telemetry_config = TelemetryConfig::from_env();
    if telemetry_config.service_name == "teamdeploy" {
        telemetry_config.service_name = "teamdeploy-worker".to_string();
    }
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter =
            Some("teamdeploy_control_plane=info,teamdeploy_storage=info".to_string());
    }
    init_telemetry(telemetry_config);

    tracing::info!("teamdeploy-worker starting...");

    let config = WorkerConfig::from_env();

    let backend = match &config.database_url {
        Some(url) => StorageBackend::postgres(url)
            .await
            .context("Failed to connect to database")?,
        None => {
            tracing::warn!("DATABASE_URL not set, running in dev mode with in-memory storage");
            StorageBackend::in_memory()
        }
    };

    let stores = backend.stores();
    let deployments = DeploymentService::new(stores.clone(), config.deploy.clone());
    let tiers = PendingTierService::new(stores.billing, deployments);
    let worker = ReconcileWorker::new(tiers, config.reconcile_interval);

    tracing::info!(
        dev_mode = backend.is_dev_mode(),
        interval_secs = config.reconcile_interval.as_secs(),
        batch_size = config.deploy.schedule_batch_size,
        "Worker configured"
    );

    tokio::select! {
        _ = worker.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    tracing::info!("Worker shutdown complete");
    Ok(())
}

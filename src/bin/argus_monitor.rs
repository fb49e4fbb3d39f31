//! Process entry point: loads configuration, builds the shared service
//! bundle, and runs the tenant scheduler and retention janitor until a
//! shutdown signal arrives.

use anyhow::Result;
use argus_monitor_core::retention::Retention;
use argus_monitor_core::{Config, Scheduler, Services};
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env()?;

    info!("[startup] AI DevOps Monitor");
    info!("[config] Prometheus: {}", config.metrics_source.url);
    info!("[config] batch interval: {} min", config.batch.interval_minutes);
    info!(
        "[config] store: {}",
        if cfg!(feature = "mongodb-store") { "mongodb" } else { "in-memory" }
    );

    let services = Services::build(config).await?;

    let scheduler = Scheduler::new(services.clone());
    let retention = Retention::new(services.clone());

    let (scheduler_shutdown_tx, scheduler_shutdown_rx) = tokio::sync::oneshot::channel();
    let (retention_shutdown_tx, retention_shutdown_rx) = tokio::sync::oneshot::channel();

    let scheduler_task = tokio::spawn(scheduler.run(scheduler_shutdown_rx));
    let retention_task = tokio::spawn(retention.run(retention_shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("[shutdown] signal received, stopping");

    let _ = scheduler_shutdown_tx.send(());
    let _ = retention_shutdown_tx.send(());

    let _ = scheduler_task.await;
    let _ = retention_task.await;

    info!("[shutdown] complete");
    Ok(())
}

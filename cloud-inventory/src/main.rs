use std::sync::Arc;
use std::time::Duration;

use cloud_inventory::config::InventoryConfig;
use cloud_inventory::database;
use cloud_inventory::logging::{self, LoggingSettings};
use cloud_inventory::scheduler::Scheduler;
use cloud_inventory::services::Bootstrap;
use cloud_inventory::task::{MemoryQueue, TaskQueue};

/// How often the in-process queue is drained.
const DRAIN_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = InventoryConfig::from_env()?;
    let _log_guard = logging::init_logging(&LoggingSettings::from_config(&config))?;

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let queue = Arc::new(MemoryQueue::new());
    let mut bootstrap =
        Bootstrap::new(pool, queue.clone() as Arc<dyn TaskQueue>).configure(&config);
    bootstrap.with_linker()?;
    bootstrap.with_housekeeper()?;
    let container = bootstrap.build()?;

    let cancel = container.cancellation_token();
    let scheduler = Arc::new(Scheduler::from_config(container.queue.clone(), &config));
    let scheduler_handles = scheduler.start(cancel.clone());

    tracing::info!(
        handlers = ?container.dispatcher.task_types(),
        queue = %config.queue,
        "cloud-inventory started"
    );

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let mut drain_tick = tokio::time::interval(DRAIN_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = drain_tick.tick() => {
                queue.drain(&container.dispatcher, &cancel).await;
            }
        }
    }

    container.shutdown();
    for handle in scheduler_handles {
        let _ = handle.await;
    }
    container.pool.close().await;

    tracing::info!(
        metrics = container.metrics.sample_count(),
        "cloud-inventory stopped"
    );
    Ok(())
}

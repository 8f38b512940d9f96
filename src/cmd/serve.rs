//! Setup and background workers: `worklog init`, `worklog serve`.

use std::path::Path;

use anyhow::{Context, Result};

use worklog::WorklogService;
use worklog::config::{CONFIG_FILE_NAME, WorklogConfig};

pub async fn cmd_init(project_dir: &Path, config: &WorklogConfig) -> Result<()> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        println!("{} already exists at {}", CONFIG_FILE_NAME, config_path.display());
    } else {
        WorklogConfig::default().save(&config_path)?;
        println!("Created {} at {}", CONFIG_FILE_NAME, config_path.display());
    }

    WorklogService::open(config).await?;
    println!("Initialized worklog database at {}", config.store.path.display());
    Ok(())
}

/// Run the store's TTL monitor and the backup sweep until Ctrl-C.
pub async fn cmd_serve(config: &WorklogConfig) -> Result<()> {
    let service = WorklogService::open(config).await?;
    let ttl = service.ttl_monitor().spawn();
    let expiry = service.expiry_coordinator().start();

    tracing::info!(
        db = %config.store.path.display(),
        "Worklog workers running; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown signal received");

    let stats = expiry.stop().await;
    ttl.stop().await;
    super::print_json(&stats)
}

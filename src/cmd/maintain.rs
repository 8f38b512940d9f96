//! Maintenance commands: `worklog sweep`, `worklog stats`.

use anyhow::Result;

use worklog::WorklogService;
use worklog::config::WorklogConfig;

use super::print_json;

pub async fn cmd_sweep(config: &WorklogConfig) -> Result<()> {
    let service = WorklogService::open(config).await?;
    let report = service.sweep_now().await?;
    print_json(&report)
}

pub async fn cmd_stats(config: &WorklogConfig) -> Result<()> {
    let service = WorklogService::open(config).await?;
    let stats = service.get_stats().await?;
    print_json(&stats)
}

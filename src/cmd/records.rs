//! Lifecycle commands: submit, start, complete, latest and sessions.

use anyhow::Result;

use worklog::config::WorklogConfig;
use worklog::records::WorkSubmission;
use worklog::{UserId, WorklogService};

use super::print_json;

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

pub async fn cmd_submit(
    config: &WorklogConfig,
    user: &UserId,
    day: Option<&str>,
    submission: &WorkSubmission,
) -> Result<()> {
    let service = WorklogService::open(config).await?;
    let day = day.map(str::to_string).unwrap_or_else(today);
    let outcome = service.submit(user, &day, submission).await?;
    print_json(&outcome)
}

pub async fn cmd_start(config: &WorklogConfig, user: &UserId, record_id: &str) -> Result<()> {
    let service = WorklogService::open(config).await?;
    let start = service.start_session(user, record_id).await?;
    print_json(&start)
}

pub async fn cmd_complete(
    config: &WorklogConfig,
    user: &UserId,
    session_id: &str,
    answers: &[String],
) -> Result<()> {
    let service = WorklogService::open(config).await?;
    let done = service.complete_session(session_id, user, answers).await?;
    print_json(&done)
}

pub async fn cmd_latest(config: &WorklogConfig, user: &UserId) -> Result<()> {
    let service = WorklogService::open(config).await?;
    let latest = service.get_latest(user).await?;
    print_json(&latest)
}

pub async fn cmd_sessions(
    config: &WorklogConfig,
    user: &UserId,
    session_id: Option<&str>,
    limit: Option<u32>,
    skip: u32,
) -> Result<()> {
    let service = WorklogService::open(config).await?;
    match session_id {
        Some(id) => print_json(&service.get_session(id, user).await?),
        None => print_json(&service.list_sessions(user, limit, skip).await?),
    }
}

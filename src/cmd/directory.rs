//! Trainee directory commands and email-to-user resolution.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use worklog::UserId;
use worklog::config::WorklogConfig;
use worklog::directory::DirectoryClient;

use super::print_json;

/// Who is acting: a user id, or an email resolved through the directory.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct Caller {
    #[arg(short, long)]
    pub user: Option<UserId>,
    /// Resolve the user id from the trainee directory
    #[arg(long)]
    pub email: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum DirectoryCommands {
    /// Show trainee counts by department and batch
    Summary {
        /// Bypass the cached listing
        #[arg(long)]
        refresh: bool,
    },
    /// Resolve an email to an active trainee's user id
    Verify { email: String },
}

fn client(config: &WorklogConfig) -> Result<DirectoryClient> {
    DirectoryClient::from_config(&config.directory)?.context(
        "No trainee directory configured (set [directory] url or WORKLOG_DIRECTORY_URL)",
    )
}

/// The acting user id; an email only resolves to an active entry.
pub async fn resolve_caller(config: &WorklogConfig, caller: &Caller) -> Result<UserId> {
    match (&caller.user, &caller.email) {
        (Some(user), _) => Ok(user.clone()),
        (None, Some(email)) => {
            let identity = client(config)?.resolve_identity(email).await?;
            Ok(identity.user_id)
        }
        (None, None) => anyhow::bail!("Either --user or --email is required"),
    }
}

pub async fn cmd_directory(config: &WorklogConfig, command: DirectoryCommands) -> Result<()> {
    let directory = client(config)?;
    match command {
        DirectoryCommands::Summary { refresh } => {
            if refresh {
                directory.fetch_all(true).await?;
            }
            print_json(&directory.summary().await?)
        }
        DirectoryCommands::Verify { email } => {
            print_json(&directory.resolve_identity(&email).await?)
        }
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use worklog::config::WorklogConfig;
use worklog::records::WorkStatus;
use worklog::telemetry::{self, TelemetryOptions};

mod cmd;

use cmd::{Caller, DirectoryCommands};

#[derive(Parser)]
#[command(name = "worklog")]
#[command(version, about = "Daily work updates with time-bounded follow-up")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Write daily-rotated log files here instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Directory holding worklog.toml (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// SQLite database path. Overrides worklog.toml and WORKLOG_DB_PATH.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create worklog.toml and the database
    Init,
    /// Run passive expiry and the backup sweep until interrupted
    Serve,
    /// Submit a daily work update
    Submit {
        #[command(flatten)]
        caller: Caller,
        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        day: Option<String>,
        #[arg(long)]
        stack: String,
        #[arg(long, default_value = "")]
        task: String,
        #[arg(long)]
        progress: Option<String>,
        #[arg(long)]
        blockers: Option<String>,
        /// working, wfh or leave
        #[arg(long, default_value = "working")]
        status: WorkStatus,
    },
    /// Start a follow-up session for a temporary record
    Start {
        #[command(flatten)]
        caller: Caller,
        #[arg(short, long)]
        record: String,
    },
    /// Answer a follow-up session and finalize its record
    Complete {
        #[command(flatten)]
        caller: Caller,
        #[arg(short, long)]
        session: String,
        /// One per question, in order
        #[arg(short, long = "answer", required = true)]
        answers: Vec<String>,
    },
    /// Run one backup sweep now
    Sweep,
    /// Show record and session counts
    Stats,
    /// Show a user's most recent record across both tiers
    Latest {
        #[command(flatten)]
        caller: Caller,
    },
    /// List a user's follow-up sessions, or show one
    Sessions {
        #[command(flatten)]
        caller: Caller,
        /// Show only this session
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value = "0")]
        skip: u32,
    },
    /// Query the trainee directory
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any problems
    Validate,
    /// Write a default worklog.toml
    Init,
}

impl Cli {
    fn project_dir(&self) -> Result<PathBuf> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to get current directory"),
        }
    }

    /// File, then environment, then flags.
    fn load_config(&self) -> Result<WorklogConfig> {
        let project_dir = self.project_dir()?;
        let mut config = WorklogConfig::load_or_default(&project_dir)?.apply_env();
        if let Some(db) = &self.db {
            config.store.path = db.clone();
        }
        if config.store.path.is_relative() {
            config.store.path = project_dir.join(&config.store.path);
        }
        let problems = config.validate();
        if !problems.is_empty() {
            anyhow::bail!("Invalid configuration:\n  - {}", problems.join("\n  - "));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = telemetry::init(TelemetryOptions {
        verbose: cli.verbose,
        json: cli.json_logs,
        log_dir: cli.log_dir.as_deref(),
    })?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&cli.project_dir()?, &cli.load_config()?).await?,
        Commands::Serve => cmd::cmd_serve(&cli.load_config()?).await?,
        Commands::Submit {
            caller,
            day,
            stack,
            task,
            progress,
            blockers,
            status,
        } => {
            let submission = worklog::records::WorkSubmission {
                stack: stack.clone(),
                task: task.clone(),
                progress: progress.clone(),
                blockers: blockers.clone(),
                status: *status,
            };
            let config = cli.load_config()?;
            let user = cmd::resolve_caller(&config, caller).await?;
            cmd::cmd_submit(&config, &user, day.as_deref(), &submission).await?
        }
        Commands::Start { caller, record } => {
            let config = cli.load_config()?;
            let user = cmd::resolve_caller(&config, caller).await?;
            cmd::cmd_start(&config, &user, record).await?
        }
        Commands::Complete {
            caller,
            session,
            answers,
        } => {
            let config = cli.load_config()?;
            let user = cmd::resolve_caller(&config, caller).await?;
            cmd::cmd_complete(&config, &user, session, answers).await?
        }
        Commands::Sweep => cmd::cmd_sweep(&cli.load_config()?).await?,
        Commands::Stats => cmd::cmd_stats(&cli.load_config()?).await?,
        Commands::Latest { caller } => {
            let config = cli.load_config()?;
            let user = cmd::resolve_caller(&config, caller).await?;
            cmd::cmd_latest(&config, &user).await?
        }
        Commands::Sessions {
            caller,
            id,
            limit,
            skip,
        } => {
            let config = cli.load_config()?;
            let user = cmd::resolve_caller(&config, caller).await?;
            cmd::cmd_sessions(&config, &user, id.as_deref(), *limit, *skip).await?
        }
        Commands::Directory { command } => {
            cmd::cmd_directory(&cli.load_config()?, command.clone()).await?
        }
        Commands::Config { command } => cmd::cmd_config(&cli.project_dir()?, command.clone())?,
    }

    Ok(())
}

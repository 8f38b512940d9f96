//! Configuration for worklog, read from `worklog.toml`.
//!
//! Layering is file → environment → CLI: the file supplies values, the
//! `WORKLOG_*` variables override a few deployment-specific ones, and the
//! binary applies its own flags last.
//!
//! # Configuration File Format
//!
//! ```toml
//! [store]
//! path = ".worklog/worklog.db"
//!
//! [expiry]
//! passive_ttl_secs = 86400
//! backup_threshold_secs = 90000
//! sweep_interval_secs = 3600
//! ttl_monitor_interval_secs = 60
//!
//! [questions]
//! endpoint = "http://localhost:8080/followup-questions"
//! timeout_secs = 30
//!
//! [directory]
//! url = "https://directory.example.com/api/trainees"
//! timeout_secs = 30
//! cache_secs = 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "worklog.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".worklog/worklog.db")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Timing for passive expiry and the backup sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySection {
    /// Age after which the store itself drops a temporary record
    #[serde(default = "default_passive_ttl_secs")]
    pub passive_ttl_secs: u64,
    /// Age after which the backup sweep deletes a temporary record
    #[serde(default = "default_backup_threshold_secs")]
    pub backup_threshold_secs: u64,
    /// Wait between sweep iterations
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Cadence of the store's TTL monitor
    #[serde(default = "default_ttl_monitor_interval_secs")]
    pub ttl_monitor_interval_secs: u64,
}

fn default_passive_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_backup_threshold_secs() -> u64 {
    25 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_ttl_monitor_interval_secs() -> u64 {
    60
}

impl Default for ExpirySection {
    fn default() -> Self {
        Self {
            passive_ttl_secs: default_passive_ttl_secs(),
            backup_threshold_secs: default_backup_threshold_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            ttl_monitor_interval_secs: default_ttl_monitor_interval_secs(),
        }
    }
}

impl ExpirySection {
    pub fn passive_ttl(&self) -> Duration {
        Duration::from_secs(self.passive_ttl_secs)
    }

    pub fn backup_threshold(&self) -> Duration {
        Duration::from_secs(self.backup_threshold_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn ttl_monitor_interval(&self) -> Duration {
        Duration::from_secs(self.ttl_monitor_interval_secs)
    }
}

/// Follow-up question generator. Without an endpoint the offline template
/// generator is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for QuestionsSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Trainee directory used to resolve identities by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_directory_cache_secs")]
    pub cache_secs: u64,
}

fn default_directory_cache_secs() -> u64 {
    300
}

impl Default for DirectorySection {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_http_timeout_secs(),
            cache_secs: default_directory_cache_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorklogConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub expiry: ExpirySection,
    #[serde(default)]
    pub questions: QuestionsSection,
    #[serde(default)]
    pub directory: DirectorySection,
}

impl WorklogConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse worklog.toml")
    }

    /// Load `worklog.toml` from `dir`, falling back to defaults when absent.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize worklog.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `WORKLOG_*` environment overrides.
    pub fn apply_env(mut self) -> Self {
        if let Ok(path) = std::env::var("WORKLOG_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("WORKLOG_QUESTIONS_URL") {
            self.questions.endpoint = Some(url);
        }
        if let Ok(url) = std::env::var("WORKLOG_DIRECTORY_URL") {
            self.directory.url = Some(url);
        }
        if let Ok(key) = std::env::var("WORKLOG_DIRECTORY_API_KEY") {
            self.directory.api_key = Some(key);
        }
        self
    }

    /// Return human-readable problems; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let expiry = &self.expiry;
        if expiry.passive_ttl_secs == 0 {
            problems.push("expiry.passive_ttl_secs must be greater than 0".to_string());
        }
        if expiry.backup_threshold_secs < expiry.passive_ttl_secs {
            problems.push(format!(
                "expiry.backup_threshold_secs ({}) must not be smaller than expiry.passive_ttl_secs ({})",
                expiry.backup_threshold_secs, expiry.passive_ttl_secs
            ));
        }
        if expiry.sweep_interval_secs == 0 {
            problems.push("expiry.sweep_interval_secs must be greater than 0".to_string());
        }
        if expiry.ttl_monitor_interval_secs == 0 {
            problems.push("expiry.ttl_monitor_interval_secs must be greater than 0".to_string());
        }
        if let Some(endpoint) = &self.questions.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            problems.push(format!("questions.endpoint is not an http(s) URL: {}", endpoint));
        }
        if let Some(url) = &self.directory.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            problems.push(format!("directory.url is not an http(s) URL: {}", url));
        }
        problems
    }
}

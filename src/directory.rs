//! Trainee directory client.
//!
//! The directory returns loosely shaped JSON: the list may be bare or wrapped
//! in an envelope, and each field may appear under several spellings. All of
//! that is resolved here, through [`FIELD_ALIASES`] and [`ENVELOPE_KEYS`], so
//! nothing past this module ever sees a raw directory record.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::config::DirectorySection;
use crate::errors::{LifecycleError, LifecycleResult};
use crate::identity::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Email,
    Name,
    Department,
    Batch,
    /// Raw status text, kept for display.
    StatusLabel,
    /// Anything that can decide whether the entry is active.
    Status,
}

/// Accepted spellings per field, in lookup order. The first key present wins.
pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Id, &["id", "Id", "ID", "traineeId", "TraineeId"]),
    (Field::Email, &["email", "Email", "emailAddress", "mail"]),
    (
        Field::Name,
        &["name", "Name", "fullName", "FullName", "trainee_name"],
    ),
    (Field::Department, &["department", "Department"]),
    (Field::Batch, &["batch", "Batch"]),
    (Field::StatusLabel, &["status", "Status", "traineeStatus"]),
    (
        Field::Status,
        &["status", "Status", "isActive", "IsActive", "active", "Active"],
    ),
];

/// Keys under which the directory may wrap its list, in lookup order.
pub const ENVELOPE_KEYS: &[&str] = &["data", "trainees", "result"];

const ACTIVE_WORDS: &[&str] = &["active", "enrolled", "true", "1", "yes"];

fn aliases(field: Field) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

fn lookup<'a>(obj: &'a Map<String, Value>, field: Field) -> Option<&'a Value> {
    aliases(field).iter().find_map(|key| obj.get(*key))
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// First status-like key holding a bool or a string decides; absent means active.
fn parse_active(obj: &Map<String, Value>) -> bool {
    for key in aliases(Field::Status) {
        match obj.get(*key) {
            Some(Value::Bool(b)) => return *b,
            Some(Value::String(s)) => return ACTIVE_WORDS.contains(&s.to_lowercase().as_str()),
            _ => continue,
        }
    }
    true
}

/// Turn `jane.doe_smith@x.com` into `Jane Doe Smith`.
pub fn display_name_from_email(email: &str) -> String {
    let Some((local, _)) = email.split_once('@') else {
        return "Trainee".to_string();
    };
    local
        .replace(['.', '_'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A directory record with every alias resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub email: String,
    pub name: String,
    pub department: String,
    pub batch: String,
    pub status: String,
    pub active: bool,
}

impl DirectoryEntry {
    /// Map one raw record. Non-object values are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let email = text(lookup(obj, Field::Email));
        let name = text(lookup(obj, Field::Name));
        let status = match lookup(obj, Field::StatusLabel) {
            Some(v) => text(Some(v)),
            None => "active".to_string(),
        };
        Some(Self {
            id: text(lookup(obj, Field::Id)),
            name: if name.is_empty() {
                display_name_from_email(&email)
            } else {
                name
            },
            email,
            department: text(lookup(obj, Field::Department)),
            batch: text(lookup(obj, Field::Batch)),
            status,
            active: parse_active(obj),
        })
    }
}

/// Peel off a `data`/`trainees`/`result` envelope if present.
pub fn unwrap_envelope(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            match ENVELOPE_KEYS.iter().find_map(|key| obj.remove(*key)) {
                Some(Value::Array(items)) => items,
                Some(_) => Vec::new(),
                // A bare object is a single record.
                None => vec![Value::Object(obj)],
            }
        }
        _ => Vec::new(),
    }
}

/// An authenticated caller, as handed to the lifecycle core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub email: String,
}

impl VerifiedIdentity {
    pub fn display_name(&self) -> String {
        display_name_from_email(&self.email)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    pub total: usize,
    pub active_count: usize,
    pub departments: BTreeMap<String, usize>,
    pub batches: BTreeMap<String, usize>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DirectorySummary {
    pub fn from_entries(entries: &[DirectoryEntry], last_updated: Option<DateTime<Utc>>) -> Self {
        let mut summary = Self {
            total: entries.len(),
            last_updated,
            ..Self::default()
        };
        for entry in entries {
            if entry.active {
                summary.active_count += 1;
            }
            let bucket = |s: &str| {
                if s.is_empty() {
                    "Unknown".to_string()
                } else {
                    s.to_string()
                }
            };
            *summary.departments.entry(bucket(&entry.department)).or_default() += 1;
            *summary.batches.entry(bucket(&entry.batch)).or_default() += 1;
        }
        summary
    }
}

struct CachedEntries {
    entries: Arc<Vec<DirectoryEntry>>,
    fetched: Instant,
    fetched_at: DateTime<Utc>,
}

pub struct DirectoryClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedEntries>>,
}

impl DirectoryClient {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build directory HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            cache_ttl,
            cache: RwLock::new(None),
        })
    }

    /// `None` when no directory URL is configured.
    pub fn from_config(section: &DirectorySection) -> anyhow::Result<Option<Self>> {
        section
            .url
            .as_ref()
            .map(|url| {
                Self::new(
                    url.clone(),
                    section.api_key.clone(),
                    Duration::from_secs(section.timeout_secs),
                    Duration::from_secs(section.cache_secs),
                )
            })
            .transpose()
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, &self.url)
            .header("Accept", "application/json");
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// POST with an empty JSON body; some deployments only accept GET, so a
    /// 405 retries once with GET.
    async fn fetch_remote(&self) -> anyhow::Result<Vec<DirectoryEntry>> {
        let resp = self
            .request(reqwest::Method::POST)
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Failed to reach trainee directory")?;

        let resp = if resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            tracing::info!("Directory rejected POST, retrying with GET");
            self.request(reqwest::Method::GET)
                .send()
                .await
                .context("Failed to reach trainee directory")?
        } else {
            resp
        };

        let body = resp
            .error_for_status()
            .context("Trainee directory returned error status")?
            .json::<Value>()
            .await
            .context("Failed to parse trainee directory response")?;

        Ok(unwrap_envelope(body)
            .iter()
            .filter_map(DirectoryEntry::from_value)
            .collect())
    }

    /// All entries, served from cache while it is fresh.
    pub async fn fetch_all(&self, force_refresh: bool) -> LifecycleResult<Arc<Vec<DirectoryEntry>>> {
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.fetched.elapsed() < self.cache_ttl
            {
                tracing::debug!("Using cached directory entries");
                return Ok(cached.entries.clone());
            }
        }

        let entries = Arc::new(
            self.fetch_remote()
                .await
                .map_err(|e| LifecycleError::Directory(format!("{:#}", e)))?,
        );
        tracing::info!(count = entries.len(), "Fetched trainee directory");
        *self.cache.write().await = Some(CachedEntries {
            entries: entries.clone(),
            fetched: Instant::now(),
            fetched_at: Utc::now(),
        });
        Ok(entries)
    }

    /// Case-insensitive email match.
    pub async fn find_by_email(&self, email: &str) -> LifecycleResult<Option<DirectoryEntry>> {
        let wanted = email.trim().to_lowercase();
        let entries = self.fetch_all(false).await?;
        Ok(entries
            .iter()
            .find(|e| !e.email.is_empty() && e.email.to_lowercase() == wanted)
            .cloned())
    }

    pub async fn find_by_id(&self, id: &str) -> LifecycleResult<Option<DirectoryEntry>> {
        let entries = self.fetch_all(false).await?;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    /// False for unknown emails as well as inactive entries.
    pub async fn verify_active(&self, email: &str) -> LifecycleResult<bool> {
        Ok(self
            .find_by_email(email)
            .await?
            .is_some_and(|entry| entry.active))
    }

    pub async fn summary(&self) -> LifecycleResult<DirectorySummary> {
        let entries = self.fetch_all(false).await?;
        let fetched_at = self.cache.read().await.as_ref().map(|c| c.fetched_at);
        Ok(DirectorySummary::from_entries(&entries, fetched_at))
    }

    /// Map a signed-in email to the user id the lifecycle core works with.
    pub async fn resolve_identity(&self, email: &str) -> LifecycleResult<VerifiedIdentity> {
        let entry = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| LifecycleError::UnknownTrainee {
                email: email.to_string(),
            })?;
        if !entry.active {
            tracing::warn!(email = %email, "Inactive trainee attempted access");
            return Err(LifecycleError::InactiveTrainee {
                email: email.to_string(),
            });
        }
        if entry.id.is_empty() {
            return Err(LifecycleError::Directory(format!(
                "directory entry for {} has no id",
                email
            )));
        }
        let user_id = UserId::parse(&entry.id)?;
        tracing::info!(user = %user_id, name = %entry.name, "Resolved directory identity");
        Ok(VerifiedIdentity {
            user_id,
            email: entry.email,
        })
    }
}

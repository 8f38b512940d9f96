use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::identity::{UserId, new_record_id};
use crate::records::{
    FollowupSession, PermanentWorkRecord, SessionStatus, TemporaryWorkRecord, WorkFields,
};

pub const TEMP_TABLE: &str = "temp_work_updates";
pub const PERMANENT_TABLE: &str = "daily_records";
pub const SESSIONS_TABLE: &str = "followup_sessions";
pub const PROMOTIONS_TABLE: &str = "promotions";

pub const TEMP_TTL_INDEX: &str = "submitted_at_ttl";
pub const PROMOTIONS_TTL_INDEX: &str = "promoted_at_ttl";

/// Tables and timestamp columns a TTL index may be registered on.
const TTL_ELIGIBLE: &[(&str, &str)] = &[
    (TEMP_TABLE, "submitted_at"),
    (PROMOTIONS_TABLE, "promoted_at"),
];

/// Async-safe handle to the work store.
///
/// Wraps `WorkStore` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, keeping synchronous SQLite I/O
/// off the async worker threads.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<std::sync::Mutex<WorkStore>>,
}

impl StoreHandle {
    pub fn new(store: WorkStore) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(store)),
        }
    }

    /// Run a closure with access to the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&WorkStore) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("Store task panicked")?
    }

    /// Acquire the store synchronously. Only for startup and tests; never
    /// from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, WorkStore>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))
    }
}

/// A registered passive-expiry rule.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TtlIndex {
    pub name: String,
    pub table_name: String,
    pub column_name: String,
    pub expire_after_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlSetup {
    Created,
    Updated,
    Unchanged,
}

/// Row counts per table, for stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub permanent_total: u64,
    pub permanent_followup_completed: u64,
    pub temp_total: u64,
    pub sessions_total: u64,
    pub sessions_pending: u64,
    pub sessions_completed: u64,
}

/// Result of removing one stale temporary record and what referenced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub temp_deleted: bool,
    pub sessions_deleted: usize,
}

/// Outcome of [`WorkStore::complete_session_and_promote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionWrite {
    Promoted { permanent_id: String, overridden: bool },
    /// The temporary record is gone; the session is still pending.
    TempMissing,
    /// The session is missing or no longer pending.
    NotPending,
}

pub struct WorkStore {
    conn: Connection,
}

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in store: {}", raw))?
        .with_timezone(&Utc))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

const TEMP_COLUMNS: &str =
    "id, user_kind, user_key, day, stack, task, progress, blockers, status, submitted_at";

const PERMANENT_COLUMNS: &str = "id, user_kind, user_key, day, stack, task, progress, blockers, status, submitted_at, completed_at, followup_completed";

const SESSION_COLUMNS: &str = "id, user_kind, user_key, temp_record_id, day, questions, answers, status, created_at, completed_at, permanent_record_id";

/// Raw row shared by both work-record tables.
struct WorkRow {
    id: String,
    user_kind: String,
    user_key: String,
    day: String,
    stack: String,
    task: String,
    progress: String,
    blockers: String,
    status: String,
    submitted_at: String,
}

impl WorkRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_kind: row.get(1)?,
            user_key: row.get(2)?,
            day: row.get(3)?,
            stack: row.get(4)?,
            task: row.get(5)?,
            progress: row.get(6)?,
            blockers: row.get(7)?,
            status: row.get(8)?,
            submitted_at: row.get(9)?,
        })
    }

    fn fields(&self) -> Result<WorkFields> {
        Ok(WorkFields {
            stack: self.stack.clone(),
            task: self.task.clone(),
            progress: self.progress.clone(),
            blockers: self.blockers.clone(),
            status: self.status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        })
    }

    fn into_temp(self) -> Result<TemporaryWorkRecord> {
        Ok(TemporaryWorkRecord {
            fields: self.fields()?,
            user: UserId::from_storage(&self.user_kind, &self.user_key)?,
            submitted_at: parse_ts(&self.submitted_at)?,
            id: self.id,
            day: self.day,
        })
    }
}

struct PermanentRow {
    work: WorkRow,
    completed_at: Option<String>,
    followup_completed: bool,
}

impl PermanentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            work: WorkRow::from_row(row)?,
            completed_at: row.get(10)?,
            followup_completed: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<PermanentWorkRecord> {
        let w = self.work;
        Ok(PermanentWorkRecord {
            fields: w.fields()?,
            user: UserId::from_storage(&w.user_kind, &w.user_key)?,
            submitted_at: parse_ts(&w.submitted_at)?,
            completed_at: parse_opt_ts(self.completed_at)?,
            followup_completed: self.followup_completed,
            id: w.id,
            day: w.day,
        })
    }
}

struct SessionRow {
    id: String,
    user_kind: String,
    user_key: String,
    temp_record_id: String,
    day: String,
    questions: String,
    answers: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    permanent_record_id: Option<String>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_kind: row.get(1)?,
            user_key: row.get(2)?,
            temp_record_id: row.get(3)?,
            day: row.get(4)?,
            questions: row.get(5)?,
            answers: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
            completed_at: row.get(9)?,
            permanent_record_id: row.get(10)?,
        })
    }

    fn into_session(self) -> Result<FollowupSession> {
        Ok(FollowupSession {
            user: UserId::from_storage(&self.user_kind, &self.user_key)?,
            questions: serde_json::from_str(&self.questions)
                .context("Invalid questions JSON in session row")?,
            answers: serde_json::from_str(&self.answers)
                .context("Invalid answers JSON in session row")?,
            status: self
                .status
                .parse::<SessionStatus>()
                .map_err(|e| anyhow::anyhow!(e))?,
            created_at: parse_ts(&self.created_at)?,
            completed_at: parse_opt_ts(self.completed_at)?,
            id: self.id,
            temp_record_id: self.temp_record_id,
            day: self.day,
            permanent_record_id: self.permanent_record_id,
        })
    }
}

impl WorkStore {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
            .context("Failed to configure SQLite")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS temp_work_updates (
                    id TEXT PRIMARY KEY,
                    user_kind TEXT NOT NULL,
                    user_key TEXT NOT NULL,
                    day TEXT NOT NULL,
                    stack TEXT NOT NULL,
                    task TEXT NOT NULL,
                    progress TEXT NOT NULL,
                    blockers TEXT NOT NULL,
                    status TEXT NOT NULL,
                    submitted_at TEXT NOT NULL,
                    UNIQUE(user_kind, user_key, day)
                );

                CREATE TABLE IF NOT EXISTS daily_records (
                    id TEXT PRIMARY KEY,
                    user_kind TEXT NOT NULL,
                    user_key TEXT NOT NULL,
                    day TEXT NOT NULL,
                    stack TEXT NOT NULL,
                    task TEXT NOT NULL,
                    progress TEXT NOT NULL,
                    blockers TEXT NOT NULL,
                    status TEXT NOT NULL,
                    submitted_at TEXT NOT NULL,
                    completed_at TEXT,
                    followup_completed INTEGER NOT NULL DEFAULT 0,
                    UNIQUE(user_kind, user_key, day)
                );

                CREATE TABLE IF NOT EXISTS followup_sessions (
                    id TEXT PRIMARY KEY,
                    user_kind TEXT NOT NULL,
                    user_key TEXT NOT NULL,
                    temp_record_id TEXT NOT NULL,
                    day TEXT NOT NULL,
                    questions TEXT NOT NULL DEFAULT '[]',
                    answers TEXT NOT NULL DEFAULT '[]',
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL,
                    completed_at TEXT,
                    permanent_record_id TEXT
                );

                CREATE TABLE IF NOT EXISTS promotions (
                    temp_record_id TEXT PRIMARY KEY,
                    permanent_record_id TEXT NOT NULL,
                    promoted_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS ttl_indexes (
                    name TEXT PRIMARY KEY,
                    table_name TEXT NOT NULL,
                    column_name TEXT NOT NULL,
                    expire_after_secs INTEGER NOT NULL,
                    UNIQUE(table_name, column_name)
                );

                CREATE INDEX IF NOT EXISTS idx_temp_user_submitted
                    ON temp_work_updates(user_kind, user_key, submitted_at);
                CREATE INDEX IF NOT EXISTS idx_temp_submitted ON temp_work_updates(submitted_at);
                CREATE INDEX IF NOT EXISTS idx_daily_user_submitted
                    ON daily_records(user_kind, user_key, submitted_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_user_created
                    ON followup_sessions(user_kind, user_key, created_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_temp ON followup_sessions(temp_record_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_status ON followup_sessions(status);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── TTL registry ──────────────────────────────────────────────────

    /// Register (or retune) passive expiry on `table.column`.
    pub fn ensure_ttl_index(
        &self,
        name: &str,
        table: &str,
        column: &str,
        expire_after_secs: i64,
    ) -> Result<TtlSetup> {
        if !TTL_ELIGIBLE.contains(&(table, column)) {
            anyhow::bail!("TTL index not supported on {}.{}", table, column);
        }
        if expire_after_secs <= 0 {
            anyhow::bail!("TTL expire_after_secs must be positive, got {}", expire_after_secs);
        }
        match self.verify_ttl_index(table, column)? {
            Some(existing) if existing.expire_after_secs == expire_after_secs => {
                Ok(TtlSetup::Unchanged)
            }
            Some(existing) => {
                self.conn
                    .execute(
                        "UPDATE ttl_indexes SET expire_after_secs = ?1 WHERE name = ?2",
                        params![expire_after_secs, existing.name],
                    )
                    .context("Failed to update TTL index")?;
                Ok(TtlSetup::Updated)
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO ttl_indexes (name, table_name, column_name, expire_after_secs)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![name, table, column, expire_after_secs],
                    )
                    .context("Failed to create TTL index")?;
                Ok(TtlSetup::Created)
            }
        }
    }

    /// Look up the TTL rule on `table.column`, if any.
    pub fn verify_ttl_index(&self, table: &str, column: &str) -> Result<Option<TtlIndex>> {
        self.conn
            .query_row(
                "SELECT name, table_name, column_name, expire_after_secs
                 FROM ttl_indexes WHERE table_name = ?1 AND column_name = ?2",
                params![table, column],
                |row| {
                    Ok(TtlIndex {
                        name: row.get(0)?,
                        table_name: row.get(1)?,
                        column_name: row.get(2)?,
                        expire_after_secs: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query TTL index")
    }

    pub fn list_ttl_indexes(&self) -> Result<Vec<TtlIndex>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, table_name, column_name, expire_after_secs
                 FROM ttl_indexes ORDER BY name",
            )
            .context("Failed to prepare list_ttl_indexes")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TtlIndex {
                    name: row.get(0)?,
                    table_name: row.get(1)?,
                    column_name: row.get(2)?,
                    expire_after_secs: row.get(3)?,
                })
            })
            .context("Failed to query TTL indexes")?;
        let mut indexes = Vec::new();
        for row in rows {
            indexes.push(row.context("Failed to read TTL index row")?);
        }
        Ok(indexes)
    }

    pub fn drop_ttl_index(&self, name: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM ttl_indexes WHERE name = ?1", params![name])
            .context("Failed to drop TTL index")?;
        Ok(n > 0)
    }

    /// Delete every row whose TTL column is older than its rule allows.
    /// Returns `(index name, rows removed)` per registered rule.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<(String, usize)>> {
        let mut purged = Vec::new();
        for index in self.list_ttl_indexes()? {
            let (table, column) = TTL_ELIGIBLE
                .iter()
                .find(|(t, c)| *t == index.table_name && *c == index.column_name)
                .copied()
                .with_context(|| {
                    format!(
                        "TTL index {} targets unsupported {}.{}",
                        index.name, index.table_name, index.column_name
                    )
                })?;
            let cutoff = now - chrono::Duration::seconds(index.expire_after_secs);
            let n = self.delete_older_than(table, column, cutoff)?;
            purged.push((index.name, n));
        }
        Ok(purged)
    }

    /// Apply the rule registered on `table`, if any. Reads of TTL-managed
    /// tables go through here first, so an expired row is never returned
    /// whether or not a monitor is running.
    fn expire_table(&self, table: &str) -> Result<usize> {
        let Some((table, column)) = TTL_ELIGIBLE.iter().find(|(t, _)| *t == table).copied()
        else {
            return Ok(0);
        };
        let Some(index) = self.verify_ttl_index(table, column)? else {
            return Ok(0);
        };
        let cutoff = Utc::now() - chrono::Duration::seconds(index.expire_after_secs);
        let n = self.delete_older_than(table, column, cutoff)?;
        if n > 0 {
            tracing::debug!(table, removed = n, "Expired rows removed on read");
        }
        Ok(n)
    }

    fn delete_older_than(&self, table: &str, column: &str, cutoff: DateTime<Utc>) -> Result<usize> {
        let sql = format!("DELETE FROM {} WHERE {} < ?1", table, column);
        self.conn
            .execute(&sql, params![format_ts(&cutoff)])
            .with_context(|| format!("Failed to purge expired rows from {}", table))
    }

    // ── Temporary records ─────────────────────────────────────────────

    /// Upsert on (user, day). Returns the surviving record and whether an
    /// existing one was replaced.
    pub fn upsert_temp_record(
        &self,
        user: &UserId,
        day: &str,
        fields: &WorkFields,
        submitted_at: DateTime<Utc>,
    ) -> Result<(TemporaryWorkRecord, bool)> {
        // An expired same-day record is gone, not replaced.
        self.expire_table(TEMP_TABLE)?;
        let (kind, key) = user.storage_key();
        let fresh_id = new_record_id();
        let id: String = self
            .conn
            .query_row(
                "INSERT INTO temp_work_updates
                    (id, user_kind, user_key, day, stack, task, progress, blockers, status, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(user_kind, user_key, day) DO UPDATE SET
                    stack = excluded.stack,
                    task = excluded.task,
                    progress = excluded.progress,
                    blockers = excluded.blockers,
                    status = excluded.status,
                    submitted_at = excluded.submitted_at
                 RETURNING id",
                params![
                    fresh_id,
                    kind,
                    key,
                    day,
                    fields.stack,
                    fields.task,
                    fields.progress,
                    fields.blockers,
                    fields.status.as_str(),
                    format_ts(&submitted_at),
                ],
                |row| row.get(0),
            )
            .context("Failed to upsert temporary work record")?;
        let replaced = id != fresh_id;
        // Read back without expiry so a backdated write still reports its row.
        let record = self
            .fetch_temp_record(&id)?
            .context("Temporary work record not found after upsert")?;
        Ok((record, replaced))
    }

    /// Live temporary record by id. Expired rows are removed, never returned.
    pub fn get_temp_record(&self, id: &str) -> Result<Option<TemporaryWorkRecord>> {
        self.expire_table(TEMP_TABLE)?;
        self.fetch_temp_record(id)
    }

    fn fetch_temp_record(&self, id: &str) -> Result<Option<TemporaryWorkRecord>> {
        let sql = format!("SELECT {} FROM temp_work_updates WHERE id = ?1", TEMP_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], WorkRow::from_row)
            .optional()
            .context("Failed to query temporary work record")?;
        row.map(WorkRow::into_temp).transpose()
    }

    pub fn latest_temp_record(&self, user: &UserId) -> Result<Option<TemporaryWorkRecord>> {
        self.expire_table(TEMP_TABLE)?;
        let (kind, key) = user.storage_key();
        let sql = format!(
            "SELECT {} FROM temp_work_updates WHERE user_kind = ?1 AND user_key = ?2
             ORDER BY submitted_at DESC LIMIT 1",
            TEMP_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![kind, key], WorkRow::from_row)
            .optional()
            .context("Failed to query latest temporary work record")?;
        row.map(WorkRow::into_temp).transpose()
    }

    /// Idempotent: returns false when there was nothing to delete.
    pub fn delete_temp_record(&self, id: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM temp_work_updates WHERE id = ?1", params![id])
            .context("Failed to delete temporary work record")?;
        Ok(n > 0)
    }

    /// Ids of temporary records submitted before `cutoff`, oldest first.
    pub fn stale_temp_record_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id FROM temp_work_updates WHERE submitted_at < ?1 ORDER BY submitted_at",
            )
            .context("Failed to prepare stale_temp_record_ids")?;
        let rows = stmt
            .query_map(params![format_ts(&cutoff)], |row| row.get::<_, String>(0))
            .context("Failed to query stale temporary records")?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.context("Failed to read stale record id")?);
        }
        Ok(ids)
    }

    /// Delete sessions referencing `temp_id` (any status), then the record
    /// itself. Both steps tolerate rows that are already gone.
    pub fn cascade_delete_temp_record(&self, temp_id: &str) -> Result<CascadeReport> {
        let sessions_deleted = self.delete_sessions_for_temp(temp_id)?;
        let temp_deleted = self.delete_temp_record(temp_id)?;
        Ok(CascadeReport {
            temp_deleted,
            sessions_deleted,
        })
    }

    // ── Permanent records ─────────────────────────────────────────────

    /// Create or fully overwrite the permanent record for `(user, day)`.
    /// Returns the record id (reused on override) and whether it overrode.
    pub fn upsert_permanent_record(
        &self,
        user: &UserId,
        day: &str,
        fields: &WorkFields,
        submitted_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        followup_completed: bool,
    ) -> Result<(String, bool)> {
        let (kind, key) = user.storage_key();
        let fresh_id = new_record_id();
        let id: String = self
            .conn
            .query_row(
                "INSERT INTO daily_records
                    (id, user_kind, user_key, day, stack, task, progress, blockers, status,
                     submitted_at, completed_at, followup_completed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(user_kind, user_key, day) DO UPDATE SET
                    stack = excluded.stack,
                    task = excluded.task,
                    progress = excluded.progress,
                    blockers = excluded.blockers,
                    status = excluded.status,
                    submitted_at = excluded.submitted_at,
                    completed_at = excluded.completed_at,
                    followup_completed = excluded.followup_completed
                 RETURNING id",
                params![
                    fresh_id,
                    kind,
                    key,
                    day,
                    fields.stack,
                    fields.task,
                    fields.progress,
                    fields.blockers,
                    fields.status.as_str(),
                    format_ts(&submitted_at),
                    completed_at.as_ref().map(format_ts),
                    followup_completed,
                ],
                |row| row.get(0),
            )
            .context("Failed to upsert permanent work record")?;
        let overridden = id != fresh_id;
        Ok((id, overridden))
    }

    /// Write the permanent record for a completed temporary record together
    /// with its promotion ledger entry, in one transaction. The temporary
    /// record is left untouched.
    pub fn record_promotion(
        &self,
        temp: &TemporaryWorkRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(String, bool)> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin promotion transaction")?;
        let written = self.write_promotion(temp, completed_at)?;
        tx.commit().context("Failed to commit promotion")?;
        Ok(written)
    }

    /// Complete a pending session and promote its temporary record in one
    /// transaction. Either the session ends COMPLETED with its permanent id
    /// linked, or nothing is written. The temporary record is left for the
    /// caller to delete.
    pub fn complete_session_and_promote(
        &self,
        session_id: &str,
        temp_id: &str,
        answers: &[String],
        completed_at: DateTime<Utc>,
    ) -> Result<CompletionWrite> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin completion transaction")?;
        let Some(temp) = self.get_temp_record(temp_id)? else {
            // Keep whatever expiry just removed.
            tx.commit().context("Failed to commit completion")?;
            return Ok(CompletionWrite::TempMissing);
        };
        if !self.complete_session(session_id, answers, completed_at)? {
            return Ok(CompletionWrite::NotPending);
        }
        let (permanent_id, overridden) = self.write_promotion(&temp, completed_at)?;
        self.set_session_permanent_record(session_id, &permanent_id)?;
        tx.commit().context("Failed to commit completion")?;
        Ok(CompletionWrite::Promoted {
            permanent_id,
            overridden,
        })
    }

    fn write_promotion(
        &self,
        temp: &TemporaryWorkRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(String, bool)> {
        let (permanent_id, overridden) = self.upsert_permanent_record(
            &temp.user,
            &temp.day,
            &temp.fields,
            temp.submitted_at,
            Some(completed_at),
            true,
        )?;
        self.conn
            .execute(
                "INSERT INTO promotions (temp_record_id, permanent_record_id, promoted_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(temp_record_id) DO UPDATE SET
                    permanent_record_id = excluded.permanent_record_id,
                    promoted_at = excluded.promoted_at",
                params![temp.id, permanent_id, format_ts(&completed_at)],
            )
            .context("Failed to record promotion")?;
        Ok((permanent_id, overridden))
    }

    /// Permanent id a temporary record was already promoted to, if any.
    pub fn promotion_for(&self, temp_id: &str) -> Result<Option<String>> {
        self.expire_table(PROMOTIONS_TABLE)?;
        self.conn
            .query_row(
                "SELECT permanent_record_id FROM promotions WHERE temp_record_id = ?1",
                params![temp_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query promotion ledger")
    }

    pub fn get_permanent_record(&self, id: &str) -> Result<Option<PermanentWorkRecord>> {
        let sql = format!("SELECT {} FROM daily_records WHERE id = ?1", PERMANENT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], PermanentRow::from_row)
            .optional()
            .context("Failed to query permanent work record")?;
        row.map(PermanentRow::into_record).transpose()
    }

    pub fn permanent_record_for_day(
        &self,
        user: &UserId,
        day: &str,
    ) -> Result<Option<PermanentWorkRecord>> {
        let (kind, key) = user.storage_key();
        let sql = format!(
            "SELECT {} FROM daily_records WHERE user_kind = ?1 AND user_key = ?2 AND day = ?3",
            PERMANENT_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![kind, key, day], PermanentRow::from_row)
            .optional()
            .context("Failed to query permanent work record by day")?;
        row.map(PermanentRow::into_record).transpose()
    }

    pub fn latest_permanent_record(&self, user: &UserId) -> Result<Option<PermanentWorkRecord>> {
        let (kind, key) = user.storage_key();
        let sql = format!(
            "SELECT {} FROM daily_records WHERE user_kind = ?1 AND user_key = ?2
             ORDER BY submitted_at DESC LIMIT 1",
            PERMANENT_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![kind, key], PermanentRow::from_row)
            .optional()
            .context("Failed to query latest permanent work record")?;
        row.map(PermanentRow::into_record).transpose()
    }

    // ── Follow-up sessions ────────────────────────────────────────────

    pub fn insert_session(&self, session: &FollowupSession) -> Result<()> {
        let (kind, key) = session.user.storage_key();
        self.conn
            .execute(
                "INSERT INTO followup_sessions
                    (id, user_kind, user_key, temp_record_id, day, questions, answers, status,
                     created_at, completed_at, permanent_record_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    session.id,
                    kind,
                    key,
                    session.temp_record_id,
                    session.day,
                    serde_json::to_string(&session.questions)?,
                    serde_json::to_string(&session.answers)?,
                    session.status.as_str(),
                    format_ts(&session.created_at),
                    session.completed_at.as_ref().map(format_ts),
                    session.permanent_record_id,
                ],
            )
            .context("Failed to insert follow-up session")?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<FollowupSession>> {
        let sql = format!("SELECT {} FROM followup_sessions WHERE id = ?1", SESSION_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], SessionRow::from_row)
            .optional()
            .context("Failed to query follow-up session")?;
        row.map(SessionRow::into_session).transpose()
    }

    /// Sessions for `user`, newest first.
    pub fn list_sessions(
        &self,
        user: &UserId,
        limit: u32,
        skip: u32,
    ) -> Result<Vec<FollowupSession>> {
        let (kind, key) = user.storage_key();
        let sql = format!(
            "SELECT {} FROM followup_sessions WHERE user_kind = ?1 AND user_key = ?2
             ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
            SESSION_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_sessions")?;
        let rows = stmt
            .query_map(params![kind, key, limit, skip], SessionRow::from_row)
            .context("Failed to query follow-up sessions")?;
        let mut sessions = Vec::new();
        for row in rows {
            let r = row.context("Failed to read session row")?;
            sessions.push(r.into_session()?);
        }
        Ok(sessions)
    }

    /// PENDING → COMPLETED with the given answers. Returns false when the
    /// session is missing or no longer pending; nothing is written then.
    pub fn complete_session(
        &self,
        id: &str,
        answers: &[String],
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "UPDATE followup_sessions
                 SET status = 'completed', answers = ?1, completed_at = ?2
                 WHERE id = ?3 AND status = 'pending'",
                params![serde_json::to_string(answers)?, format_ts(&completed_at), id],
            )
            .context("Failed to complete follow-up session")?;
        Ok(n > 0)
    }

    pub fn set_session_permanent_record(&self, id: &str, permanent_id: &str) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "UPDATE followup_sessions SET permanent_record_id = ?1 WHERE id = ?2",
                params![permanent_id, id],
            )
            .context("Failed to link session to permanent record")?;
        Ok(n > 0)
    }

    pub fn delete_sessions_for_temp(&self, temp_id: &str) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM followup_sessions WHERE temp_record_id = ?1",
                params![temp_id],
            )
            .context("Failed to delete sessions for temporary record")
    }

    /// Delete PENDING sessions whose temporary record no longer exists.
    pub fn delete_orphaned_sessions(&self) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM followup_sessions
                 WHERE status = 'pending'
                   AND temp_record_id NOT IN (SELECT id FROM temp_work_updates)",
                [],
            )
            .context("Failed to delete orphaned sessions")
    }

    // ── Stats ─────────────────────────────────────────────────────────

    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self
                .conn
                .query_row(sql, [], |row| row.get(0))
                .with_context(|| format!("Failed to count: {}", sql))?;
            Ok(n as u64)
        };
        Ok(StoreCounts {
            permanent_total: count("SELECT COUNT(*) FROM daily_records")?,
            permanent_followup_completed: count(
                "SELECT COUNT(*) FROM daily_records WHERE followup_completed = 1",
            )?,
            temp_total: count("SELECT COUNT(*) FROM temp_work_updates")?,
            sessions_total: count("SELECT COUNT(*) FROM followup_sessions")?,
            sessions_pending: count(
                "SELECT COUNT(*) FROM followup_sessions WHERE status = 'pending'",
            )?,
            sessions_completed: count(
                "SELECT COUNT(*) FROM followup_sessions WHERE status = 'completed'",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::WorkStatus;
    use chrono::SubsecRound;

    fn user(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn fields(task: &str) -> WorkFields {
        WorkFields {
            stack: "backend".into(),
            task: task.into(),
            progress: "none".into(),
            blockers: "none".into(),
            status: WorkStatus::Working,
        }
    }

    fn hours_ago(h: i64) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::hours(h)
    }

    fn session_for(temp: &TemporaryWorkRecord, id: &str) -> FollowupSession {
        FollowupSession {
            id: id.into(),
            user: temp.user.clone(),
            temp_record_id: temp.id.clone(),
            day: temp.day.clone(),
            questions: vec!["q1".into(), "q2".into(), "q3".into()],
            answers: vec![String::new(); 3],
            status: SessionStatus::Pending,
            // Stored with microsecond precision.
            created_at: Utc::now().trunc_subsecs(6),
            completed_at: None,
            permanent_record_id: None,
        }
    }

    #[test]
    fn test_upsert_temp_record_replaces_same_day() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let u = user("U1");
        let (first, replaced) = store.upsert_temp_record(&u, "2024-01-01", &fields("a"), hours_ago(5))?;
        assert!(!replaced);

        let (second, replaced) = store.upsert_temp_record(&u, "2024-01-01", &fields("b"), Utc::now())?;
        assert!(replaced);
        assert_eq!(second.id, first.id);
        assert_eq!(second.fields.task, "b");
        // Expiry clock reset.
        assert!(second.submitted_at > first.submitted_at);
        assert_eq!(store.counts()?.temp_total, 1);

        let (other_day, _) = store.upsert_temp_record(&u, "2024-01-02", &fields("c"), Utc::now())?;
        assert_ne!(other_day.id, first.id);
        assert_eq!(store.counts()?.temp_total, 2);
        Ok(())
    }

    #[test]
    fn test_canonical_and_opaque_users_do_not_collide() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let canonical = user("507f1f77bcf86cd799439011");
        store.upsert_temp_record(&canonical, "2024-01-01", &fields("a"), Utc::now())?;

        let same = user("507F1F77BCF86CD799439011");
        assert!(store.latest_temp_record(&same)?.is_some());

        let opaque = UserId::Opaque("507f1f77bcf86cd799439011".into());
        assert!(store.latest_temp_record(&opaque)?.is_none());
        Ok(())
    }

    #[test]
    fn test_delete_temp_record_is_idempotent() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (rec, _) = store.upsert_temp_record(&user("U1"), "d", &fields("a"), Utc::now())?;
        assert!(store.delete_temp_record(&rec.id)?);
        assert!(!store.delete_temp_record(&rec.id)?);
        assert!(store.get_temp_record(&rec.id)?.is_none());
        Ok(())
    }

    #[test]
    fn test_latest_temp_record_orders_by_submission() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let u = user("U1");
        store.upsert_temp_record(&u, "2024-01-01", &fields("old"), hours_ago(3))?;
        store.upsert_temp_record(&u, "2024-01-02", &fields("new"), hours_ago(1))?;
        let latest = store.latest_temp_record(&u)?.expect("latest");
        assert_eq!(latest.fields.task, "new");
        assert!(store.latest_temp_record(&user("U2"))?.is_none());
        Ok(())
    }

    #[test]
    fn test_upsert_permanent_record_overrides_by_day() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let u = user("U1");
        let (id1, overridden) =
            store.upsert_permanent_record(&u, "2024-01-01", &fields("a"), Utc::now(), Some(Utc::now()), true)?;
        assert!(!overridden);

        let mut leave = fields("On Leave");
        leave.status = WorkStatus::Leave;
        let (id2, overridden) =
            store.upsert_permanent_record(&u, "2024-01-01", &leave, Utc::now(), None, false)?;
        assert!(overridden);
        assert_eq!(id1, id2);

        let rec = store.get_permanent_record(&id1)?.expect("record");
        // Full overwrite, no merge with the earlier completion.
        assert_eq!(rec.fields.status, WorkStatus::Leave);
        assert!(rec.completed_at.is_none());
        assert!(!rec.followup_completed);
        assert_eq!(store.counts()?.permanent_total, 1);
        Ok(())
    }

    #[test]
    fn test_record_promotion_writes_ledger() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (temp, _) = store.upsert_temp_record(&user("U1"), "2024-01-01", &fields("a"), Utc::now())?;
        assert!(store.promotion_for(&temp.id)?.is_none());

        let (pid, _) = store.record_promotion(&temp, Utc::now())?;
        assert_eq!(store.promotion_for(&temp.id)?.as_deref(), Some(pid.as_str()));
        // Promotion leaves the temporary record for the caller to delete.
        assert!(store.get_temp_record(&temp.id)?.is_some());

        let (again, overridden) = store.record_promotion(&temp, Utc::now())?;
        assert_eq!(again, pid);
        assert!(overridden);
        assert_eq!(store.counts()?.permanent_total, 1);
        Ok(())
    }

    #[test]
    fn test_session_round_trip_and_completion() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (temp, _) = store.upsert_temp_record(&user("U1"), "d", &fields("a"), Utc::now())?;
        let session = session_for(&temp, "U1_abc");
        store.insert_session(&session)?;
        assert_eq!(store.get_session("U1_abc")?.as_ref(), Some(&session));

        let answers = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(store.complete_session("U1_abc", &answers, Utc::now())?);
        // Second transition is refused and leaves answers alone.
        let other = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        assert!(!store.complete_session("U1_abc", &other, Utc::now())?);

        let stored = store.get_session("U1_abc")?.expect("session");
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.answers, answers);
        assert!(stored.completed_at.is_some());

        assert!(store.set_session_permanent_record("U1_abc", "perm")?);
        assert_eq!(
            store.get_session("U1_abc")?.unwrap().permanent_record_id.as_deref(),
            Some("perm")
        );
        Ok(())
    }

    #[test]
    fn test_list_sessions_newest_first_with_paging() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (temp, _) = store.upsert_temp_record(&user("U1"), "d", &fields("a"), Utc::now())?;
        for (i, age) in [3, 1, 2].iter().enumerate() {
            let mut s = session_for(&temp, &format!("U1_{}", i));
            s.created_at = hours_ago(*age);
            store.insert_session(&s)?;
        }
        let all = store.list_sessions(&user("U1"), 10, 0)?;
        let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["U1_1", "U1_2", "U1_0"]);

        let page = store.list_sessions(&user("U1"), 1, 1)?;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "U1_2");
        assert!(store.list_sessions(&user("U2"), 10, 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_cascade_delete_removes_sessions_of_any_status() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (temp, _) = store.upsert_temp_record(&user("U1"), "d", &fields("a"), hours_ago(30))?;
        store.insert_session(&session_for(&temp, "U1_a"))?;
        let mut done = session_for(&temp, "U1_b");
        done.status = SessionStatus::Completed;
        store.insert_session(&done)?;

        let report = store.cascade_delete_temp_record(&temp.id)?;
        assert_eq!(
            report,
            CascadeReport {
                temp_deleted: true,
                sessions_deleted: 2
            }
        );
        let again = store.cascade_delete_temp_record(&temp.id)?;
        assert_eq!(again, CascadeReport::default());
        Ok(())
    }

    #[test]
    fn test_delete_orphaned_sessions_spares_live_and_completed() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (live, _) = store.upsert_temp_record(&user("U1"), "d1", &fields("a"), Utc::now())?;
        let (gone, _) = store.upsert_temp_record(&user("U1"), "d2", &fields("b"), Utc::now())?;
        store.insert_session(&session_for(&live, "U1_live"))?;
        store.insert_session(&session_for(&gone, "U1_orphan"))?;
        let mut promoted = session_for(&gone, "U1_promoted");
        promoted.status = SessionStatus::Completed;
        store.insert_session(&promoted)?;

        store.delete_temp_record(&gone.id)?;
        assert_eq!(store.delete_orphaned_sessions()?, 1);
        assert!(store.get_session("U1_live")?.is_some());
        assert!(store.get_session("U1_orphan")?.is_none());
        assert!(store.get_session("U1_promoted")?.is_some());
        Ok(())
    }

    #[test]
    fn test_stale_temp_record_ids_uses_cutoff() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (old, _) = store.upsert_temp_record(&user("U1"), "d1", &fields("a"), hours_ago(26))?;
        store.upsert_temp_record(&user("U1"), "d2", &fields("b"), hours_ago(2))?;
        let stale = store.stale_temp_record_ids(hours_ago(25))?;
        assert_eq!(stale, vec![old.id]);
        Ok(())
    }

    #[test]
    fn test_ttl_index_setup_and_verification() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        assert!(store.verify_ttl_index(TEMP_TABLE, "submitted_at")?.is_none());

        let setup = store.ensure_ttl_index(TEMP_TTL_INDEX, TEMP_TABLE, "submitted_at", 86_400)?;
        assert_eq!(setup, TtlSetup::Created);
        let setup = store.ensure_ttl_index(TEMP_TTL_INDEX, TEMP_TABLE, "submitted_at", 86_400)?;
        assert_eq!(setup, TtlSetup::Unchanged);
        let setup = store.ensure_ttl_index(TEMP_TTL_INDEX, TEMP_TABLE, "submitted_at", 3_600)?;
        assert_eq!(setup, TtlSetup::Updated);

        let index = store.verify_ttl_index(TEMP_TABLE, "submitted_at")?.expect("index");
        assert_eq!(index.expire_after_secs, 3_600);
        assert!(store.drop_ttl_index(TEMP_TTL_INDEX)?);
        assert!(store.verify_ttl_index(TEMP_TABLE, "submitted_at")?.is_none());
        Ok(())
    }

    #[test]
    fn test_ttl_index_rejects_unsupported_targets() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        assert!(store.ensure_ttl_index("x", PERMANENT_TABLE, "submitted_at", 10).is_err());
        assert!(store.ensure_ttl_index("x", TEMP_TABLE, "day", 10).is_err());
        assert!(store.ensure_ttl_index("x", TEMP_TABLE, "submitted_at", 0).is_err());
        Ok(())
    }

    #[test]
    fn test_purge_expired_only_touches_registered_tables() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let u = user("U1");
        let (old, _) = store.upsert_temp_record(&u, "d1", &fields("a"), hours_ago(25))?;
        let (fresh, _) = store.upsert_temp_record(&u, "d2", &fields("b"), hours_ago(1))?;
        store.insert_session(&session_for(&old, "U1_s"))?;

        // Nothing registered yet: passive expiry is inactive.
        assert!(store.purge_expired(Utc::now())?.is_empty());
        assert!(store.get_temp_record(&old.id)?.is_some());

        store.ensure_ttl_index(TEMP_TTL_INDEX, TEMP_TABLE, "submitted_at", 24 * 3_600)?;
        let purged = store.purge_expired(Utc::now())?;
        assert_eq!(purged, vec![(TEMP_TTL_INDEX.to_string(), 1)]);
        assert!(store.get_temp_record(&old.id)?.is_none());
        assert!(store.get_temp_record(&fresh.id)?.is_some());
        // Passive expiry never cascades.
        assert!(store.get_session("U1_s")?.is_some());
        Ok(())
    }

    #[test]
    fn test_file_backed_store_persists() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("worklog.db");
        let id = {
            let store = WorkStore::new(&path)?;
            store.upsert_temp_record(&user("U1"), "d", &fields("a"), Utc::now())?.0.id
        };
        let store = WorkStore::new(&path)?;
        assert!(store.get_temp_record(&id)?.is_some());
        Ok(())
    }

    #[test]
    fn test_registered_ttl_applies_without_a_monitor() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let u = user("U1");
        store.ensure_ttl_index(TEMP_TTL_INDEX, TEMP_TABLE, "submitted_at", 24 * 3_600)?;
        let (old, _) = store.upsert_temp_record(&u, "2024-01-01", &fields("a"), hours_ago(48))?;

        assert!(store.get_temp_record(&old.id)?.is_none());
        assert!(store.latest_temp_record(&u)?.is_none());
        assert_eq!(store.counts()?.temp_total, 0);
        Ok(())
    }

    #[test]
    fn test_submitting_over_expired_record_is_not_a_replace() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let u = user("U1");
        let (old, _) = store.upsert_temp_record(&u, "2024-01-01", &fields("a"), hours_ago(30))?;
        store.ensure_ttl_index(TEMP_TTL_INDEX, TEMP_TABLE, "submitted_at", 24 * 3_600)?;

        let (fresh, replaced) = store.upsert_temp_record(&u, "2024-01-01", &fields("b"), Utc::now())?;
        assert!(!replaced);
        assert_ne!(fresh.id, old.id);
        Ok(())
    }

    #[test]
    fn test_promotion_ledger_honours_its_ttl() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (temp, _) = store.upsert_temp_record(&user("U1"), "d", &fields("a"), hours_ago(1))?;
        store.record_promotion(&temp, hours_ago(30))?;
        assert!(store.promotion_for(&temp.id)?.is_some());

        store.ensure_ttl_index(PROMOTIONS_TTL_INDEX, PROMOTIONS_TABLE, "promoted_at", 24 * 3_600)?;
        assert!(store.promotion_for(&temp.id)?.is_none());
        Ok(())
    }

    #[test]
    fn test_complete_session_and_promote_links_in_one_step() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (temp, _) = store.upsert_temp_record(&user("U1"), "d", &fields("a"), Utc::now())?;
        store.insert_session(&session_for(&temp, "U1_s"))?;
        let answers = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let (permanent_id, overridden) =
            match store.complete_session_and_promote("U1_s", &temp.id, &answers, Utc::now())? {
                CompletionWrite::Promoted {
                    permanent_id,
                    overridden,
                } => (permanent_id, overridden),
                other => panic!("expected promotion, got {:?}", other),
            };
        assert!(!overridden);
        let session = store.get_session("U1_s")?.expect("session");
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.permanent_record_id.as_deref(), Some(permanent_id.as_str()));
        assert_eq!(store.promotion_for(&temp.id)?.as_deref(), Some(permanent_id.as_str()));

        assert_eq!(
            store.complete_session_and_promote("U1_s", &temp.id, &answers, Utc::now())?,
            CompletionWrite::NotPending
        );
        Ok(())
    }

    #[test]
    fn test_complete_session_without_temp_record_writes_nothing() -> Result<()> {
        let store = WorkStore::new_in_memory()?;
        let (temp, _) = store.upsert_temp_record(&user("U1"), "d", &fields("a"), Utc::now())?;
        store.insert_session(&session_for(&temp, "U1_s"))?;
        store.delete_temp_record(&temp.id)?;

        let answers = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(
            store.complete_session_and_promote("U1_s", &temp.id, &answers, Utc::now())?,
            CompletionWrite::TempMissing
        );
        let session = store.get_session("U1_s")?.expect("session");
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.answers, vec![String::new(); 3]);
        assert!(session.permanent_record_id.is_none());
        assert_eq!(store.counts()?.permanent_total, 0);
        Ok(())
    }
}

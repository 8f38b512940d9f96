use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::config::{ExpirySection, WorklogConfig};
use crate::errors::{LifecycleError, LifecycleResult};
use crate::identity::UserId;
use crate::questions::{self, QuestionGenerator};
use crate::records::{
    FollowupSession, LatestRecord, SessionCompletion, SessionStart, SubmitMode, SubmitOutcome,
    WorkSubmission,
};
use crate::store::{
    PROMOTIONS_TABLE, PROMOTIONS_TTL_INDEX, StoreCounts, StoreHandle, TEMP_TABLE, TEMP_TTL_INDEX,
    TtlIndex, TtlMonitor, TtlSetup, WorkStore,
};

use super::expiry::{ExpiryCoordinator, SweepReport};
use super::promotion::PromotionEngine;
use super::sessions::SessionManager;
use super::temp_store::TempRecordStore;

/// Store counts plus the state of passive expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorklogStats {
    #[serde(flatten)]
    pub counts: StoreCounts,
    pub permanent_followup_incomplete: u64,
    pub passive_expiry_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passive_expiry: Option<TtlIndex>,
}

/// The lifecycle surface thin callers (CLI, an HTTP layer) talk to.
#[derive(Clone)]
pub struct WorklogService {
    store: StoreHandle,
    temps: TempRecordStore,
    sessions: SessionManager,
    promotion: PromotionEngine,
    expiry: ExpirySection,
}

impl WorklogService {
    pub fn new(
        store: StoreHandle,
        generator: Arc<dyn QuestionGenerator>,
        expiry: ExpirySection,
    ) -> Self {
        let temps = TempRecordStore::new(store.clone());
        let promotion = PromotionEngine::new(store.clone());
        let sessions = SessionManager::new(
            store.clone(),
            temps.clone(),
            promotion.clone(),
            generator,
        );
        Self {
            store,
            temps,
            sessions,
            promotion,
            expiry,
        }
    }

    /// Open the configured database and register passive expiry.
    pub async fn open(config: &WorklogConfig) -> anyhow::Result<Self> {
        let path = &config.store.path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory: {}", parent.display())
            })?;
        }
        let store = StoreHandle::new(WorkStore::new(path)?);
        let generator: Arc<dyn QuestionGenerator> =
            Arc::from(questions::from_config(&config.questions)?);
        let service = Self::new(store, generator, config.expiry.clone());
        service.ensure_ttl_indexes().await?;
        Ok(service)
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn temp_records(&self) -> &TempRecordStore {
        &self.temps
    }

    /// Register passive expiry for the temporary tier and the promotion ledger.
    pub async fn ensure_ttl_indexes(&self) -> LifecycleResult<()> {
        let ttl = self.expiry.passive_ttl_secs as i64;
        let (temp, ledger) = self
            .store
            .call(move |s| {
                Ok((
                    s.ensure_ttl_index(TEMP_TTL_INDEX, TEMP_TABLE, "submitted_at", ttl)?,
                    s.ensure_ttl_index(PROMOTIONS_TTL_INDEX, PROMOTIONS_TABLE, "promoted_at", ttl)?,
                ))
            })
            .await?;
        for (index, setup) in [(TEMP_TTL_INDEX, temp), (PROMOTIONS_TTL_INDEX, ledger)] {
            match setup {
                TtlSetup::Created => tracing::info!(index, expire_after_secs = ttl, "Created TTL index"),
                TtlSetup::Updated => tracing::info!(index, expire_after_secs = ttl, "Updated TTL index"),
                TtlSetup::Unchanged => tracing::debug!(index, "TTL index already present"),
            }
        }
        Ok(())
    }

    pub fn ttl_monitor(&self) -> TtlMonitor {
        TtlMonitor::new(self.store.clone(), self.expiry.ttl_monitor_interval())
    }

    pub fn expiry_coordinator(&self) -> ExpiryCoordinator {
        ExpiryCoordinator::new(self.store.clone(), &self.expiry)
    }

    /// Leave goes straight to the permanent log; anything else waits in the
    /// temporary tier for follow-up. `is_override` reports whether a same-day
    /// record in the target tier was replaced.
    pub async fn submit(
        &self,
        user: &UserId,
        day: &str,
        submission: &WorkSubmission,
    ) -> LifecycleResult<SubmitOutcome> {
        NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
            LifecycleError::Validation(format!("day must be YYYY-MM-DD, got '{}'", day))
        })?;
        let fields = submission.normalize().map_err(LifecycleError::Validation)?;

        if fields.status.bypasses_followup() {
            let (record_id, is_override) = self.promotion.write_direct(user, day, fields).await?;
            return Ok(SubmitOutcome {
                record_id,
                mode: SubmitMode::DirectToPermanent,
                is_override,
            });
        }

        let (record, replaced) = self.temps.create_or_replace(user, day, fields).await?;
        Ok(SubmitOutcome {
            record_id: record.id,
            mode: SubmitMode::PendingFollowup,
            is_override: replaced,
        })
    }

    pub async fn start_session(
        &self,
        user: &UserId,
        temp_record_id: &str,
    ) -> LifecycleResult<SessionStart> {
        self.sessions.start(user, temp_record_id).await
    }

    pub async fn complete_session(
        &self,
        session_id: &str,
        user: &UserId,
        answers: &[String],
    ) -> LifecycleResult<SessionCompletion> {
        self.sessions.complete(session_id, user, answers).await
    }

    pub async fn get_session(&self, session_id: &str, user: &UserId) -> LifecycleResult<FollowupSession> {
        self.sessions.get(session_id, user).await
    }

    pub async fn list_sessions(
        &self,
        user: &UserId,
        limit: Option<u32>,
        skip: u32,
    ) -> LifecycleResult<Vec<FollowupSession>> {
        self.sessions.list(user, limit, skip).await
    }

    /// Manual sweep with the same threshold as the background coordinator.
    pub async fn sweep_now(&self) -> LifecycleResult<SweepReport> {
        self.expiry_coordinator().run_once().await
    }

    pub async fn get_stats(&self) -> LifecycleResult<WorklogStats> {
        let (counts, ttl) = self
            .store
            .call(|s| Ok((s.counts()?, s.verify_ttl_index(TEMP_TABLE, "submitted_at")?)))
            .await?;
        Ok(WorklogStats {
            permanent_followup_incomplete: counts
                .permanent_total
                .saturating_sub(counts.permanent_followup_completed),
            counts,
            passive_expiry_active: ttl.is_some(),
            passive_expiry: ttl,
        })
    }

    /// Most recent record across both tiers. On equal submission times the
    /// permanent record wins.
    pub async fn get_latest(&self, user: &UserId) -> LifecycleResult<LatestRecord> {
        let owner = user.clone();
        let (temp, permanent) = self
            .store
            .call(move |s| {
                Ok((
                    s.latest_temp_record(&owner)?,
                    s.latest_permanent_record(&owner)?,
                ))
            })
            .await?;
        match (temp, permanent) {
            (Some(t), Some(p)) if t.submitted_at > p.submitted_at => Ok(LatestRecord::Temporary(t)),
            (_, Some(p)) => Ok(LatestRecord::Permanent(p)),
            (Some(t), None) => Ok(LatestRecord::Temporary(t)),
            (None, None) => Err(LifecycleError::NoRecordForUser {
                user: user.to_string(),
            }),
        }
    }

    /// Look a record up by id, permanent tier first.
    pub async fn find_record(&self, user: &UserId, record_id: &str) -> LifecycleResult<LatestRecord> {
        let id = record_id.to_string();
        let (permanent, temp) = self
            .store
            .call(move |s| Ok((s.get_permanent_record(&id)?, s.get_temp_record(&id)?)))
            .await?;
        let found = match (permanent, temp) {
            (Some(p), _) => LatestRecord::Permanent(p),
            (None, Some(t)) => LatestRecord::Temporary(t),
            (None, None) => {
                return Err(LifecycleError::TempRecordNotFound {
                    id: record_id.to_string(),
                });
            }
        };
        let owner = match &found {
            LatestRecord::Permanent(p) => &p.user,
            LatestRecord::Temporary(t) => &t.user,
        };
        if owner != user {
            return Err(LifecycleError::PermissionDenied {
                what: "work record",
                id: record_id.to_string(),
            });
        }
        Ok(found)
    }
}

use chrono::{DateTime, Utc};

use crate::errors::{LifecycleError, LifecycleResult};
use crate::identity::UserId;
use crate::records::WorkFields;
use crate::store::StoreHandle;

/// Values merged into the permanent record on promotion.
#[derive(Debug, Clone, Copy)]
pub struct PromotionExtras {
    pub completed_at: DateTime<Utc>,
}

impl Default for PromotionExtras {
    fn default() -> Self {
        Self {
            completed_at: Utc::now(),
        }
    }
}

/// Moves finished work from the temporary tier into the permanent log.
///
/// The permanent write always happens before the temporary delete, and the
/// two are separate store calls. A crash in between leaves both records in
/// place; re-running `promote` then overwrites the same permanent record and
/// finishes the delete.
#[derive(Clone)]
pub struct PromotionEngine {
    store: StoreHandle,
}

impl PromotionEngine {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub async fn promote(
        &self,
        temp_record_id: &str,
        extras: PromotionExtras,
    ) -> LifecycleResult<String> {
        let temp_id = temp_record_id.to_string();
        let written = self
            .store
            .call(move |s| match s.get_temp_record(&temp_id)? {
                Some(temp) => s
                    .record_promotion(&temp, extras.completed_at)
                    .map(|(id, overridden)| Some((id, overridden, false))),
                None => Ok(s
                    .promotion_for(&temp_id)?
                    .map(|id| (id, false, true))),
            })
            .await?;

        let Some((permanent_id, overridden, already_promoted)) = written else {
            return Err(LifecycleError::TempRecordNotFound {
                id: temp_record_id.to_string(),
            });
        };
        if already_promoted {
            tracing::info!(
                temp = %temp_record_id,
                permanent = %permanent_id,
                "Temporary work record was already promoted"
            );
            return Ok(permanent_id);
        }

        self.discard_promoted(temp_record_id, &permanent_id, overridden)
            .await?;
        Ok(permanent_id)
    }

    /// Delete a temporary record whose permanent write has landed. A record
    /// that is already gone is a consistency warning, not an error.
    pub async fn discard_promoted(
        &self,
        temp_record_id: &str,
        permanent_id: &str,
        overridden: bool,
    ) -> LifecycleResult<()> {
        let temp_id = temp_record_id.to_string();
        let deleted = self
            .store
            .call(move |s| s.delete_temp_record(&temp_id))
            .await?;
        if deleted {
            tracing::info!(
                temp = %temp_record_id,
                permanent = %permanent_id,
                overridden,
                "Promoted temporary work record"
            );
        } else {
            tracing::warn!(
                temp = %temp_record_id,
                permanent = %permanent_id,
                "Temporary work record vanished before its delete; it may have expired"
            );
        }
        Ok(())
    }

    /// Write a record straight into the permanent tier. Returns the record id
    /// and whether a same-day record was overwritten.
    pub async fn write_direct(
        &self,
        user: &UserId,
        day: &str,
        fields: WorkFields,
    ) -> LifecycleResult<(String, bool)> {
        let owner = user.clone();
        let day_key = day.to_string();
        let (id, overridden) = self
            .store
            .call(move |s| {
                s.upsert_permanent_record(&owner, &day_key, &fields, Utc::now(), None, false)
            })
            .await?;
        tracing::info!(
            user = %user,
            record = %id,
            day = %day,
            overridden,
            "Permanent work record written directly"
        );
        Ok((id, overridden))
    }
}

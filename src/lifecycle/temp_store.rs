use chrono::{DateTime, Utc};

use crate::errors::{LifecycleError, LifecycleResult};
use crate::identity::UserId;
use crate::records::{TemporaryWorkRecord, WorkFields};
use crate::store::StoreHandle;

/// Pending submissions awaiting follow-up, one per (user, day).
///
/// Records here are also removed behind our back by passive expiry, so every
/// read may come back empty for a record that existed a moment ago.
#[derive(Clone)]
pub struct TempRecordStore {
    store: StoreHandle,
}

impl TempRecordStore {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Insert, or overwrite the same-day record in place. Either way the
    /// expiry countdown restarts now.
    pub async fn create_or_replace(
        &self,
        user: &UserId,
        day: &str,
        fields: WorkFields,
    ) -> LifecycleResult<(TemporaryWorkRecord, bool)> {
        self.create_or_replace_at(user, day, fields, Utc::now()).await
    }

    /// As [`create_or_replace`](Self::create_or_replace) with an explicit
    /// submission time.
    pub async fn create_or_replace_at(
        &self,
        user: &UserId,
        day: &str,
        fields: WorkFields,
        submitted_at: DateTime<Utc>,
    ) -> LifecycleResult<(TemporaryWorkRecord, bool)> {
        let owner = user.clone();
        let day = day.to_string();
        let (record, replaced) = self
            .store
            .call(move |s| s.upsert_temp_record(&owner, &day, &fields, submitted_at))
            .await?;
        tracing::info!(
            user = %user,
            record = %record.id,
            day = %record.day,
            replaced,
            "Temporary work record saved"
        );
        Ok((record, replaced))
    }

    pub async fn get(&self, id: &str) -> LifecycleResult<TemporaryWorkRecord> {
        let key = id.to_string();
        self.store
            .call(move |s| s.get_temp_record(&key))
            .await?
            .ok_or_else(|| LifecycleError::TempRecordNotFound { id: id.to_string() })
    }

    pub async fn get_latest(&self, user: &UserId) -> LifecycleResult<TemporaryWorkRecord> {
        let owner = user.clone();
        self.store
            .call(move |s| s.latest_temp_record(&owner))
            .await?
            .ok_or_else(|| LifecycleError::NoRecordForUser {
                user: user.to_string(),
            })
    }

    /// Missing records are not an error; returns whether anything was deleted.
    pub async fn delete(&self, id: &str) -> LifecycleResult<bool> {
        let key = id.to_string();
        let deleted = self.store.call(move |s| s.delete_temp_record(&key)).await?;
        tracing::debug!(record = %id, deleted, "Temporary work record delete");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::records::WorkStatus;
    use crate::store::WorkStore;

    fn temp_store() -> TempRecordStore {
        TempRecordStore::new(StoreHandle::new(WorkStore::new_in_memory().unwrap()))
    }

    fn fields(task: &str) -> WorkFields {
        WorkFields {
            stack: "backend".into(),
            task: task.into(),
            progress: "p".into(),
            blockers: "b".into(),
            status: WorkStatus::Wfh,
        }
    }

    #[tokio::test]
    async fn test_replace_keeps_id_and_single_record() {
        let temps = temp_store();
        let user = UserId::parse("U1").unwrap();
        let (first, _) = temps.create_or_replace(&user, "2024-01-01", fields("a")).await.unwrap();
        let (second, replaced) = temps.create_or_replace(&user, "2024-01-01", fields("b")).await.unwrap();
        assert!(replaced);
        assert_eq!(first.id, second.id);
        assert_eq!(temps.get(&first.id).await.unwrap().fields.task, "b");
        assert_eq!(temps.get_latest(&user).await.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_missing_records_map_to_not_found() {
        let temps = temp_store();
        let err = temps.get("65a1b2c3d4e5f60718293a4b").await.unwrap_err();
        assert!(matches!(err, LifecycleError::TempRecordNotFound { .. }));

        let err = temps.get_latest(&UserId::parse("nobody").unwrap()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temps = temp_store();
        let user = UserId::parse("U1").unwrap();
        let (rec, _) = temps.create_or_replace(&user, "d", fields("a")).await.unwrap();
        assert!(temps.delete(&rec.id).await.unwrap());
        assert!(!temps.delete(&rec.id).await.unwrap());
    }
}

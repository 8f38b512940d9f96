use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{LifecycleError, LifecycleResult};
use crate::identity::UserId;
use crate::questions::QuestionGenerator;
use crate::records::{FollowupSession, SessionCompletion, SessionStart, SessionStatus};
use crate::store::{CompletionWrite, StoreHandle};

use super::promotion::PromotionEngine;
use super::temp_store::TempRecordStore;

pub const REQUIRED_ANSWERS: usize = 3;
pub const DEFAULT_LIST_LIMIT: u32 = 150;

/// Follow-up dialogue state machine: PENDING → COMPLETED, once.
#[derive(Clone)]
pub struct SessionManager {
    store: StoreHandle,
    temps: TempRecordStore,
    promotion: PromotionEngine,
    generator: Arc<dyn QuestionGenerator>,
}

fn validate_answers(answers: &[String]) -> LifecycleResult<Vec<String>> {
    if answers.len() != REQUIRED_ANSWERS {
        return Err(LifecycleError::Validation(format!(
            "All {} questions must be answered, got {} answers",
            REQUIRED_ANSWERS,
            answers.len()
        )));
    }
    if answers.iter().any(|a| a.trim().is_empty()) {
        return Err(LifecycleError::Validation(
            "All questions must have non-empty answers".to_string(),
        ));
    }
    Ok(answers.iter().map(|a| a.trim().to_string()).collect())
}

impl SessionManager {
    pub fn new(
        store: StoreHandle,
        temps: TempRecordStore,
        promotion: PromotionEngine,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        Self {
            store,
            temps,
            promotion,
            generator,
        }
    }

    /// Open a session for one of `user`'s temporary records. Nothing is
    /// persisted if the generator fails.
    pub async fn start(&self, user: &UserId, temp_record_id: &str) -> LifecycleResult<SessionStart> {
        let temp = self.temps.get(temp_record_id).await?;
        if temp.user != *user {
            return Err(LifecycleError::PermissionDenied {
                what: "temporary work record",
                id: temp_record_id.to_string(),
            });
        }

        let questions = self.generator.generate(user, &temp.summary()).await?;

        let session = FollowupSession {
            id: format!("{}_{}", user, Uuid::new_v4().simple()),
            user: user.clone(),
            temp_record_id: temp.id.clone(),
            day: temp.day.clone(),
            answers: vec![String::new(); questions.len()],
            questions,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            permanent_record_id: None,
        };
        let stored = session.clone();
        self.store.call(move |s| s.insert_session(&stored)).await?;

        tracing::info!(
            user = %user,
            session = %session.id,
            temp = %temp.id,
            "Follow-up session started"
        );
        Ok(SessionStart {
            session_id: session.id,
            questions: session.questions,
        })
    }

    /// Record answers, mark the session completed and promote its record.
    pub async fn complete(
        &self,
        session_id: &str,
        user: &UserId,
        answers: &[String],
    ) -> LifecycleResult<SessionCompletion> {
        let session = self.fetch(session_id).await?;
        if session.user != *user {
            return Err(LifecycleError::PermissionDenied {
                what: "follow-up session",
                id: session_id.to_string(),
            });
        }
        let answers = validate_answers(answers)?;
        if session.status == SessionStatus::Completed {
            return Err(LifecycleError::AlreadyCompleted {
                session_id: session_id.to_string(),
            });
        }
        let completed_at = Utc::now();
        let id = session_id.to_string();
        let temp_id = session.temp_record_id.clone();
        // One transaction covers the existence check, the status change and
        // the permanent write.
        let written = self
            .store
            .call(move |s| s.complete_session_and_promote(&id, &temp_id, &answers, completed_at))
            .await?;
        let (permanent_record_id, overridden) = match written {
            CompletionWrite::Promoted {
                permanent_id,
                overridden,
            } => (permanent_id, overridden),
            CompletionWrite::TempMissing => {
                return Err(LifecycleError::TempRecordNotFound {
                    id: session.temp_record_id,
                });
            }
            // Lost a race with a concurrent completion.
            CompletionWrite::NotPending => {
                return Err(LifecycleError::AlreadyCompleted {
                    session_id: session_id.to_string(),
                });
            }
        };

        self.promotion
            .discard_promoted(&session.temp_record_id, &permanent_record_id, overridden)
            .await?;

        tracing::info!(
            user = %user,
            session = %session_id,
            permanent = %permanent_record_id,
            "Follow-up session completed"
        );
        Ok(SessionCompletion {
            session_id: session_id.to_string(),
            permanent_record_id,
        })
    }

    /// Another user's session is reported as missing.
    pub async fn get(&self, session_id: &str, user: &UserId) -> LifecycleResult<FollowupSession> {
        let session = self.fetch(session_id).await?;
        if session.user != *user {
            return Err(LifecycleError::SessionNotFound {
                id: session_id.to_string(),
            });
        }
        Ok(session)
    }

    pub async fn list(
        &self,
        user: &UserId,
        limit: Option<u32>,
        skip: u32,
    ) -> LifecycleResult<Vec<FollowupSession>> {
        let owner = user.clone();
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        Ok(self
            .store
            .call(move |s| s.list_sessions(&owner, limit, skip))
            .await?)
    }

    async fn fetch(&self, session_id: &str) -> LifecycleResult<FollowupSession> {
        let id = session_id.to_string();
        self.store
            .call(move |s| s.get_session(&id))
            .await?
            .ok_or_else(|| LifecycleError::SessionNotFound {
                id: session_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::questions::TemplateQuestionGenerator;
    use crate::records::{WorkFields, WorkStatus, WorkSummary};
    use crate::store::WorkStore;
    use async_trait::async_trait;

    struct FailingGenerator;

    #[async_trait]
    impl QuestionGenerator for FailingGenerator {
        async fn generate(&self, _: &UserId, _: &WorkSummary) -> LifecycleResult<Vec<String>> {
            Err(LifecycleError::QuestionGenerator("connection refused".into()))
        }
    }

    struct Fixture {
        store: StoreHandle,
        temps: TempRecordStore,
        sessions: SessionManager,
    }

    fn fixture_with(generator: Arc<dyn QuestionGenerator>) -> Fixture {
        let store = StoreHandle::new(WorkStore::new_in_memory().unwrap());
        let temps = TempRecordStore::new(store.clone());
        let sessions = SessionManager::new(
            store.clone(),
            temps.clone(),
            PromotionEngine::new(store.clone()),
            generator,
        );
        Fixture {
            store,
            temps,
            sessions,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(TemplateQuestionGenerator))
    }

    fn user(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn answers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn submit(f: &Fixture, who: &str) -> String {
        let fields = WorkFields {
            stack: "backend".into(),
            task: "Fix bug".into(),
            progress: "p".into(),
            blockers: "b".into(),
            status: WorkStatus::Working,
        };
        f.temps
            .create_or_replace(&user(who), "2024-01-01", fields)
            .await
            .unwrap()
            .0
            .id
    }

    #[tokio::test]
    async fn test_start_creates_pending_session_with_blank_answers() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let start = f.sessions.start(&user("U1"), &temp_id).await.unwrap();
        assert!(start.session_id.starts_with("U1_"));
        assert_eq!(start.questions.len(), 3);

        let session = f.sessions.get(&start.session_id, &user("U1")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.answers, vec![""; 3]);
        assert_eq!(session.temp_record_id, temp_id);
    }

    #[tokio::test]
    async fn test_start_rejects_other_users_record() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let err = f.sessions.start(&user("U2"), &temp_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_start_on_missing_record_is_not_found() {
        let f = fixture();
        let err = f
            .sessions
            .start(&user("U1"), "65a1b2c3d4e5f60718293a4b")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_generator_failure_persists_nothing() {
        let f = fixture_with(Arc::new(FailingGenerator));
        let temp_id = submit(&f, "U1").await;
        let err = f.sessions.start(&user("U1"), &temp_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integration);
        assert_eq!(f.store.lock_sync().unwrap().counts().unwrap().sessions_total, 0);
    }

    #[tokio::test]
    async fn test_complete_promotes_and_links_permanent_record() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let start = f.sessions.start(&user("U1"), &temp_id).await.unwrap();

        let done = f
            .sessions
            .complete(&start.session_id, &user("U1"), &answers(&["a", " b ", "c"]))
            .await
            .unwrap();

        let session = f.sessions.get(&start.session_id, &user("U1")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.answers, answers(&["a", "b", "c"]));
        assert_eq!(session.permanent_record_id.as_deref(), Some(done.permanent_record_id.as_str()));
        assert!(f.temps.get(&temp_id).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_validates_answers() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let start = f.sessions.start(&user("U1"), &temp_id).await.unwrap();

        for bad in [answers(&["a", "b"]), answers(&["a", "b", "  "]), answers(&["a", "b", "c", "d"])] {
            let err = f
                .sessions
                .complete(&start.session_id, &user("U1"), &bad)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        let session = f.sessions.get(&start.session_id, &user("U1")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn test_complete_twice_is_rejected_and_answers_kept() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let start = f.sessions.start(&user("U1"), &temp_id).await.unwrap();
        f.sessions
            .complete(&start.session_id, &user("U1"), &answers(&["a", "b", "c"]))
            .await
            .unwrap();

        let err = f
            .sessions
            .complete(&start.session_id, &user("U1"), &answers(&["x", "y", "z"]))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyCompleted { .. }));
        let session = f.sessions.get(&start.session_id, &user("U1")).await.unwrap();
        assert_eq!(session.answers, answers(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_complete_by_other_user_is_denied() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let start = f.sessions.start(&user("U1"), &temp_id).await.unwrap();
        let err = f
            .sessions
            .complete(&start.session_id, &user("U2"), &answers(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_complete_after_expiry_leaves_session_pending() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let start = f.sessions.start(&user("U1"), &temp_id).await.unwrap();
        f.temps.delete(&temp_id).await.unwrap();

        let err = f
            .sessions
            .complete(&start.session_id, &user("U1"), &answers(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TempRecordNotFound { .. }));
        let session = f.sessions.get(&start.session_id, &user("U1")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_hides_other_users_sessions_and_list_is_scoped() {
        let f = fixture();
        let temp_id = submit(&f, "U1").await;
        let start = f.sessions.start(&user("U1"), &temp_id).await.unwrap();
        f.sessions.start(&user("U1"), &temp_id).await.unwrap();

        let err = f.sessions.get(&start.session_id, &user("U2")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::SessionNotFound { .. }));
        assert_eq!(f.sessions.list(&user("U1"), None, 0).await.unwrap().len(), 2);
        assert_eq!(f.sessions.list(&user("U1"), Some(1), 0).await.unwrap().len(), 1);
        assert!(f.sessions.list(&user("U2"), None, 0).await.unwrap().is_empty());
    }
}

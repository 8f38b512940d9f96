use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserId;

pub const DEFAULT_PROGRESS: &str = "No challenges faced";
pub const DEFAULT_BLOCKERS: &str = "No specific plans";
pub const LEAVE_NOTE: &str = "On Leave";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Working,
    Wfh,
    Leave,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Wfh => "wfh",
            Self::Leave => "leave",
        }
    }

    /// Leave submissions skip the follow-up dialogue entirely.
    pub fn bypasses_followup(&self) -> bool {
        matches!(self, Self::Leave)
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "working" => Ok(Self::Working),
            "wfh" => Ok(Self::Wfh),
            "leave" => Ok(Self::Leave),
            _ => Err(format!("Invalid work status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// A daily update as submitted by the user, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkSubmission {
    pub stack: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub blockers: Option<String>,
    #[serde(default)]
    pub status: WorkStatus,
}

/// Normalized freeform fields shared by both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkFields {
    pub stack: String,
    pub task: String,
    pub progress: String,
    pub blockers: String,
    pub status: WorkStatus,
}

impl WorkSubmission {
    /// Trim and default the submission. Stack is always required; task is
    /// required unless the user is on leave.
    pub fn normalize(&self) -> Result<WorkFields, String> {
        let stack = self.stack.trim();
        if stack.is_empty() {
            return Err("stack cannot be empty".to_string());
        }
        let task = self.task.trim();

        if self.status.bypasses_followup() {
            return Ok(WorkFields {
                stack: stack.to_string(),
                task: if task.is_empty() { LEAVE_NOTE } else { task }.to_string(),
                progress: LEAVE_NOTE.to_string(),
                blockers: LEAVE_NOTE.to_string(),
                status: self.status,
            });
        }

        if task.is_empty() {
            return Err(format!(
                "task is required when status is '{}'",
                self.status.as_str()
            ));
        }
        Ok(WorkFields {
            stack: stack.to_string(),
            task: task.to_string(),
            progress: non_blank_or(self.progress.as_deref(), DEFAULT_PROGRESS),
            blockers: non_blank_or(self.blockers.as_deref(), DEFAULT_BLOCKERS),
            status: self.status,
        })
    }
}

fn non_blank_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporaryWorkRecord {
    pub id: String,
    pub user: UserId,
    pub day: String,
    #[serde(flatten)]
    pub fields: WorkFields,
    pub submitted_at: DateTime<Utc>,
}

impl TemporaryWorkRecord {
    /// Fields handed to the question generator.
    pub fn summary(&self) -> WorkSummary {
        WorkSummary {
            user_id: self.user.to_string(),
            description: self.fields.task.clone(),
            challenges: self.fields.progress.clone(),
            plans: self.fields.blockers.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermanentWorkRecord {
    pub id: String,
    pub user: UserId,
    pub day: String,
    #[serde(flatten)]
    pub fields: WorkFields,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub followup_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FollowupSession {
    pub id: String,
    pub user: UserId,
    pub temp_record_id: String,
    pub day: String,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub permanent_record_id: Option<String>,
}

/// Input to the question generator, keyed the way the generator expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSummary {
    pub user_id: String,
    pub description: String,
    pub challenges: String,
    pub plans: String,
}

/// Where a submission ended up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitMode {
    DirectToPermanent,
    PendingFollowup,
}

impl SubmitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectToPermanent => "direct-to-permanent",
            Self::PendingFollowup => "pending-followup",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub record_id: String,
    pub mode: SubmitMode,
    /// True when a same-day record was replaced in the tier this submission
    /// went to: permanent for leave, temporary otherwise.
    pub is_override: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStart {
    pub session_id: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionCompletion {
    pub session_id: String,
    pub permanent_record_id: String,
}

/// The most recent record for a user across both tiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum LatestRecord {
    Temporary(TemporaryWorkRecord),
    Permanent(PermanentWorkRecord),
}

impl LatestRecord {
    pub fn id(&self) -> &str {
        match self {
            Self::Temporary(r) => &r.id,
            Self::Permanent(r) => &r.id,
        }
    }

    pub fn fields(&self) -> &WorkFields {
        match self {
            Self::Temporary(r) => &r.fields,
            Self::Permanent(r) => &r.fields,
        }
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        match self {
            Self::Temporary(r) => r.submitted_at,
            Self::Permanent(r) => r.submitted_at,
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(status: WorkStatus, task: &str) -> WorkSubmission {
        WorkSubmission {
            stack: " backend ".into(),
            task: task.into(),
            progress: None,
            blockers: Some("   ".into()),
            status,
        }
    }

    #[test]
    fn test_normalize_defaults_optional_fields() {
        let fields = submission(WorkStatus::Working, " Fix bug ").normalize().unwrap();
        assert_eq!(fields.stack, "backend");
        assert_eq!(fields.task, "Fix bug");
        assert_eq!(fields.progress, DEFAULT_PROGRESS);
        assert_eq!(fields.blockers, DEFAULT_BLOCKERS);
    }

    #[test]
    fn test_normalize_requires_task_for_working_and_wfh() {
        for status in [WorkStatus::Working, WorkStatus::Wfh] {
            let err = submission(status, "  ").normalize().unwrap_err();
            assert!(err.contains(status.as_str()));
        }
    }

    #[test]
    fn test_normalize_requires_stack() {
        let mut sub = submission(WorkStatus::Leave, "");
        sub.stack = " ".into();
        assert!(sub.normalize().is_err());
    }

    #[test]
    fn test_normalize_leave_fills_leave_notes() {
        let fields = submission(WorkStatus::Leave, "").normalize().unwrap();
        assert_eq!(fields.task, LEAVE_NOTE);
        assert_eq!(fields.progress, LEAVE_NOTE);
        assert_eq!(fields.blockers, LEAVE_NOTE);
        assert_eq!(fields.status, WorkStatus::Leave);
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [WorkStatus::Working, WorkStatus::Wfh, WorkStatus::Leave] {
            assert_eq!(status.as_str().parse::<WorkStatus>().unwrap(), status);
        }
        assert!("holiday".parse::<WorkStatus>().is_err());
        assert_eq!("completed".parse::<SessionStatus>().unwrap(), SessionStatus::Completed);
    }

    #[test]
    fn test_submit_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&SubmitMode::PendingFollowup).unwrap();
        assert_eq!(json, "\"pending-followup\"");
        assert_eq!(SubmitMode::DirectToPermanent.as_str(), "direct-to-permanent");
    }
}

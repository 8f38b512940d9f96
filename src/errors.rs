//! Typed error hierarchy for the worklog lifecycle.
//!
//! `LifecycleError` is what the service surface returns. Each variant maps onto
//! one of the coarse [`ErrorKind`]s that thin callers switch on:
//! - `NotFound`: temporary record or session absent (often a race with expiry)
//! - `PermissionDenied`: caller does not own the record or session
//! - `Validation`: bad answers, blank required fields, repeat completion
//! - `Integration`: question generator or directory unreachable
//! - `Storage`: the underlying store failed
//!
//! A temporary record that is already gone when promotion tries to delete it
//! is not an error at all; it is logged as a consistency warning.

use thiserror::Error;

/// Coarse classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Validation,
    Integration,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Validation => "validation",
            Self::Integration => "integration",
            Self::Storage => "storage",
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Temporary work record {id} not found (it may have expired)")]
    TempRecordNotFound { id: String },

    #[error("Follow-up session {id} not found")]
    SessionNotFound { id: String },

    #[error("No work record found for user {user}")]
    NoRecordForUser { user: String },

    #[error("Access denied: {what} {id} belongs to a different user")]
    PermissionDenied { what: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Follow-up session {session_id} is already completed")]
    AlreadyCompleted { session_id: String },

    #[error("Question generator failed: {0}")]
    QuestionGenerator(String),

    #[error("Directory lookup failed: {0}")]
    Directory(String),

    #[error("No directory entry for {email}")]
    UnknownTrainee { email: String },

    #[error("Directory entry for {email} is not active")]
    InactiveTrainee { email: String },

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TempRecordNotFound { .. }
            | Self::SessionNotFound { .. }
            | Self::NoRecordForUser { .. }
            | Self::UnknownTrainee { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } | Self::InactiveTrainee { .. } => {
                ErrorKind::PermissionDenied
            }
            Self::Validation(_) | Self::AlreadyCompleted { .. } => ErrorKind::Validation,
            Self::QuestionGenerator(_) | Self::Directory(_) => ErrorKind::Integration,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<anyhow::Error> for LifecycleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;

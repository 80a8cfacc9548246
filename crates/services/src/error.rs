//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{PackId, QuestionId, SessionId, SessionStateError, SessionStatus};
use exam_core::tracker::TrackerError;
use storage::repository::StorageError;

/// Errors emitted by the exam session engine and `ExamService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {operation} a session that is {status}")]
    InvalidState {
        status: SessionStatus,
        operation: &'static str,
    },
    #[error("question index {index} is out of range (session has {total} questions)")]
    IndexOutOfRange { index: usize, total: usize },
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
    #[error("answers are already initialized for this session")]
    AlreadyInitialized,
    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
    #[error("pack {0} has no questions")]
    EmptyPack(PackId),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session engine has been shut down")]
    Closed,
    #[error("persisted session state is inconsistent: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl From<TrackerError> for SessionError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::AlreadyInitialized => Self::AlreadyInitialized,
            TrackerError::UnknownQuestion(id) => Self::UnknownQuestion(id),
            other => Self::Corrupt(other.to_string()),
        }
    }
}

impl From<SessionStateError> for SessionError {
    fn from(e: SessionStateError) -> Self {
        match e {
            SessionStateError::InvalidTransition { from, operation } => Self::InvalidState {
                status: from,
                operation,
            },
            other => Self::Corrupt(other.to_string()),
        }
    }
}

/// Errors emitted by `BookmarkService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BookmarkServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

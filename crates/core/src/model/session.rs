use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{PackId, SessionId, UserId};
use crate::scoring::ScoreSummary;

/// Default exam length: 90 minutes.
pub const DEFAULT_EXAM_DURATION_MS: u64 = 90 * 60 * 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("cannot {operation} a session that is {from}")]
    InvalidTransition {
        from: SessionStatus,
        operation: &'static str,
    },

    #[error("invalid session status: {0}")]
    InvalidStatus(String),

    #[error("completed session is missing its completion time")]
    MissingCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "PAUSED" => Ok(Self::Paused),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(SessionStateError::InvalidStatus(other.to_owned())),
        }
    }
}

/// Identifies the printed paper a pack was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Paper {
    pub district: String,
    pub year: i32,
    pub set_name: String,
}

impl Paper {
    #[must_use]
    pub fn new(district: impl Into<String>, year: i32, set_name: impl Into<String>) -> Self {
        Self {
            district: district.into(),
            year,
            set_name: set_name.into(),
        }
    }
}

impl fmt::Display for Paper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.district, self.year, self.set_name)
    }
}

/// A session that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub user_id: UserId,
    pub pack_id: PackId,
    pub paper: Paper,
    pub remaining_ms: u64,
    pub total_questions: u32,
    pub started_at: DateTime<Utc>,
}

impl NewSession {
    /// Promote to a stored session once the gateway has assigned an id.
    #[must_use]
    pub fn assign_id(self, id: SessionId) -> Session {
        Session {
            id,
            user_id: self.user_id,
            pack_id: self.pack_id,
            paper: self.paper,
            status: SessionStatus::InProgress,
            current_index: 0,
            remaining_ms: self.remaining_ms,
            total_questions: self.total_questions,
            outcome: None,
            started_at: self.started_at,
            completed_at: None,
        }
    }
}

/// One exam attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    pack_id: PackId,
    paper: Paper,
    status: SessionStatus,
    current_index: u32,
    remaining_ms: u64,
    total_questions: u32,
    outcome: Option<ScoreSummary>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Rehydrate a session from persisted storage.
    ///
    /// `outcome` is only kept for completed sessions.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::MissingCompletion` if a completed session
    /// has no completion time.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        pack_id: PackId,
        paper: Paper,
        status: SessionStatus,
        current_index: u32,
        remaining_ms: u64,
        total_questions: u32,
        outcome: Option<ScoreSummary>,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionStateError> {
        if status == SessionStatus::Completed && completed_at.is_none() {
            return Err(SessionStateError::MissingCompletion);
        }
        let outcome = if status == SessionStatus::Completed {
            outcome
        } else {
            None
        };

        Ok(Self {
            id,
            user_id,
            pack_id,
            paper,
            status,
            current_index,
            remaining_ms,
            total_questions,
            outcome,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn pack_id(&self) -> PackId {
        self.pack_id
    }

    #[must_use]
    pub fn paper(&self) -> &Paper {
        &self.paper
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&ScoreSummary> {
        self.outcome.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Record the current position and remaining time of a running session.
    ///
    /// Remaining time never increases; a larger value is ignored.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` unless in progress.
    pub fn checkpoint(&mut self, current_index: u32, remaining_ms: u64) -> Result<(), SessionStateError> {
        self.require(SessionStatus::InProgress, "checkpoint")?;
        self.current_index = current_index;
        self.remaining_ms = self.remaining_ms.min(remaining_ms);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` unless in progress.
    pub fn pause(&mut self, current_index: u32, remaining_ms: u64) -> Result<(), SessionStateError> {
        self.checkpoint(current_index, remaining_ms)?;
        self.status = SessionStatus::Paused;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` unless paused.
    pub fn resume(&mut self) -> Result<(), SessionStateError> {
        self.require(SessionStatus::Paused, "resume")?;
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// Finalize the session with its score.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` if already completed.
    pub fn complete(
        &mut self,
        outcome: ScoreSummary,
        remaining_ms: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        if self.status == SessionStatus::Completed {
            return Err(SessionStateError::InvalidTransition {
                from: self.status,
                operation: "complete",
            });
        }
        self.status = SessionStatus::Completed;
        self.remaining_ms = self.remaining_ms.min(remaining_ms);
        self.outcome = Some(outcome);
        self.completed_at = Some(completed_at);
        Ok(())
    }

    fn require(
        &self,
        expected: SessionStatus,
        operation: &'static str,
    ) -> Result<(), SessionStateError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SessionStateError::InvalidTransition {
                from: self.status,
                operation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn session() -> Session {
        NewSession {
            user_id: UserId::new(1),
            pack_id: PackId::new(2),
            paper: Paper::new("Pune", 2023, "Set A"),
            remaining_ms: DEFAULT_EXAM_DURATION_MS,
            total_questions: 100,
            started_at: fixed_now(),
        }
        .assign_id(SessionId::new(3))
    }

    #[test]
    fn new_session_starts_in_progress_at_first_question() {
        let s = session();
        assert_eq!(s.status(), SessionStatus::InProgress);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.remaining_ms(), 5_400_000);
        assert!(s.outcome().is_none());
    }

    #[test]
    fn pause_and_resume_cycle() {
        let mut s = session();
        s.pause(4, 4_800_000).unwrap();
        assert_eq!(s.status(), SessionStatus::Paused);
        assert_eq!(s.current_index(), 4);

        let err = s.pause(4, 4_000_000).unwrap_err();
        assert!(matches!(
            err,
            SessionStateError::InvalidTransition {
                from: SessionStatus::Paused,
                ..
            }
        ));

        s.resume().unwrap();
        assert_eq!(s.status(), SessionStatus::InProgress);
        assert_eq!(s.remaining_ms(), 4_800_000);
    }

    #[test]
    fn checkpoint_never_adds_time() {
        let mut s = session();
        s.checkpoint(1, 4_000_000).unwrap();
        s.checkpoint(2, 4_500_000).unwrap();
        assert_eq!(s.remaining_ms(), 4_000_000);
        assert_eq!(s.current_index(), 2);
    }

    #[test]
    fn resume_requires_paused() {
        let mut s = session();
        assert!(s.resume().is_err());
    }

    #[test]
    fn complete_is_terminal() {
        let mut s = session();
        s.complete(ScoreSummary::default(), 10, fixed_now()).unwrap();
        assert!(s.is_completed());
        assert_eq!(s.completed_at(), Some(fixed_now()));
        assert!(s.complete(ScoreSummary::default(), 0, fixed_now()).is_err());
        assert!(s.resume().is_err());
        assert!(s.checkpoint(0, 0).is_err());
    }

    #[test]
    fn persisted_completed_session_needs_timestamp() {
        let err = Session::from_persisted(
            SessionId::new(1),
            UserId::new(1),
            PackId::new(1),
            Paper::new("Pune", 2023, "Set A"),
            SessionStatus::Completed,
            0,
            0,
            10,
            None,
            fixed_now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, SessionStateError::MissingCompletion);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{QuestionId, SessionId};
use crate::model::question::AnswerOption;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerRecordError {
    #[error("answer for question {0} has a selection but is not answered")]
    SelectionWithoutAnswer(QuestionId),

    #[error("answer for question {0} is answered but has no selection")]
    AnsweredWithoutSelection(QuestionId),

    #[error("invalid answer status: {0}")]
    InvalidStatus(String),
}

/// Forward-only progress of a question within a session.
///
/// Review marking is tracked separately on [`Answer`] because a question can
/// be answered and marked for review at the same time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerStatus {
    NotVisited,
    Visited,
    Answered,
}

impl AnswerStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerStatus::NotVisited => "NOT_VISITED",
            AnswerStatus::Visited => "VISITED",
            AnswerStatus::Answered => "ANSWERED",
        }
    }
}

impl fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerStatus {
    type Err = AnswerRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_VISITED" => Ok(Self::NotVisited),
            "VISITED" => Ok(Self::Visited),
            "ANSWERED" => Ok(Self::Answered),
            other => Err(AnswerRecordError::InvalidStatus(other.to_owned())),
        }
    }
}

/// Per-question record of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    session_id: SessionId,
    question_id: QuestionId,
    selected: Option<AnswerOption>,
    is_correct: bool,
    status: AnswerStatus,
    marked_for_review: bool,
}

impl Answer {
    /// Fresh, unvisited answer row.
    #[must_use]
    pub fn new(session_id: SessionId, question_id: QuestionId) -> Self {
        Self {
            session_id,
            question_id,
            selected: None,
            is_correct: false,
            status: AnswerStatus::NotVisited,
            marked_for_review: false,
        }
    }

    /// Rehydrate an answer from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AnswerRecordError` if the selection and status disagree.
    pub fn from_persisted(
        session_id: SessionId,
        question_id: QuestionId,
        selected: Option<AnswerOption>,
        is_correct: bool,
        status: AnswerStatus,
        marked_for_review: bool,
    ) -> Result<Self, AnswerRecordError> {
        match (status, selected) {
            (AnswerStatus::Answered, None) => {
                return Err(AnswerRecordError::AnsweredWithoutSelection(question_id));
            }
            (AnswerStatus::NotVisited | AnswerStatus::Visited, Some(_)) => {
                return Err(AnswerRecordError::SelectionWithoutAnswer(question_id));
            }
            _ => {}
        }

        Ok(Self {
            session_id,
            question_id,
            selected,
            // correctness only means something once answered
            is_correct: is_correct && status == AnswerStatus::Answered,
            status,
            marked_for_review,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn selected(&self) -> Option<AnswerOption> {
        self.selected
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn status(&self) -> AnswerStatus {
        self.status
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.status == AnswerStatus::Answered
    }

    #[must_use]
    pub fn is_marked_for_review(&self) -> bool {
        self.marked_for_review
    }

    /// Returns true if the status changed.
    pub(crate) fn mark_visited(&mut self) -> bool {
        if self.status == AnswerStatus::NotVisited {
            self.status = AnswerStatus::Visited;
            true
        } else {
            false
        }
    }

    pub(crate) fn record_selection(&mut self, selected: AnswerOption, correct: AnswerOption) {
        self.selected = Some(selected);
        self.is_correct = selected == correct;
        self.status = AnswerStatus::Answered;
    }

    /// Flips the review flag and returns the new value.
    pub(crate) fn toggle_review(&mut self) -> bool {
        self.marked_for_review = !self.marked_for_review;
        self.marked_for_review
    }
}

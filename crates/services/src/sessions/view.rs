use serde::Serialize;

use exam_core::model::{Answer, AnswerStatus, Session, SessionId, SessionStatus};
use exam_core::scoring::ScoreSummary;
use exam_core::tracker::AnswerTracker;

/// Observable state of a session engine, republished after every mutation.
///
/// Remaining time moves every second and is published separately through
/// the timer channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub current_index: usize,
    pub total_questions: usize,
    /// Ordered by question id.
    pub answers: Vec<Answer>,
    pub score: Option<ScoreSummary>,
}

impl SessionView {
    pub(crate) fn build(session: &Session, tracker: &AnswerTracker, total_questions: usize) -> Self {
        Self {
            session_id: session.id(),
            status: session.status(),
            current_index: session.current_index() as usize,
            total_questions,
            answers: tracker.snapshot(),
            score: session.outcome().copied(),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn count_by_status(&self, status: AnswerStatus) -> usize {
        self.answers.iter().filter(|a| a.status() == status).count()
    }

    #[must_use]
    pub fn marked_for_review(&self) -> usize {
        self.answers
            .iter()
            .filter(|a| a.is_marked_for_review())
            .count()
    }
}

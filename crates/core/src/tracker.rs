//! Answer state tracker for one session.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{Answer, AnswerOption, AnswerRecordError, AnswerStatus, QuestionId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("answers are already initialized for this session")]
    AlreadyInitialized,

    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),

    #[error("answer belongs to session {found}, expected {expected}")]
    ForeignSession {
        expected: SessionId,
        found: SessionId,
    },

    #[error(transparent)]
    Record(#[from] AnswerRecordError),
}

/// Holds the per-question answer map for the session being driven.
///
/// Iteration and snapshots are ordered by question id.
#[derive(Debug, Clone)]
pub struct AnswerTracker {
    session_id: SessionId,
    answers: BTreeMap<QuestionId, Answer>,
    initialized: bool,
}

impl AnswerTracker {
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            answers: BTreeMap::new(),
            initialized: false,
        }
    }

    /// Rebuild a tracker from persisted answers.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::ForeignSession` if any answer belongs to another session.
    pub fn from_persisted(
        session_id: SessionId,
        answers: Vec<Answer>,
    ) -> Result<Self, TrackerError> {
        let mut map = BTreeMap::new();
        for answer in answers {
            if answer.session_id() != session_id {
                return Err(TrackerError::ForeignSession {
                    expected: session_id,
                    found: answer.session_id(),
                });
            }
            map.insert(answer.question_id(), answer);
        }
        Ok(Self {
            session_id,
            answers: map,
            initialized: true,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Create one unvisited answer per question and return them in id order.
    ///
    /// Duplicate ids collapse into a single answer.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::AlreadyInitialized` on a second call without `reset`.
    pub fn initialize(
        &mut self,
        question_ids: impl IntoIterator<Item = QuestionId>,
    ) -> Result<Vec<Answer>, TrackerError> {
        if self.initialized {
            return Err(TrackerError::AlreadyInitialized);
        }
        let session_id = self.session_id;
        for id in question_ids {
            self.answers
                .entry(id)
                .or_insert_with(|| Answer::new(session_id, id));
        }
        self.initialized = true;
        Ok(self.snapshot())
    }

    /// Drop every answer so the tracker can be initialized again.
    pub fn reset(&mut self) {
        self.answers.clear();
        self.initialized = false;
    }

    /// Move an unvisited question to `VISITED`.
    ///
    /// Returns the updated answer if the status changed, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownQuestion` for ids outside the session.
    pub fn mark_visited(&mut self, question_id: QuestionId) -> Result<Option<&Answer>, TrackerError> {
        let answer = self.get_mut(question_id)?;
        if answer.mark_visited() {
            Ok(Some(&*answer))
        } else {
            Ok(None)
        }
    }

    /// Record a selection. A later selection for the same question replaces
    /// the earlier one.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownQuestion` for ids outside the session.
    pub fn submit_answer(
        &mut self,
        question_id: QuestionId,
        selected: AnswerOption,
        correct: AnswerOption,
    ) -> Result<&Answer, TrackerError> {
        let answer = self.get_mut(question_id)?;
        answer.record_selection(selected, correct);
        Ok(&*answer)
    }

    /// Flip the review mark without touching the answer itself.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownQuestion` for ids outside the session.
    pub fn toggle_review(&mut self, question_id: QuestionId) -> Result<&Answer, TrackerError> {
        let answer = self.get_mut(question_id)?;
        answer.toggle_review();
        Ok(&*answer)
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&Answer> {
        self.answers.get(&question_id)
    }

    #[must_use]
    pub fn count_by_status(&self, status: AnswerStatus) -> usize {
        self.answers.values().filter(|a| a.status() == status).count()
    }

    #[must_use]
    pub fn count_marked_for_review(&self) -> usize {
        self.answers
            .values()
            .filter(|a| a.is_marked_for_review())
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// All answers ordered by question id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Answer> {
        self.answers.values().cloned().collect()
    }

    fn get_mut(&mut self, question_id: QuestionId) -> Result<&mut Answer, TrackerError> {
        self.answers
            .get_mut(&question_id)
            .ok_or(TrackerError::UnknownQuestion(question_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(range: std::ops::RangeInclusive<u64>) -> Vec<QuestionId> {
        range.map(QuestionId::new).collect()
    }

    fn tracker(n: u64) -> AnswerTracker {
        let mut tracker = AnswerTracker::new(SessionId::new(1));
        tracker.initialize(ids(1..=n)).unwrap();
        tracker
    }

    #[test]
    fn initialize_creates_unvisited_answers_in_id_order() {
        let mut tracker = AnswerTracker::new(SessionId::new(1));
        let created = tracker
            .initialize([3, 1, 2].map(QuestionId::new))
            .unwrap();

        let order: Vec<_> = created.iter().map(|a| a.question_id().value()).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(created.iter().all(|a| a.status() == AnswerStatus::NotVisited));
        assert!(created.iter().all(|a| a.selected().is_none()));
    }

    #[test]
    fn second_initialize_fails_until_reset() {
        let mut tracker = tracker(2);
        let err = tracker.initialize(ids(1..=2)).unwrap_err();
        assert_eq!(err, TrackerError::AlreadyInitialized);

        tracker.reset();
        assert!(tracker.is_empty());
        tracker.initialize(ids(1..=5)).unwrap();
        assert_eq!(tracker.len(), 5);
    }

    #[test]
    fn mark_visited_only_moves_forward_once() {
        let mut tracker = tracker(3);
        let q = QuestionId::new(2);

        assert!(tracker.mark_visited(q).unwrap().is_some());
        assert!(tracker.mark_visited(q).unwrap().is_none());
        assert_eq!(tracker.count_by_status(AnswerStatus::Visited), 1);

        tracker
            .submit_answer(q, AnswerOption::A, AnswerOption::B)
            .unwrap();
        assert!(tracker.mark_visited(q).unwrap().is_none());
        assert_eq!(tracker.get(q).unwrap().status(), AnswerStatus::Answered);
    }

    #[test]
    fn last_submission_wins() {
        let mut tracker = tracker(1);
        let q = QuestionId::new(1);

        tracker
            .submit_answer(q, AnswerOption::A, AnswerOption::C)
            .unwrap();
        assert!(!tracker.get(q).unwrap().is_correct());

        let answer = tracker
            .submit_answer(q, AnswerOption::C, AnswerOption::C)
            .unwrap();
        assert_eq!(answer.selected(), Some(AnswerOption::C));
        assert!(answer.is_correct());
        assert_eq!(tracker.count_by_status(AnswerStatus::Answered), 1);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut tracker = tracker(2);
        let stranger = QuestionId::new(99);
        assert_eq!(
            tracker
                .submit_answer(stranger, AnswerOption::A, AnswerOption::A)
                .unwrap_err(),
            TrackerError::UnknownQuestion(stranger)
        );
        assert!(tracker.mark_visited(stranger).is_err());
        assert!(tracker.toggle_review(stranger).is_err());
    }

    #[test]
    fn review_mark_is_independent_of_answer() {
        let mut tracker = tracker(2);
        let q = QuestionId::new(1);

        tracker
            .submit_answer(q, AnswerOption::D, AnswerOption::D)
            .unwrap();
        let answer = tracker.toggle_review(q).unwrap();
        assert!(answer.is_marked_for_review());
        assert!(answer.is_answered());
        assert_eq!(tracker.count_marked_for_review(), 1);

        let answer = tracker.toggle_review(q).unwrap();
        assert!(!answer.is_marked_for_review());
        assert!(answer.is_correct());
    }

    #[test]
    fn rehydrated_tracker_rejects_reinitialize() {
        let original = tracker(3);
        let mut restored =
            AnswerTracker::from_persisted(SessionId::new(1), original.snapshot()).unwrap();
        assert_eq!(restored.snapshot(), original.snapshot());
        assert_eq!(
            restored.initialize(ids(1..=3)).unwrap_err(),
            TrackerError::AlreadyInitialized
        );
    }

    #[test]
    fn rehydration_rejects_other_sessions() {
        let original = tracker(1);
        let err = AnswerTracker::from_persisted(SessionId::new(2), original.snapshot())
            .unwrap_err();
        assert!(matches!(err, TrackerError::ForeignSession { .. }));
    }
}

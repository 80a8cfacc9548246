//! Persistence gateway contracts and the in-memory backend.
//!
//! The session engine only talks to these traits. Both backends keep one
//! answer row per (session, question) and drop a session's answers when the
//! session is deleted.

use async_trait::async_trait;
use exam_core::model::{
    Answer, Bookmark, NewSession, PackId, Question, QuestionId, Session, SessionId,
    SessionStatus, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read-only question reference data.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Store or replace questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the questions cannot be stored.
    async fn insert_questions(&self, questions: &[Question]) -> Result<(), StorageError>;

    /// Questions of a pack ordered by their number on the paper.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_questions_by_pack(&self, pack_id: PackId) -> Result<Vec<Question>, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn create_session(&self, session: &NewSession) -> Result<SessionId, StorageError>;

    /// Overwrite a stored session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn update_session(&self, session: &Session) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError>;

    /// Sessions of a user in the given status, most recent first.
    ///
    /// Completed sessions are ordered by completion time, others by start time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_sessions(
        &self,
        user_id: UserId,
        status: SessionStatus,
    ) -> Result<Vec<Session>, StorageError>;

    /// Delete a session together with its answers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Insert the initial answer rows of a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a row for the same question exists,
    /// `StorageError::NotFound` if the session is missing.
    async fn insert_answers(&self, answers: &[Answer]) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn update_answer(&self, answer: &Answer) -> Result<(), StorageError>;

    /// Answers of a session ordered by question id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_answers(&self, session_id: SessionId) -> Result<Vec<Answer>, StorageError>;
}

#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the bookmark cannot be stored.
    async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<(), StorageError>;

    /// Returns true if a bookmark was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn remove_bookmark(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn is_bookmarked(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, StorageError>;

    /// Bookmarked questions, newest bookmark first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn bookmarked_questions(&self, user_id: UserId) -> Result<Vec<Question>, StorageError>;
}

#[derive(Default)]
struct MemoryState {
    next_session_id: u64,
    questions: BTreeMap<QuestionId, Question>,
    sessions: HashMap<SessionId, Session>,
    answers: HashMap<SessionId, BTreeMap<QuestionId, Answer>>,
    bookmarks: Vec<Bookmark>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn recency(session: &Session) -> chrono::DateTime<chrono::Utc> {
    session.completed_at().unwrap_or_else(|| session.started_at())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        for question in questions {
            guard.questions.insert(question.id, question.clone());
        }
        Ok(())
    }

    async fn get_questions_by_pack(&self, pack_id: PackId) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<Question> = guard
            .questions
            .values()
            .filter(|q| q.pack_id == pack_id)
            .cloned()
            .collect();
        found.sort_by_key(|q| (q.number, q.id));
        Ok(found)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &NewSession) -> Result<SessionId, StorageError> {
        let mut guard = self.lock()?;
        guard.next_session_id += 1;
        let id = SessionId::new(guard.next_session_id);
        guard.sessions.insert(id, session.clone().assign_id(id));
        Ok(id)
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard
            .sessions
            .get_mut(&session.id())
            .ok_or(StorageError::NotFound)?;
        *slot = session.clone();
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sessions.get(&id).cloned())
    }

    async fn list_sessions(
        &self,
        user_id: UserId,
        status: SessionStatus,
    ) -> Result<Vec<Session>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<Session> = guard
            .sessions
            .values()
            .filter(|s| s.user_id() == user_id && s.status() == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| recency(b).cmp(&recency(a)).then(b.id().cmp(&a.id())));
        Ok(found)
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.remove(&id).ok_or(StorageError::NotFound)?;
        guard.answers.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn insert_answers(&self, answers: &[Answer]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        // validate the whole batch before touching anything
        for (i, answer) in answers.iter().enumerate() {
            if !guard.sessions.contains_key(&answer.session_id()) {
                return Err(StorageError::NotFound);
            }
            let stored = guard
                .answers
                .get(&answer.session_id())
                .is_some_and(|rows| rows.contains_key(&answer.question_id()));
            let repeated = answers[..i].iter().any(|a| {
                a.session_id() == answer.session_id() && a.question_id() == answer.question_id()
            });
            if stored || repeated {
                return Err(StorageError::Conflict);
            }
        }
        for answer in answers {
            guard
                .answers
                .entry(answer.session_id())
                .or_default()
                .insert(answer.question_id(), answer.clone());
        }
        Ok(())
    }

    async fn update_answer(&self, answer: &Answer) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard
            .answers
            .get_mut(&answer.session_id())
            .and_then(|rows| rows.get_mut(&answer.question_id()))
            .ok_or(StorageError::NotFound)?;
        *slot = answer.clone();
        Ok(())
    }

    async fn get_answers(&self, session_id: SessionId) -> Result<Vec<Answer>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers
            .get(&session_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryRepository {
    async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .bookmarks
            .retain(|b| !(b.user_id == bookmark.user_id && b.question_id == bookmark.question_id));
        guard.bookmarks.push(bookmark.clone());
        Ok(())
    }

    async fn remove_bookmark(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.bookmarks.len();
        guard
            .bookmarks
            .retain(|b| !(b.user_id == user_id && b.question_id == question_id));
        Ok(guard.bookmarks.len() != before)
    }

    async fn is_bookmarked(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .bookmarks
            .iter()
            .any(|b| b.user_id == user_id && b.question_id == question_id))
    }

    async fn bookmarked_questions(&self, user_id: UserId) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut marks: Vec<&Bookmark> = guard
            .bookmarks
            .iter()
            .filter(|b| b.user_id == user_id)
            .collect();
        marks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(marks
            .into_iter()
            .filter_map(|b| guard.questions.get(&b.question_id).cloned())
            .collect())
    }
}

/// Aggregates the gateway repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            questions: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            bookmarks: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerOption, Paper, DEFAULT_EXAM_DURATION_MS};
    use exam_core::time::fixed_now;

    fn new_session(user: u64) -> NewSession {
        NewSession {
            user_id: UserId::new(user),
            pack_id: PackId::new(1),
            paper: Paper::new("Pune", 2023, "Set A"),
            remaining_ms: DEFAULT_EXAM_DURATION_MS,
            total_questions: 2,
            started_at: fixed_now(),
        }
    }

    fn question(id: u64, number: u32) -> Question {
        Question {
            id: QuestionId::new(id),
            pack_id: PackId::new(1),
            number,
            text: format!("Q{id}"),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option: AnswerOption::A,
            explanation: String::new(),
        }
    }

    #[tokio::test]
    async fn questions_come_back_in_paper_order() {
        let repo = InMemoryRepository::new();
        repo.insert_questions(&[question(10, 2), question(11, 1)])
            .await
            .unwrap();
        let found = repo.get_questions_by_pack(PackId::new(1)).await.unwrap();
        let numbers: Vec<_> = found.iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(repo
            .get_questions_by_pack(PackId::new(2))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn duplicate_answer_rows_conflict() {
        let repo = InMemoryRepository::new();
        let id = repo.create_session(&new_session(1)).await.unwrap();
        let row = Answer::new(id, QuestionId::new(1));
        repo.insert_answers(&[row.clone()]).await.unwrap();

        let err = repo.insert_answers(&[row]).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn deleting_session_cascades_to_answers() {
        let repo = InMemoryRepository::new();
        let id = repo.create_session(&new_session(1)).await.unwrap();
        repo.insert_answers(&[Answer::new(id, QuestionId::new(1))])
            .await
            .unwrap();

        repo.delete_session(id).await.unwrap();

        assert!(repo.get_session(id).await.unwrap().is_none());
        assert!(repo.get_answers(id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_session(id).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn update_of_missing_session_is_not_found() {
        let repo = InMemoryRepository::new();
        let ghost = new_session(1).assign_id(SessionId::new(42));
        assert!(matches!(
            repo.update_session(&ghost).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn lists_sessions_by_user_and_status() {
        let repo = InMemoryRepository::new();
        let first = repo.create_session(&new_session(1)).await.unwrap();
        let second = repo.create_session(&new_session(1)).await.unwrap();
        repo.create_session(&new_session(2)).await.unwrap();

        let mut paused = repo.get_session(first).await.unwrap().unwrap();
        paused.pause(0, 1_000).unwrap();
        repo.update_session(&paused).await.unwrap();

        let running = repo
            .list_sessions(UserId::new(1), SessionStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id(), second);

        let paused = repo
            .list_sessions(UserId::new(1), SessionStatus::Paused)
            .await
            .unwrap();
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].id(), first);
    }

    #[tokio::test]
    async fn bookmarks_toggle_and_list() {
        let repo = InMemoryRepository::new();
        repo.insert_questions(&[question(1, 1), question(2, 2)])
            .await
            .unwrap();
        let user = UserId::new(5);
        for (q, minutes) in [(1, 0), (2, 1)] {
            repo.insert_bookmark(&Bookmark {
                user_id: user,
                question_id: QuestionId::new(q),
                created_at: fixed_now() + chrono::Duration::minutes(minutes),
            })
            .await
            .unwrap();
        }

        let listed = repo.bookmarked_questions(user).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|q| q.id.value()).collect();
        assert_eq!(ids, vec![2, 1]);

        assert!(repo.remove_bookmark(user, QuestionId::new(2)).await.unwrap());
        assert!(!repo.remove_bookmark(user, QuestionId::new(2)).await.unwrap());
        assert!(!repo.is_bookmarked(user, QuestionId::new(2)).await.unwrap());
        assert!(repo.is_bookmarked(user, QuestionId::new(1)).await.unwrap());
    }
}

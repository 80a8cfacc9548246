use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use exam_core::model::{
    NewSession, PackId, Paper, Question, Session, SessionId, SessionStatus, UserId,
};
use exam_core::{Clock, MonotonicClock};
use storage::repository::{Storage, StorageError};

use super::engine::{EngineDeps, ExamSession, Inner};
use crate::error::SessionError;
use crate::settings::ExamSettings;
use crate::timer::TokioMonotonic;

/// Starts, resumes and lists exam sessions over a `Storage` handle.
///
/// Keeps track of the engines it hands out so that a session is never
/// driven by two engines at once.
#[derive(Clone)]
pub struct ExamService {
    storage: Storage,
    clock: Clock,
    monotonic: Arc<dyn MonotonicClock>,
    settings: ExamSettings,
    live: Arc<Mutex<HashMap<SessionId, Weak<Inner>>>>,
}

impl ExamService {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock) -> Self {
        Self {
            storage,
            clock,
            monotonic: Arc::new(TokioMonotonic),
            settings: ExamSettings::default(),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ExamSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_monotonic_clock(mut self, clock: Arc<dyn MonotonicClock>) -> Self {
        self.monotonic = clock;
        self
    }

    #[must_use]
    pub fn settings(&self) -> ExamSettings {
        self.settings
    }

    /// Start a timed session over every question in `pack_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyPack` if the pack has no questions, or
    /// `SessionError::Persistence` for storage failures.
    pub async fn start_session(
        &self,
        user_id: UserId,
        pack_id: PackId,
        paper: Paper,
    ) -> Result<ExamSession, SessionError> {
        let questions = self.storage.questions.get_questions_by_pack(pack_id).await?;
        if questions.is_empty() {
            return Err(SessionError::EmptyPack(pack_id));
        }
        self.start_session_with_questions(user_id, pack_id, paper, questions)
            .await
    }

    /// Start a timed session over an explicit question list.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DuplicateQuestion` if a question id repeats,
    /// or `SessionError::Persistence` for storage failures.
    pub async fn start_session_with_questions(
        &self,
        user_id: UserId,
        pack_id: PackId,
        paper: Paper,
        questions: Vec<Question>,
    ) -> Result<ExamSession, SessionError> {
        let request = NewSession {
            user_id,
            pack_id,
            paper,
            remaining_ms: self.settings.duration_ms(),
            total_questions: u32::try_from(questions.len()).unwrap_or(u32::MAX),
            started_at: self.clock.now(),
        };
        let session = ExamSession::start(&self.deps(), request, questions).await?;
        self.register(&session);
        Ok(session)
    }

    /// Resume a paused session, reusing its engine if one is still live.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for unknown ids,
    /// `SessionError::InvalidState` unless the session is paused, or
    /// `SessionError::Persistence` for storage failures.
    pub async fn resume_session(&self, session_id: SessionId) -> Result<ExamSession, SessionError> {
        if let Some(live) = self.live_session(session_id) {
            live.resume().await?;
            return Ok(live);
        }

        let session = self
            .storage
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(SessionError::NotFound(session_id))?;
        if session.status() != SessionStatus::Paused {
            return Err(SessionError::InvalidState {
                status: session.status(),
                operation: "resume",
            });
        }

        let questions = self
            .storage
            .questions
            .get_questions_by_pack(session.pack_id())
            .await?;
        let engine = ExamSession::reopen(&self.deps(), session, questions).await?;
        self.register(&engine);
        Ok(engine)
    }

    /// Paused sessions for a user, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Persistence` for storage failures.
    pub async fn paused_sessions(&self, user_id: UserId) -> Result<Vec<Session>, SessionError> {
        Ok(self
            .storage
            .sessions
            .list_sessions(user_id, SessionStatus::Paused)
            .await?)
    }

    /// Completed sessions for a user, most recently completed first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Persistence` for storage failures.
    pub async fn completed_sessions(&self, user_id: UserId) -> Result<Vec<Session>, SessionError> {
        Ok(self
            .storage
            .sessions
            .list_sessions(user_id, SessionStatus::Completed)
            .await?)
    }

    /// Park sessions left in progress by a previous process as paused, at
    /// their last checkpoint. Sessions with a live engine are left alone.
    ///
    /// Returns the ids that were moved.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Persistence` for storage failures.
    pub async fn recover_interrupted(&self, user_id: UserId) -> Result<Vec<SessionId>, SessionError> {
        let stale = self
            .storage
            .sessions
            .list_sessions(user_id, SessionStatus::InProgress)
            .await?;

        let mut recovered = Vec::new();
        for mut session in stale {
            if self.live_session(session.id()).is_some() {
                continue;
            }
            session.pause(session.current_index(), session.remaining_ms())?;
            self.storage.sessions.update_session(&session).await?;
            tracing::warn!(
                "Recovered interrupted session {} with {} ms left",
                session.id(),
                session.remaining_ms()
            );
            recovered.push(session.id());
        }
        Ok(recovered)
    }

    /// Delete a session and its answers, shutting down its engine first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for unknown ids or
    /// `SessionError::Persistence` for storage failures.
    pub async fn delete_session(&self, session_id: SessionId) -> Result<(), SessionError> {
        if let Some(live) = self.live_session(session_id) {
            live.shutdown().await?;
        }
        self.storage
            .sessions
            .delete_session(session_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => SessionError::NotFound(session_id),
                other => other.into(),
            })?;
        self.live_registry().remove(&session_id);
        tracing::info!("Session {session_id} deleted");
        Ok(())
    }

    fn deps(&self) -> EngineDeps {
        EngineDeps {
            sessions: Arc::clone(&self.storage.sessions),
            answers: Arc::clone(&self.storage.answers),
            clock: self.clock,
            monotonic: Arc::clone(&self.monotonic),
        }
    }

    fn live_registry(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Weak<Inner>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_session(&self, session_id: SessionId) -> Option<ExamSession> {
        let live = self.live_registry();
        live.get(&session_id)
            .and_then(ExamSession::upgrade)
            .filter(|s| !s.is_closed())
    }

    fn register(&self, session: &ExamSession) {
        let mut live = self.live_registry();
        live.retain(|_, weak| weak.strong_count() > 0);
        live.insert(session.id(), session.downgrade());
    }
}

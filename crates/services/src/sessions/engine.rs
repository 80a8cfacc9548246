//! Lifecycle engine for one active exam session.
//!
//! ```text
//! IN_PROGRESS -> (PAUSED <-> IN_PROGRESS) -> COMPLETED
//! ```
//!
//! All mutations go through one async mutex, so a manual submit and the
//! timer's auto-submit cannot interleave. Each mutation that moves the
//! question index or remaining time is written through the gateway before
//! it returns.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use exam_core::model::{
    Answer, AnswerOption, NewSession, Question, QuestionId, Session, SessionId, SessionStatus,
};
use exam_core::scoring::{ScoreSummary, score};
use exam_core::tracker::AnswerTracker;
use exam_core::{Clock, MonotonicClock};
use storage::repository::{AnswerRepository, SessionRepository};
use tokio::sync::{Mutex, MutexGuard, watch};

use super::view::SessionView;
use crate::error::SessionError;
use crate::timer::{CountdownTimer, FinishedSignal, TimerSnapshot};

/// Collaborators shared by every engine an `ExamService` creates.
#[derive(Clone)]
pub(crate) struct EngineDeps {
    pub(crate) sessions: Arc<dyn SessionRepository>,
    pub(crate) answers: Arc<dyn AnswerRepository>,
    pub(crate) clock: Clock,
    pub(crate) monotonic: Arc<dyn MonotonicClock>,
}

struct State {
    session: Session,
    tracker: AnswerTracker,
}

pub(crate) struct Inner {
    id: SessionId,
    questions: Vec<Question>,
    positions: HashMap<QuestionId, usize>,
    sessions: Arc<dyn SessionRepository>,
    answers: Arc<dyn AnswerRepository>,
    clock: Clock,
    timer: CountdownTimer,
    state: Mutex<State>,
    views: watch::Sender<SessionView>,
    closed: AtomicBool,
}

/// Handle to a running exam session. Clones drive the same engine.
#[derive(Clone)]
pub struct ExamSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamSession")
            .field("id", &self.inner.id)
            .field("timer", &self.inner.timer)
            .finish_non_exhaustive()
    }
}

impl ExamSession {
    /// Create the session row, its unvisited answers, and start the clock.
    ///
    /// Each question id may appear only once.
    pub(crate) async fn start(
        deps: &EngineDeps,
        request: NewSession,
        questions: Vec<Question>,
    ) -> Result<Self, SessionError> {
        let mut seen = HashSet::with_capacity(questions.len());
        if let Some(repeated) = questions.iter().find(|q| !seen.insert(q.id)) {
            return Err(SessionError::DuplicateQuestion(repeated.id));
        }

        let id = deps.sessions.create_session(&request).await?;
        let session = request.assign_id(id);

        let mut tracker = AnswerTracker::new(id);
        let rows = tracker.initialize(questions.iter().map(|q| q.id))?;
        if let Err(e) = deps.answers.insert_answers(&rows).await {
            tracing::warn!("Answers for session {id} could not be created, discarding it: {e}");
            if let Err(cleanup) = deps.sessions.delete_session(id).await {
                tracing::error!("Failed to discard half-created session {id}: {cleanup}");
            }
            return Err(e.into());
        }

        tracing::info!(
            "Session {id} started: {} questions, {} ms on the clock",
            questions.len(),
            session.remaining_ms()
        );
        Ok(Self::launch(deps, session, tracker, questions))
    }

    /// Reopen a paused session from its persisted checkpoint.
    pub(crate) async fn reopen(
        deps: &EngineDeps,
        mut session: Session,
        questions: Vec<Question>,
    ) -> Result<Self, SessionError> {
        session.resume()?;
        let answers = deps.answers.get_answers(session.id()).await?;
        let tracker = AnswerTracker::from_persisted(session.id(), answers)?;
        deps.sessions.update_session(&session).await?;

        tracing::info!(
            "Session {} resumed at question {} with {} ms left",
            session.id(),
            session.current_index(),
            session.remaining_ms()
        );
        Ok(Self::launch(deps, session, tracker, questions))
    }

    fn launch(
        deps: &EngineDeps,
        session: Session,
        tracker: AnswerTracker,
        questions: Vec<Question>,
    ) -> Self {
        let (timer, finished) = CountdownTimer::new(Arc::clone(&deps.monotonic));
        let (views, _) = watch::channel(SessionView::build(&session, &tracker, questions.len()));
        let positions = questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.id, i))
            .collect();
        let remaining_ms = session.remaining_ms();

        let inner = Arc::new(Inner {
            id: session.id(),
            questions,
            positions,
            sessions: Arc::clone(&deps.sessions),
            answers: Arc::clone(&deps.answers),
            clock: deps.clock,
            timer,
            state: Mutex::new(State { session, tracker }),
            views,
            closed: AtomicBool::new(false),
        });

        tokio::spawn(auto_submit(Arc::downgrade(&inner), finished));
        inner.timer.start(remaining_ms);
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Move to the question at `index`, marking it visited.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless in progress, `IndexOutOfRange` past the last
    /// question, `Persistence` if the checkpoint cannot be written.
    pub async fn navigate_to(&self, index: usize) -> Result<(), SessionError> {
        let mut state = self.lock().await?;
        require_in_progress(&state, "navigate")?;

        let total = self.inner.questions.len();
        let out_of_range = || SessionError::IndexOutOfRange { index, total };
        let question_id = self
            .inner
            .questions
            .get(index)
            .map(|q| q.id)
            .ok_or_else(out_of_range)?;
        let position = u32::try_from(index).map_err(|_| out_of_range())?;

        let mut tracker = state.tracker.clone();
        if let Some(visited) = tracker.mark_visited(question_id)?.cloned() {
            self.inner.answers.update_answer(&visited).await?;
            state.tracker = tracker;
        }

        let mut moved = state.session.clone();
        moved.checkpoint(position, self.inner.timer.remaining_ms())?;
        self.persist(&moved).await?;
        state.session = moved;

        tracing::debug!("Session {} moved to question {index}", self.inner.id);
        self.publish(&state);
        Ok(())
    }

    /// Record `selected` for a question. A later selection replaces an
    /// earlier one.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless in progress, `UnknownQuestion` for questions
    /// outside the session, `Persistence` if the answer cannot be written.
    pub async fn select_answer(
        &self,
        question_id: QuestionId,
        selected: AnswerOption,
    ) -> Result<(), SessionError> {
        let mut state = self.lock().await?;
        require_in_progress(&state, "answer")?;

        let correct = self
            .question(question_id)
            .map(|q| q.correct_option)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        let mut tracker = state.tracker.clone();
        let answer = tracker
            .submit_answer(question_id, selected, correct)?
            .clone();
        self.inner.answers.update_answer(&answer).await?;
        state.tracker = tracker;

        tracing::debug!(
            "Session {} question {question_id}: selected {}",
            self.inner.id,
            selected.as_str()
        );
        self.publish(&state);
        Ok(())
    }

    /// Flip the review mark on a question. Returns whether it is now marked.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless in progress, `UnknownQuestion` for questions
    /// outside the session, `Persistence` if the answer cannot be written.
    pub async fn toggle_review(&self, question_id: QuestionId) -> Result<bool, SessionError> {
        let mut state = self.lock().await?;
        require_in_progress(&state, "mark for review")?;

        let mut tracker = state.tracker.clone();
        let answer = tracker.toggle_review(question_id)?.clone();
        self.inner.answers.update_answer(&answer).await?;
        state.tracker = tracker;

        self.publish(&state);
        Ok(answer.is_marked_for_review())
    }

    /// Freeze the clock and persist the checkpoint. Does nothing unless the
    /// session is in progress.
    ///
    /// # Errors
    ///
    /// `Persistence` if the checkpoint cannot be written.
    pub async fn pause(&self) -> Result<(), SessionError> {
        let mut state = self.lock().await?;
        if state.session.status() != SessionStatus::InProgress {
            tracing::debug!(
                "Pause ignored for session {} ({})",
                self.inner.id,
                state.session.status()
            );
            return Ok(());
        }

        let froze = self.inner.timer.pause().is_some();
        let mut paused = state.session.clone();
        paused.pause(paused.current_index(), self.inner.timer.remaining_ms())?;
        if let Err(e) = self.persist(&paused).await {
            // still in progress, so the clock must keep running
            if froze {
                self.inner.timer.resume();
            }
            return Err(e);
        }
        state.session = paused;

        tracing::info!(
            "Session {} paused with {} ms left",
            self.inner.id,
            state.session.remaining_ms()
        );
        self.publish(&state);
        Ok(())
    }

    /// Continue a paused session on this engine.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless paused, `Persistence` if the status change
    /// cannot be written.
    pub async fn resume(&self) -> Result<(), SessionError> {
        let mut state = self.lock().await?;

        let mut resumed = state.session.clone();
        resumed.resume()?;
        self.persist(&resumed).await?;
        state.session = resumed;
        self.inner.timer.resume();

        tracing::info!(
            "Session {} resumed with {} ms left",
            self.inner.id,
            self.inner.timer.remaining_ms()
        );
        self.publish(&state);
        Ok(())
    }

    /// Submit the session: stop the clock, score the answers, persist the
    /// result.
    ///
    /// Completing an already completed session is a no-op that returns the
    /// stored score.
    ///
    /// # Errors
    ///
    /// `Persistence` if the result cannot be written. The clock stays
    /// stopped and the call may be retried.
    pub async fn complete(&self) -> Result<ScoreSummary, SessionError> {
        let mut state = self.inner.state.lock().await;
        if state.session.is_completed() {
            return Ok(state.session.outcome().copied().unwrap_or_default());
        }
        self.ensure_open()?;

        self.inner.timer.stop();
        let summary = score(&state.tracker.snapshot());
        let mut done = state.session.clone();
        done.complete(
            summary,
            self.inner.timer.remaining_ms(),
            self.inner.clock.now(),
        )?;
        self.persist(&done).await?;
        state.session = done;

        tracing::info!(
            "Session {} completed: {} correct, {} wrong, {} unanswered ({:.2}%)",
            self.inner.id,
            summary.correct,
            summary.wrong,
            summary.unanswered,
            summary.percentage
        );
        self.publish(&state);
        Ok(summary)
    }

    /// Stop this engine without changing the persisted status.
    ///
    /// An in-progress session keeps its status and gets a final checkpoint,
    /// so it can later be recovered and resumed.
    ///
    /// # Errors
    ///
    /// `Persistence` if the final checkpoint cannot be written.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.timer.stop();

        if state.session.status() == SessionStatus::InProgress {
            let mut parked = state.session.clone();
            parked.checkpoint(parked.current_index(), self.inner.timer.remaining_ms())?;
            self.persist(&parked).await?;
            state.session = parked;
        }

        tracing::info!("Session {} engine shut down", self.inner.id);
        Ok(())
    }

    // ── Observers ────────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Questions in paper order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.inner.questions
    }

    #[must_use]
    pub fn question(&self, question_id: QuestionId) -> Option<&Question> {
        self.inner
            .positions
            .get(&question_id)
            .and_then(|&i| self.inner.questions.get(i))
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        self.inner.views.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.views.subscribe()
    }

    #[must_use]
    pub fn timer(&self) -> watch::Receiver<TimerSnapshot> {
        self.inner.timer.subscribe()
    }

    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        self.inner.timer.remaining_ms()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.inner.views.borrow().current_index
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.views.borrow().status
    }

    #[must_use]
    pub fn answers(&self) -> Vec<Answer> {
        self.inner.views.borrow().answers.clone()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.views.borrow().is_completed()
    }

    #[must_use]
    pub fn score(&self) -> Option<ScoreSummary> {
        self.inner.views.borrow().score
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn lock(&self) -> Result<MutexGuard<'_, State>, SessionError> {
        let state = self.inner.state.lock().await;
        self.ensure_open()?;
        Ok(state)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    async fn persist(&self, session: &Session) -> Result<(), SessionError> {
        self.inner
            .sessions
            .update_session(session)
            .await
            .map_err(|e| {
                tracing::warn!("Checkpoint for session {} failed: {e}", session.id());
                SessionError::from(e)
            })
    }

    fn publish(&self, state: &State) {
        self.inner.views.send_replace(SessionView::build(
            &state.session,
            &state.tracker,
            self.inner.questions.len(),
        ));
    }
}

fn require_in_progress(state: &State, operation: &'static str) -> Result<(), SessionError> {
    match state.session.status() {
        SessionStatus::InProgress => Ok(()),
        status => Err(SessionError::InvalidState { status, operation }),
    }
}

async fn auto_submit(inner: Weak<Inner>, finished: FinishedSignal) {
    if !finished.wait().await {
        return;
    }
    let Some(session) = ExamSession::upgrade(&inner) else {
        return;
    };
    tracing::info!("Time is up for session {}, submitting", session.id());
    if let Err(e) = session.complete().await {
        tracing::error!("Auto-submit of session {} failed: {e}", session.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use exam_core::model::{AnswerStatus, PackId, Paper, UserId};
    use exam_core::time::fixed_now;
    use exam_core::timer::TimerState;
    use storage::repository::{Storage, StorageError};
    use tokio::time::sleep;

    use crate::timer::TokioMonotonic;

    /// Session gateway that can be told to fail writes and counts completions.
    struct FlakySessions {
        inner: Arc<dyn SessionRepository>,
        fail_updates: AtomicBool,
        completed_writes: AtomicUsize,
    }

    #[async_trait]
    impl SessionRepository for FlakySessions {
        async fn create_session(&self, session: &NewSession) -> Result<SessionId, StorageError> {
            self.inner.create_session(session).await
        }

        async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("disk unavailable".into()));
            }
            if session.is_completed() {
                self.completed_writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.update_session(session).await
        }

        async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
            self.inner.get_session(id).await
        }

        async fn list_sessions(
            &self,
            user_id: UserId,
            status: SessionStatus,
        ) -> Result<Vec<Session>, StorageError> {
            self.inner.list_sessions(user_id, status).await
        }

        async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
            self.inner.delete_session(id).await
        }
    }

    /// Answer gateway that can be told to fail row updates.
    struct FlakyAnswers {
        inner: Arc<dyn AnswerRepository>,
        fail_updates: AtomicBool,
    }

    #[async_trait]
    impl AnswerRepository for FlakyAnswers {
        async fn insert_answers(&self, answers: &[Answer]) -> Result<(), StorageError> {
            self.inner.insert_answers(answers).await
        }

        async fn update_answer(&self, answer: &Answer) -> Result<(), StorageError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("disk unavailable".into()));
            }
            self.inner.update_answer(answer).await
        }

        async fn get_answers(&self, session_id: SessionId) -> Result<Vec<Answer>, StorageError> {
            self.inner.get_answers(session_id).await
        }
    }

    struct Harness {
        storage: Storage,
        sessions: Arc<FlakySessions>,
        answers: Arc<FlakyAnswers>,
        deps: EngineDeps,
    }

    fn harness() -> Harness {
        let storage = Storage::in_memory();
        let sessions = Arc::new(FlakySessions {
            inner: Arc::clone(&storage.sessions),
            fail_updates: AtomicBool::new(false),
            completed_writes: AtomicUsize::new(0),
        });
        let answers = Arc::new(FlakyAnswers {
            inner: Arc::clone(&storage.answers),
            fail_updates: AtomicBool::new(false),
        });
        let deps = EngineDeps {
            sessions: sessions.clone(),
            answers: answers.clone(),
            clock: Clock::fixed(fixed_now()),
            monotonic: Arc::new(TokioMonotonic),
        };
        Harness {
            storage,
            sessions,
            answers,
            deps,
        }
    }

    fn questions(correct: &[AnswerOption]) -> Vec<Question> {
        correct
            .iter()
            .enumerate()
            .map(|(i, &correct_option)| {
                let n = i as u64 + 1;
                Question {
                    id: QuestionId::new(n),
                    pack_id: PackId::new(1),
                    number: n as u32,
                    text: format!("Question {n}"),
                    options: ["w".into(), "x".into(), "y".into(), "z".into()],
                    correct_option,
                    explanation: String::new(),
                }
            })
            .collect()
    }

    fn request(remaining_ms: u64, total: usize) -> NewSession {
        NewSession {
            user_id: UserId::new(1),
            pack_id: PackId::new(1),
            paper: Paper::new("Pune", 2023, "Set A"),
            remaining_ms,
            total_questions: total as u32,
            started_at: fixed_now(),
        }
    }

    async fn start(h: &Harness, remaining_ms: u64, correct: &[AnswerOption]) -> ExamSession {
        ExamSession::start(&h.deps, request(remaining_ms, correct.len()), questions(correct))
            .await
            .unwrap()
    }

    async fn stored(h: &Harness, id: SessionId) -> Session {
        h.storage.sessions.get_session(id).await.unwrap().unwrap()
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn start_persists_session_and_unvisited_answers() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 3]).await;

        let row = stored(&h, session.id()).await;
        assert_eq!(row.status(), SessionStatus::InProgress);
        assert_eq!(row.remaining_ms(), 5_400_000);
        assert_eq!(row.current_index(), 0);

        let answers = h.storage.answers.get_answers(session.id()).await.unwrap();
        assert_eq!(answers.len(), 3);
        assert!(answers.iter().all(|a| a.status() == AnswerStatus::NotVisited));
        assert_eq!(session.timer().borrow().state, TimerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_checkpoints_and_freezes_the_clock() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 3]).await;

        sleep(10 * MINUTE + Duration::from_millis(500)).await;
        assert_eq!(session.remaining_ms(), 4_800_000);

        session.pause().await.unwrap();
        let row = stored(&h, session.id()).await;
        assert_eq!(row.status(), SessionStatus::Paused);
        assert_eq!(row.remaining_ms(), 4_800_000);

        sleep(5 * MINUTE).await;
        assert_eq!(session.remaining_ms(), 4_800_000);

        session.resume().await.unwrap();
        sleep(MINUTE + Duration::from_millis(250)).await;
        assert_eq!(session.remaining_ms(), 4_740_000);
        assert_eq!(stored(&h, session.id()).await.status(), SessionStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn navigating_twice_marks_visited_once() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::B; 100]).await;

        session.navigate_to(7).await.unwrap();
        session.navigate_to(7).await.unwrap();

        let view = session.view();
        assert_eq!(view.current_index, 7);
        assert_eq!(view.count_by_status(AnswerStatus::Visited), 1);
        assert_eq!(view.count_by_status(AnswerStatus::NotVisited), 99);

        let answers = h.storage.answers.get_answers(session.id()).await.unwrap();
        assert_eq!(answers[7].status(), AnswerStatus::Visited);
        assert_eq!(stored(&h, session.id()).await.current_index(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_checkpoints_remaining_time() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::B; 5]).await;

        sleep(MINUTE + Duration::from_millis(500)).await;
        session.navigate_to(2).await.unwrap();
        assert_eq!(stored(&h, session.id()).await.remaining_ms(), 5_340_000);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_past_the_last_question_is_rejected() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::B; 4]).await;

        let err = session.navigate_to(4).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::IndexOutOfRange { index: 4, total: 4 }
        ));
        assert_eq!(session.current_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn answers_before_submit_are_scored() {
        let h = harness();
        let session = start(
            &h,
            5_400_000,
            &[
                AnswerOption::A,
                AnswerOption::C,
                AnswerOption::B,
                AnswerOption::D,
            ],
        )
        .await;

        session
            .select_answer(QuestionId::new(1), AnswerOption::A)
            .await
            .unwrap();
        session
            .select_answer(QuestionId::new(2), AnswerOption::B)
            .await
            .unwrap();
        assert!(session.toggle_review(QuestionId::new(4)).await.unwrap());

        let summary = session.complete().await.unwrap();
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.answered(), 2);
        assert_eq!(summary.wrong, 1);
        assert_eq!(summary.unanswered, 2);
        assert!((summary.percentage - 25.0).abs() < f64::EPSILON);

        let row = stored(&h, session.id()).await;
        assert_eq!(row.status(), SessionStatus::Completed);
        assert_eq!(row.outcome().copied(), Some(summary));
        assert_eq!(row.completed_at(), Some(fixed_now()));
        assert_eq!(session.timer().borrow().state, TimerState::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn changing_an_answer_keeps_the_last_choice() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::C]).await;

        session
            .select_answer(QuestionId::new(1), AnswerOption::A)
            .await
            .unwrap();
        session
            .select_answer(QuestionId::new(1), AnswerOption::C)
            .await
            .unwrap();

        let answers = h.storage.answers.get_answers(session.id()).await.unwrap();
        assert_eq!(answers[0].selected(), Some(AnswerOption::C));
        assert!(answers[0].is_correct());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_question_is_rejected() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 2]).await;

        let err = session
            .select_answer(QuestionId::new(99), AnswerOption::A)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownQuestion(q) if q == QuestionId::new(99)));
        let err = session.toggle_review(QuestionId::new(99)).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownQuestion(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submits_complete_once() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 2]).await;
        session
            .select_answer(QuestionId::new(1), AnswerOption::A)
            .await
            .unwrap();

        let (first, second) = tokio::join!(session.complete(), session.complete());
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(h.sessions.completed_writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_submits_once_and_manual_submit_becomes_a_noop() {
        let h = harness();
        let session = start(&h, 3_000, &[AnswerOption::A; 2]).await;
        let mut views = session.subscribe();

        views.wait_for(SessionView::is_completed).await.unwrap();
        assert_eq!(session.remaining_ms(), 0);

        let again = session.complete().await.unwrap();
        assert_eq!(Some(again), session.score());
        assert_eq!(h.sessions.completed_writes.load(Ordering::SeqCst), 1);
        assert_eq!(stored(&h, session.id()).await.remaining_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_session_rejects_mutations() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 2]).await;
        session.complete().await.unwrap();

        assert!(matches!(
            session
                .select_answer(QuestionId::new(1), AnswerOption::A)
                .await
                .unwrap_err(),
            SessionError::InvalidState {
                status: SessionStatus::Completed,
                ..
            }
        ));
        assert!(matches!(
            session.navigate_to(1).await.unwrap_err(),
            SessionError::InvalidState { .. }
        ));
        assert!(matches!(
            session.resume().await.unwrap_err(),
            SessionError::InvalidState { .. }
        ));
        // pausing a finished session is silently ignored
        session.pause().await.unwrap();
        assert!(session.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn paused_session_rejects_answers() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 2]).await;
        session.pause().await.unwrap();
        session.pause().await.unwrap();

        assert!(matches!(
            session
                .select_answer(QuestionId::new(1), AnswerOption::A)
                .await
                .unwrap_err(),
            SessionError::InvalidState {
                status: SessionStatus::Paused,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_is_allowed_from_paused() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 2]).await;
        session.pause().await.unwrap();

        session.complete().await.unwrap();
        assert_eq!(stored(&h, session.id()).await.status(), SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_auto_submit_leaves_the_timer_finished() {
        let h = harness();
        let session = start(&h, 2_000, &[AnswerOption::A; 2]).await;
        h.sessions.fail_updates.store(true, Ordering::SeqCst);

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(session.timer().borrow().state, TimerState::Finished);
        assert!(!session.is_completed());

        sleep(MINUTE).await;
        assert_eq!(session.timer().borrow().state, TimerState::Finished);
        assert_eq!(session.remaining_ms(), 0);

        h.sessions.fail_updates.store(false, Ordering::SeqCst);
        session.complete().await.unwrap();
        assert_eq!(stored(&h, session.id()).await.status(), SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_checkpoint_surfaces_to_the_caller() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 3]).await;
        h.sessions.fail_updates.store(true, Ordering::SeqCst);

        let err = session.navigate_to(1).await.unwrap_err();
        assert!(matches!(err, SessionError::Persistence(_)));
        assert_eq!(session.current_index(), 0);

        assert!(matches!(
            session.pause().await.unwrap_err(),
            SessionError::Persistence(_)
        ));
        assert_eq!(session.status(), SessionStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pause_keeps_the_clock_running() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 3]).await;
        sleep(Duration::from_millis(10_500)).await;
        h.sessions.fail_updates.store(true, Ordering::SeqCst);

        assert!(matches!(
            session.pause().await.unwrap_err(),
            SessionError::Persistence(_)
        ));
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.timer().borrow().state, TimerState::Running);

        sleep(MINUTE + Duration::from_millis(250)).await;
        assert_eq!(session.remaining_ms(), 5_330_000);

        h.sessions.fail_updates.store(false, Ordering::SeqCst);
        session.pause().await.unwrap();
        assert_eq!(stored(&h, session.id()).await.remaining_ms(), 5_330_000);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_answer_writes_leave_the_tracker_untouched() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 2]).await;
        h.answers.fail_updates.store(true, Ordering::SeqCst);

        assert!(matches!(
            session
                .select_answer(QuestionId::new(1), AnswerOption::A)
                .await
                .unwrap_err(),
            SessionError::Persistence(_)
        ));
        assert!(matches!(
            session.toggle_review(QuestionId::new(1)).await.unwrap_err(),
            SessionError::Persistence(_)
        ));
        assert!(matches!(
            session.navigate_to(1).await.unwrap_err(),
            SessionError::Persistence(_)
        ));

        let view = session.view();
        assert_eq!(view.count_by_status(AnswerStatus::NotVisited), 2);
        assert_eq!(view.marked_for_review(), 0);
        assert_eq!(view.current_index, 0);

        h.answers.fail_updates.store(false, Ordering::SeqCst);
        session.navigate_to(1).await.unwrap();
        let answers = h.storage.answers.get_answers(session.id()).await.unwrap();
        assert_eq!(answers[1].status(), AnswerStatus::Visited);

        let summary = session.complete().await.unwrap();
        assert_eq!(summary.correct, 0);
        assert_eq!(summary.unanswered, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_question_ids_are_rejected() {
        let h = harness();
        let mut list = questions(&[AnswerOption::A; 3]);
        list[2].id = QuestionId::new(1);

        let err = ExamSession::start(&h.deps, request(5_400_000, 3), list)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::DuplicateQuestion(q) if q == QuestionId::new(1)));
        let rows = h
            .storage
            .sessions
            .list_sessions(UserId::new(1), SessionStatus::InProgress)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_remaining_submits_immediately() {
        let h = harness();
        let session = start(&h, 0, &[AnswerOption::A]).await;
        let mut views = session.subscribe();

        views.wait_for(SessionView::is_completed).await.unwrap();
        let row = stored(&h, session.id()).await;
        assert_eq!(row.status(), SessionStatus::Completed);
        assert_eq!(row.outcome().map(|o| o.unanswered), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_the_session_in_progress() {
        let h = harness();
        let session = start(&h, 5_400_000, &[AnswerOption::A; 2]).await;
        sleep(Duration::from_millis(30_500)).await;

        session.shutdown().await.unwrap();
        assert!(session.is_closed());

        let row = stored(&h, session.id()).await;
        assert_eq!(row.status(), SessionStatus::InProgress);
        assert_eq!(row.remaining_ms(), 5_370_000);

        assert!(matches!(
            session.navigate_to(0).await.unwrap_err(),
            SessionError::Closed
        ));
        sleep(MINUTE).await;
        assert_eq!(session.remaining_ms(), 5_370_000);
    }
}

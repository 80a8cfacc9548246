use std::sync::Arc;

use exam_core::model::{Bookmark, Question, QuestionId, UserId};
use storage::repository::BookmarkRepository;

use crate::Clock;
use crate::error::BookmarkServiceError;

/// Saves questions a learner wants to revisit outside a session.
#[derive(Clone)]
pub struct BookmarkService {
    clock: Clock,
    bookmarks: Arc<dyn BookmarkRepository>,
}

impl BookmarkService {
    #[must_use]
    pub fn new(clock: Clock, bookmarks: Arc<dyn BookmarkRepository>) -> Self {
        Self { clock, bookmarks }
    }

    /// Bookmark the question, or remove the bookmark if it exists.
    ///
    /// Returns `true` when the question is bookmarked afterwards.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkServiceError::Storage` for storage failures.
    pub async fn toggle(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, BookmarkServiceError> {
        if self.bookmarks.remove_bookmark(user_id, question_id).await? {
            tracing::debug!("Bookmark removed for question {question_id}");
            return Ok(false);
        }
        self.bookmarks
            .insert_bookmark(&Bookmark {
                user_id,
                question_id,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::debug!("Bookmark added for question {question_id}");
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns `BookmarkServiceError::Storage` for storage failures.
    pub async fn is_bookmarked(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, BookmarkServiceError> {
        Ok(self.bookmarks.is_bookmarked(user_id, question_id).await?)
    }

    /// Bookmarked questions, newest bookmark first.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkServiceError::Storage` for storage failures.
    pub async fn bookmarked_questions(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Question>, BookmarkServiceError> {
        Ok(self.bookmarks.bookmarked_questions(user_id).await?)
    }
}

use exam_core::model::{Bookmark, Question, QuestionId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_question_row};
use crate::repository::{BookmarkRepository, StorageError};

#[async_trait::async_trait]
impl BookmarkRepository for SqliteRepository {
    async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO bookmarks (user_id, question_id, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id, question_id) DO UPDATE SET created_at = excluded.created_at
            ",
        )
        .bind(id_to_i64("user_id", bookmark.user_id.value())?)
        .bind(id_to_i64("question_id", bookmark.question_id.value())?)
        .bind(bookmark.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn remove_bookmark(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM bookmarks WHERE user_id = ?1 AND question_id = ?2")
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("question_id", question_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }

    async fn is_bookmarked(
        &self,
        user_id: UserId,
        question_id: QuestionId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM bookmarks WHERE user_id = ?1 AND question_id = ?2")
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("question_id", question_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn bookmarked_questions(&self, user_id: UserId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    q.id, q.pack_id, q.question_no, q.question_text,
                    q.option_a, q.option_b, q.option_c, q.option_d,
                    q.correct_option, q.explanation
                FROM questions q
                INNER JOIN bookmarks b ON b.question_id = q.id
                WHERE b.user_id = ?1
                ORDER BY b.created_at DESC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}

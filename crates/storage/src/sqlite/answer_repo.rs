use exam_core::model::{Answer, SessionId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_answer_row, option_to_str};
use crate::repository::{AnswerRepository, StorageError};

fn insert_error(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation => return StorageError::Conflict,
            sqlx::error::ErrorKind::ForeignKeyViolation => return StorageError::NotFound,
            _ => {}
        }
    }
    conn(e)
}

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn insert_answers(&self, answers: &[Answer]) -> Result<(), StorageError> {
        // all rows or none, so a session never starts with a partial answer set
        let mut tx = self.pool.begin().await.map_err(conn)?;

        for answer in answers {
            sqlx::query(
                r"
                    INSERT INTO answers (
                        session_id, question_id, selected_option,
                        is_correct, answer_status, marked_for_review
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(id_to_i64("session_id", answer.session_id().value())?)
            .bind(id_to_i64("question_id", answer.question_id().value())?)
            .bind(option_to_str(answer.selected()))
            .bind(answer.is_correct())
            .bind(answer.status().as_str())
            .bind(answer.is_marked_for_review())
            .execute(&mut *tx)
            .await
            .map_err(insert_error)?;
        }

        tx.commit().await.map_err(conn)
    }

    async fn update_answer(&self, answer: &Answer) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE answers SET
                    selected_option = ?3,
                    is_correct = ?4,
                    answer_status = ?5,
                    marked_for_review = ?6
                WHERE session_id = ?1 AND question_id = ?2
            ",
        )
        .bind(id_to_i64("session_id", answer.session_id().value())?)
        .bind(id_to_i64("question_id", answer.question_id().value())?)
        .bind(option_to_str(answer.selected()))
        .bind(answer.is_correct())
        .bind(answer.status().as_str())
        .bind(answer.is_marked_for_review())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_answers(&self, session_id: SessionId) -> Result<Vec<Answer>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    session_id, question_id, selected_option,
                    is_correct, answer_status, marked_for_review
                FROM answers
                WHERE session_id = ?1
                ORDER BY question_id ASC
            ",
        )
        .bind(id_to_i64("session_id", session_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_answer_row).collect()
    }
}

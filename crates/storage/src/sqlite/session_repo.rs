use exam_core::model::{NewSession, Session, SessionId, SessionStatus, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_session_row, session_id_from_i64};
use crate::repository::{SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    id, user_id, pack_id, district, year, set_name, status,
    current_question_idx, remaining_time_ms, total_questions,
    correct_count, wrong_count, unanswered_count, score_percentage,
    started_at, completed_at
";

fn ms_to_i64(v: u64) -> Result<i64, StorageError> {
    id_to_i64("remaining_time_ms", v)
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &NewSession) -> Result<SessionId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO sessions (
                    user_id, pack_id, district, year, set_name, status,
                    current_question_idx, remaining_time_ms, total_questions, started_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, 'IN_PROGRESS', 0, ?6, ?7, ?8)
            ",
        )
        .bind(id_to_i64("user_id", session.user_id.value())?)
        .bind(id_to_i64("pack_id", session.pack_id.value())?)
        .bind(&session.paper.district)
        .bind(session.paper.year)
        .bind(&session.paper.set_name)
        .bind(ms_to_i64(session.remaining_ms)?)
        .bind(i64::from(session.total_questions))
        .bind(session.started_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        session_id_from_i64(res.last_insert_rowid())
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let outcome = session.outcome().copied().unwrap_or_default();

        let res = sqlx::query(
            r"
                UPDATE sessions SET
                    status = ?2,
                    current_question_idx = ?3,
                    remaining_time_ms = ?4,
                    correct_count = ?5,
                    wrong_count = ?6,
                    unanswered_count = ?7,
                    score_percentage = ?8,
                    completed_at = ?9
                WHERE id = ?1
            ",
        )
        .bind(id_to_i64("session_id", session.id().value())?)
        .bind(session.status().as_str())
        .bind(i64::from(session.current_index()))
        .bind(ms_to_i64(session.remaining_ms())?)
        .bind(i64::from(outcome.correct))
        .bind(i64::from(outcome.wrong))
        .bind(i64::from(outcome.unanswered))
        .bind(outcome.percentage)
        .bind(session.completed_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("session_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn list_sessions(
        &self,
        user_id: UserId,
        status: SessionStatus,
    ) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE user_id = ?1 AND status = ?2
             ORDER BY COALESCE(completed_at, started_at) DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id_to_i64("session_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

use exam_core::model::{PackId, Question};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_question_row};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        for q in questions {
            let [a, b, c, d] = &q.options;
            sqlx::query(
                r"
                    INSERT INTO questions (
                        id, pack_id, question_no, question_text,
                        option_a, option_b, option_c, option_d,
                        correct_option, explanation
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(id) DO UPDATE SET
                        pack_id = excluded.pack_id,
                        question_no = excluded.question_no,
                        question_text = excluded.question_text,
                        option_a = excluded.option_a,
                        option_b = excluded.option_b,
                        option_c = excluded.option_c,
                        option_d = excluded.option_d,
                        correct_option = excluded.correct_option,
                        explanation = excluded.explanation
                ",
            )
            .bind(id_to_i64("question_id", q.id.value())?)
            .bind(id_to_i64("pack_id", q.pack_id.value())?)
            .bind(i64::from(q.number))
            .bind(&q.text)
            .bind(a)
            .bind(b)
            .bind(c)
            .bind(d)
            .bind(q.correct_option.as_str())
            .bind(&q.explanation)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)
    }

    async fn get_questions_by_pack(&self, pack_id: PackId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, pack_id, question_no, question_text,
                    option_a, option_b, option_c, option_d,
                    correct_option, explanation
                FROM questions
                WHERE pack_id = ?1
                ORDER BY question_no ASC, id ASC
            ",
        )
        .bind(id_to_i64("pack_id", pack_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}

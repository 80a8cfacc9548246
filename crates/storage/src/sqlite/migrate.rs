use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the consolidated migration for the current schema.
///
/// Creates questions, sessions, answers (cascading from sessions),
/// bookmarks, and their indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    pack_id INTEGER NOT NULL,
                    question_no INTEGER NOT NULL CHECK (question_no >= 0),
                    question_text TEXT NOT NULL,
                    option_a TEXT NOT NULL,
                    option_b TEXT NOT NULL,
                    option_c TEXT NOT NULL,
                    option_d TEXT NOT NULL,
                    correct_option TEXT NOT NULL CHECK (correct_option IN ('A', 'B', 'C', 'D')),
                    explanation TEXT NOT NULL DEFAULT ''
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    pack_id INTEGER NOT NULL,
                    district TEXT NOT NULL,
                    year INTEGER NOT NULL,
                    set_name TEXT NOT NULL,
                    status TEXT NOT NULL CHECK (status IN ('IN_PROGRESS', 'PAUSED', 'COMPLETED')),
                    current_question_idx INTEGER NOT NULL CHECK (current_question_idx >= 0),
                    remaining_time_ms INTEGER NOT NULL CHECK (remaining_time_ms >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    correct_count INTEGER NOT NULL DEFAULT 0 CHECK (correct_count >= 0),
                    wrong_count INTEGER NOT NULL DEFAULT 0 CHECK (wrong_count >= 0),
                    unanswered_count INTEGER NOT NULL DEFAULT 0 CHECK (unanswered_count >= 0),
                    score_percentage REAL NOT NULL DEFAULT 0,
                    started_at TEXT NOT NULL,
                    completed_at TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS answers (
                    session_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    selected_option TEXT NOT NULL DEFAULT ''
                        CHECK (selected_option IN ('', 'A', 'B', 'C', 'D')),
                    is_correct INTEGER NOT NULL DEFAULT 0,
                    answer_status TEXT NOT NULL
                        CHECK (answer_status IN ('NOT_VISITED', 'VISITED', 'ANSWERED')),
                    marked_for_review INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (session_id, question_id),
                    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS bookmarks (
                    user_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, question_id),
                    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_pack_no
                    ON questions (pack_id, question_no);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_user_status
                    ON sessions (user_id, status);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_bookmarks_user_created
                    ON bookmarks (user_id, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}

use exam_core::model::{
    Answer, AnswerOption, AnswerStatus, PackId, Paper, Question, QuestionId, Session,
    SessionId, SessionStatus, UserId,
};
use exam_core::scoring::ScoreSummary;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

/// Stored as `''` when nothing is selected.
pub(crate) fn option_to_str(option: Option<AnswerOption>) -> &'static str {
    option.map_or("", AnswerOption::as_str)
}

fn option_from_str(raw: &str) -> Result<Option<AnswerOption>, StorageError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let correct: String = row.try_get("correct_option").map_err(ser)?;
    Ok(Question {
        id: QuestionId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        pack_id: PackId::new(i64_to_u64("pack_id", row.try_get("pack_id").map_err(ser)?)?),
        number: u32_from_i64("question_no", row.try_get("question_no").map_err(ser)?)?,
        text: row.try_get("question_text").map_err(ser)?,
        options: [
            row.try_get("option_a").map_err(ser)?,
            row.try_get("option_b").map_err(ser)?,
            row.try_get("option_c").map_err(ser)?,
            row.try_get("option_d").map_err(ser)?,
        ],
        correct_option: correct.parse().map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    let status: SessionStatus = status.parse().map_err(ser)?;
    let total_questions = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;

    let outcome = ScoreSummary {
        total: total_questions,
        correct: u32_from_i64("correct_count", row.try_get("correct_count").map_err(ser)?)?,
        wrong: u32_from_i64("wrong_count", row.try_get("wrong_count").map_err(ser)?)?,
        unanswered: u32_from_i64(
            "unanswered_count",
            row.try_get("unanswered_count").map_err(ser)?,
        )?,
        percentage: row.try_get("score_percentage").map_err(ser)?,
    };

    Session::from_persisted(
        session_id_from_i64(row.try_get("id").map_err(ser)?)?,
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        PackId::new(i64_to_u64("pack_id", row.try_get("pack_id").map_err(ser)?)?),
        Paper {
            district: row.try_get("district").map_err(ser)?,
            year: row.try_get("year").map_err(ser)?,
            set_name: row.try_get("set_name").map_err(ser)?,
        },
        status,
        u32_from_i64(
            "current_question_idx",
            row.try_get("current_question_idx").map_err(ser)?,
        )?,
        i64_to_u64("remaining_time_ms", row.try_get("remaining_time_ms").map_err(ser)?)?,
        total_questions,
        Some(outcome),
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<Answer, StorageError> {
    let selected: String = row.try_get("selected_option").map_err(ser)?;
    let status: String = row.try_get("answer_status").map_err(ser)?;
    let status: AnswerStatus = status.parse().map_err(ser)?;

    Answer::from_persisted(
        session_id_from_i64(row.try_get("session_id").map_err(ser)?)?,
        QuestionId::new(i64_to_u64("question_id", row.try_get("question_id").map_err(ser)?)?),
        option_from_str(&selected)?,
        row.try_get("is_correct").map_err(ser)?,
        status,
        row.try_get("marked_for_review").map_err(ser)?,
    )
    .map_err(ser)
}

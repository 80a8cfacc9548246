use std::io::Write;

use chrono::{DateTime, Utc};
use exam_core::model::{AnswerOption, PackId, Paper, Question, QuestionId, SessionId, UserId};
use exam_core::scoring::PerformanceBand;
use exam_core::time::format_remaining;
use serde::Serialize;
use services::{BookmarkService, Clock, ExamService};
use storage::repository::Storage;

pub const DEMO_PACK: PackId = PackId::new(1);

const DEMO_QUESTIONS: [(&str, [&str; 4], AnswerOption, &str); 5] = [
    (
        "Which river is known as the Dakshin Ganga?",
        ["Krishna", "Godavari", "Kaveri", "Tapi"],
        AnswerOption::B,
        "The Godavari is the longest river of peninsular India.",
    ),
    (
        "How many districts does Maharashtra have?",
        ["32", "34", "36", "38"],
        AnswerOption::C,
        "Maharashtra has 36 districts.",
    ),
    (
        "Which article of the Constitution abolishes untouchability?",
        ["Article 14", "Article 17", "Article 21", "Article 32"],
        AnswerOption::B,
        "Article 17 abolishes untouchability.",
    ),
    (
        "What is 15% of 240?",
        ["32", "34", "36", "38"],
        AnswerOption::C,
        "240 x 0.15 = 36.",
    ),
    (
        "Which city is the winter capital of Maharashtra?",
        ["Pune", "Nagpur", "Nashik", "Aurangabad"],
        AnswerOption::B,
        "The winter session of the legislature sits in Nagpur.",
    ),
];

fn demo_pack() -> Vec<Question> {
    DEMO_QUESTIONS
        .iter()
        .zip(1u32..)
        .map(|((text, options, correct, explanation), number)| Question {
            id: QuestionId::new(u64::from(number)),
            pack_id: DEMO_PACK,
            number,
            text: (*text).to_string(),
            options: options.map(str::to_string),
            correct_option: *correct,
            explanation: (*explanation).to_string(),
        })
        .collect()
}

/// Insert the demo question pack.
pub async fn seed(storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let questions = demo_pack();
    storage.questions.insert_questions(&questions).await?;
    tracing::info!("Seeded pack {DEMO_PACK} with {} questions", questions.len());
    Ok(())
}

pub async fn paused(service: &ExamService, user_id: UserId) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = service.paused_sessions(user_id).await?;
    let mut out = std::io::stdout().lock();
    if sessions.is_empty() {
        writeln!(out, "no paused tests")?;
    }
    for session in sessions {
        writeln!(
            out,
            "#{} {}  question {}/{}  {} left",
            session.id(),
            session.paper(),
            session.current_index() + 1,
            session.total_questions(),
            format_remaining(session.remaining_ms())
        )?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct HistoryLine<'a> {
    session_id: SessionId,
    paper: &'a Paper,
    completed_at: Option<DateTime<Utc>>,
    correct: u32,
    wrong: u32,
    unanswered: u32,
    percentage: f64,
    accuracy: f64,
    band: PerformanceBand,
}

/// Completed sessions as JSON lines, newest first.
pub async fn history(service: &ExamService, user_id: UserId) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = service.completed_sessions(user_id).await?;
    let mut out = std::io::stdout().lock();
    for session in &sessions {
        let score = session.outcome().copied().unwrap_or_default();
        let line = HistoryLine {
            session_id: session.id(),
            paper: session.paper(),
            completed_at: session.completed_at(),
            correct: score.correct,
            wrong: score.wrong,
            unanswered: score.unanswered,
            percentage: score.percentage,
            accuracy: score.accuracy(),
            band: score.band(),
        };
        serde_json::to_writer(&mut out, &line)?;
        writeln!(out)?;
    }
    Ok(())
}

pub async fn recover(service: &ExamService, user_id: UserId) -> Result<(), Box<dyn std::error::Error>> {
    let recovered = service.recover_interrupted(user_id).await?;
    println!("recovered {} interrupted session(s)", recovered.len());
    Ok(())
}

pub async fn bookmarks(
    storage: &Storage,
    clock: Clock,
    user_id: UserId,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = BookmarkService::new(clock, storage.bookmarks.clone());
    let questions = service.bookmarked_questions(user_id).await?;
    let mut out = std::io::stdout().lock();
    for q in questions {
        writeln!(
            out,
            "{} (pack {}, #{}): {}",
            q.id, q.pack_id, q.number, q.text
        )?;
    }
    Ok(())
}

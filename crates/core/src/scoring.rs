//! Scoring engine.
//!
//! `score` is a pure function of an answer snapshot. Only `ANSWERED`
//! records can be correct (enforced by [`Answer`]), so
//! `wrong = answered - correct` never goes negative.

use serde::{Deserialize, Serialize};

use crate::model::Answer;

/// Aggregate result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    pub unanswered: u32,
    /// `correct / total * 100`, unrounded; 0 when there are no questions.
    pub percentage: f64,
}

/// Coarse performance tier shown with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceBand {
    Outstanding,
    Great,
    Good,
    KeepPracticing,
    DontStop,
}

impl ScoreSummary {
    #[must_use]
    pub fn answered(&self) -> u32 {
        self.correct + self.wrong
    }

    /// Share of attempted questions answered correctly, in percent.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let answered = self.answered();
        if answered == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(answered) * 100.0
        }
    }

    #[must_use]
    pub fn band(&self) -> PerformanceBand {
        match self.percentage {
            p if p >= 90.0 => PerformanceBand::Outstanding,
            p if p >= 75.0 => PerformanceBand::Great,
            p if p >= 60.0 => PerformanceBand::Good,
            p if p >= 40.0 => PerformanceBand::KeepPracticing,
            _ => PerformanceBand::DontStop,
        }
    }
}

/// Compute the score for an answer snapshot.
#[must_use]
pub fn score(answers: &[Answer]) -> ScoreSummary {
    let mut correct = 0_u32;
    let mut answered = 0_u32;

    for answer in answers.iter().filter(|a| a.is_answered()) {
        answered = answered.saturating_add(1);
        if answer.is_correct() {
            correct = correct.saturating_add(1);
        }
    }

    let total = u32::try_from(answers.len()).unwrap_or(u32::MAX);
    let percentage = if total == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(total) * 100.0
    };

    ScoreSummary {
        total,
        correct,
        wrong: answered - correct,
        unanswered: total - answered,
        percentage,
    }
}

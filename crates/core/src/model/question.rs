use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{PackId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid answer option: {raw:?}")]
pub struct ParseOptionError {
    pub raw: String,
}

/// One of the four choices of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }

    fn index(self) -> usize {
        match self {
            AnswerOption::A => 0,
            AnswerOption::B => 1,
            AnswerOption::C => 2,
            AnswerOption::D => 3,
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing is case-insensitive and ignores surrounding whitespace, so
/// `"c"` and `" C "` both select `C`.
impl FromStr for AnswerOption {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            _ => Err(ParseOptionError { raw: s.to_owned() }),
        }
    }
}

/// Read-only question supplied by a content pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub pack_id: PackId,
    /// Position of the question on the printed paper (1-based).
    pub number: u32,
    pub text: String,
    pub options: [String; 4],
    pub correct_option: AnswerOption,
    pub explanation: String,
}

impl Question {
    #[must_use]
    pub fn option_text(&self, option: AnswerOption) -> &str {
        &self.options[option.index()]
    }
}

mod answer;
mod bookmark;
mod ids;
mod question;
mod session;

pub use ids::{PackId, ParseIdError, QuestionId, SessionId, UserId};

pub use answer::{Answer, AnswerRecordError, AnswerStatus};
pub use bookmark::Bookmark;
pub use question::{AnswerOption, ParseOptionError, Question};
pub use session::{
    DEFAULT_EXAM_DURATION_MS, NewSession, Paper, Session, SessionStateError, SessionStatus,
};

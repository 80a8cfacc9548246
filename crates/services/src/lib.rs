#![forbid(unsafe_code)]

pub mod bookmark_service;
pub mod error;
pub mod sessions;
pub mod settings;
pub mod timer;

pub use exam_core::Clock;

pub use bookmark_service::BookmarkService;
pub use error::{BookmarkServiceError, SessionError};
pub use sessions::{ExamService, ExamSession, SessionView};
pub use settings::ExamSettings;
pub use timer::{CountdownTimer, FinishedSignal, TimerSnapshot, TokioMonotonic};

mod engine;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::ExamSession;
pub use view::SessionView;
pub use workflow::ExamService;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, UserId};

/// A question saved by a learner for later revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub created_at: DateTime<Utc>,
}

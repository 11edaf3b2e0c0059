//! Record types persisted by the [`RecordStore`](super::RecordStore).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format used for task deadlines on disk and in commands.
pub const DEADLINE_FORMAT: &str = "%Y-%m-%d";

/// A registered team member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Unique username (map key on disk).
    pub username: String,
    /// Chat that receives this member's reminders.
    pub chat_id: i64,
}

/// On-disk value of a member entry; the username is the map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MemberEntry {
    pub chat_id: i64,
}

/// A task with a due date and an assignee.
///
/// `chat_id` is copied from the assignee when the task is created and is
/// never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Free-form task description.
    #[serde(rename = "task")]
    pub description: String,
    /// Deadline as stored (`YYYY-MM-DD`). Parsed lazily by the reminder engine.
    pub deadline: String,
    /// Username of the assignee.
    pub assigned_to: String,
    /// Chat that receives reminders for this task.
    #[serde(default)]
    pub chat_id: Option<i64>,
}

impl Task {
    pub fn new(
        description: impl Into<String>,
        deadline: NaiveDate,
        assigned_to: impl Into<String>,
        chat_id: i64,
    ) -> Self {
        Self {
            description: description.into(),
            deadline: deadline.format(DEADLINE_FORMAT).to_string(),
            assigned_to: assigned_to.into(),
            chat_id: Some(chat_id),
        }
    }

    /// Parse the stored deadline.
    pub fn deadline_date(&self) -> Result<NaiveDate, chrono::ParseError> {
        parse_deadline(&self.deadline)
    }

    /// Chat to notify, ignoring the `0` placeholder some records carry.
    pub fn reminder_chat(&self) -> Option<i64> {
        self.chat_id.filter(|id| *id != 0)
    }
}

/// Parse a `YYYY-MM-DD` deadline.
pub fn parse_deadline(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value.trim(), DEADLINE_FORMAT)
}

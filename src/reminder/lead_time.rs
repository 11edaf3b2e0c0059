//! Fixed lead-time boundaries and their reminder texts.

use crate::store::Task;

/// A day offset before a deadline at which a reminder is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadTime {
    /// Seven days before the deadline.
    Week,
    /// Two days before the deadline.
    TwoDays,
    /// The day before the deadline.
    Tomorrow,
    /// The deadline itself.
    Today,
}

impl LeadTime {
    /// All boundaries, furthest first.
    pub const ALL: [LeadTime; 4] = [Self::Week, Self::TwoDays, Self::Tomorrow, Self::Today];

    /// Boundary for a day delta. Anything outside the table (including
    /// overdue, negative deltas) has no reminder.
    pub fn from_days_left(days_left: i64) -> Option<Self> {
        match days_left {
            7 => Some(Self::Week),
            2 => Some(Self::TwoDays),
            1 => Some(Self::Tomorrow),
            0 => Some(Self::Today),
            _ => None,
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::TwoDays => 2,
            Self::Tomorrow => 1,
            Self::Today => 0,
        }
    }

    /// Short phrase used inside the reminder text.
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Week => "due in a week",
            Self::TwoDays => "due in two days",
            Self::Tomorrow => "due tomorrow",
            Self::Today => "due today",
        }
    }

    /// Full chat message for `task` at this boundary.
    pub fn message(self, task: &Task) -> String {
        match self {
            Self::Today => format!("🚨 Alert: task '{}' is {}!", task.description, self.phrase()),
            _ => format!(
                "📌 Reminder: task '{}' is {} ({}).",
                task.description,
                self.phrase(),
                task.deadline
            ),
        }
    }
}

impl std::fmt::Display for LeadTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.phrase())
    }
}

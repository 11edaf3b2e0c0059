//! One reminder pass over the task collection.
//!
//! A pass computes `deadline - today` for every task, maps the delta to a
//! [`LeadTime`], and sends at most one message per dedup key. The dedup set
//! lives only for the duration of the pass.

use crate::channels::traits::Notifier;
use crate::reminder::lead_time::LeadTime;
use crate::store::Task;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Identity of one notification: (description, deadline, days left).
///
/// The assignee and chat are not part of the key: two tasks that share
/// description and deadline collapse into one reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub description: String,
    pub deadline: String,
    pub days_left: i64,
}

impl ReminderKey {
    pub fn new(task: &Task, days_left: i64) -> Self {
        Self {
            description: task.description.clone(),
            deadline: task.deadline.clone(),
            days_left,
        }
    }
}

/// Per-task failure recorded during a pass. Operator-facing only.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    /// The stored deadline is not a `YYYY-MM-DD` date.
    #[error("task '{description}': invalid deadline '{deadline}': {source}")]
    InvalidDeadline {
        description: String,
        deadline: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The notifier reported a failure.
    #[error("task '{description}': delivery to chat {chat_id} failed: {reason}")]
    Delivery {
        description: String,
        chat_id: i64,
        reason: String,
    },

    /// The notifier did not answer within the send timeout.
    #[error("task '{description}': delivery to chat {chat_id} timed out after {timeout:?}")]
    Timeout {
        description: String,
        chat_id: i64,
        timeout: Duration,
    },
}

/// Outcome of one pass.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Notifications delivered successfully.
    pub sent: usize,
    /// Delivery attempts, successful or not.
    pub attempted: usize,
    /// Tasks skipped because their dedup key was already used this pass.
    pub suppressed: usize,
    /// Per-task failures.
    pub errors: Vec<ReminderError>,
}

/// Decides which tasks need a reminder today and delivers them.
#[derive(Clone)]
pub struct ReminderEngine {
    notifier: Arc<dyn Notifier>,
    send_timeout: Duration,
}

impl ReminderEngine {
    pub fn new(notifier: Arc<dyn Notifier>, send_timeout: Duration) -> Self {
        Self {
            notifier,
            send_timeout,
        }
    }

    /// Run one pass over `tasks` as of `today`.
    ///
    /// Never fails as a whole: malformed tasks and delivery failures are
    /// logged, recorded in the report, and the pass moves on.
    pub async fn run_reminder_pass(&self, tasks: &[Task], today: NaiveDate) -> PassReport {
        let mut report = PassReport::default();
        let mut reminded: HashSet<ReminderKey> = HashSet::new();

        for task in tasks {
            let deadline = match task.deadline_date() {
                Ok(date) => date,
                Err(source) => {
                    let err = ReminderError::InvalidDeadline {
                        description: task.description.clone(),
                        deadline: task.deadline.clone(),
                        source,
                    };
                    warn!("skipping task in reminder pass: {err}");
                    report.errors.push(err);
                    continue;
                }
            };

            let days_left = (deadline - today).num_days();
            let Some(lead) = LeadTime::from_days_left(days_left) else {
                continue;
            };
            let Some(chat_id) = task.reminder_chat() else {
                debug!(
                    "task '{}' is {lead} but has no chat to notify",
                    task.description
                );
                continue;
            };

            if !reminded.insert(ReminderKey::new(task, days_left)) {
                debug!(
                    "suppressing duplicate reminder for '{}' ({})",
                    task.description, task.deadline
                );
                report.suppressed += 1;
                continue;
            }

            report.attempted += 1;
            let text = lead.message(task);
            match tokio::time::timeout(self.send_timeout, self.notifier.send(chat_id, &text)).await
            {
                Ok(Ok(())) => {
                    report.sent += 1;
                    info!(
                        "sent reminder for task '{}' to {} (chat_id: {chat_id})",
                        task.description, task.assigned_to
                    );
                }
                Ok(Err(e)) => {
                    let err = ReminderError::Delivery {
                        description: task.description.clone(),
                        chat_id,
                        reason: e.to_string(),
                    };
                    error!("{err}");
                    report.errors.push(err);
                }
                Err(_) => {
                    let err = ReminderError::Timeout {
                        description: task.description.clone(),
                        chat_id,
                        timeout: self.send_timeout,
                    };
                    error!("{err}");
                    report.errors.push(err);
                }
            }
        }

        report
    }
}

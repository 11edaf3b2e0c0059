//! Daily reminder scheduler.
//!
//! Polls the local wall clock and runs a [`ReminderJob`] once per day at the
//! configured time, independently of command handling.

pub mod runner;
pub mod trigger;

pub use runner::{PassOutcome, ReminderJob, ReminderScheduler};
pub use trigger::DailyTrigger;

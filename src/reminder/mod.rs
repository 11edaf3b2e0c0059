//! Due-date reminders at fixed lead times (7, 2, 1 and 0 days).

pub mod engine;
pub mod lead_time;
pub mod service;

pub use engine::{PassReport, ReminderEngine, ReminderError, ReminderKey};
pub use lead_time::LeadTime;
pub use service::ReminderService;

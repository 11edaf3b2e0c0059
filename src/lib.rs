//! taskminder: a chat bot that tracks team tasks and sends due-date reminders.
//!
//! # Architecture
//!
//! Two long-running loops share only the record store and the notifier:
//! - **Command runtime** ([`channels`], [`commands`]): receives chat messages
//!   from Telegram, registers members and tasks, and replies.
//! - **Reminder scheduler** ([`scheduler`], [`reminder`]): once a day at the
//!   configured time, reads all tasks and reminds assignees 7, 2, 1 and 0
//!   days before each deadline.
//!
//! Records live in two JSON files ([`store`]) that are rewritten atomically
//! on every change.

pub mod app;
pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod reminder;
pub mod scheduler;
pub mod store;

pub use config::BotConfig;
pub use error::{BotError, Result};

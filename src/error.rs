//! Error types for the task reminder bot.

/// Top-level error type for taskminder.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Missing or invalid configuration (fatal at startup).
    #[error("config error: {0}")]
    Config(String),

    /// Record file could not be read, parsed, or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record was rejected before being written.
    #[error("validation error: {0}")]
    Validation(String),

    /// A reminder pass was aborted before it produced a report.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;

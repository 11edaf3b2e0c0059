//! Scheduled job that loads tasks from the store and runs a pass.

use crate::error::BotError;
use crate::reminder::engine::{PassReport, ReminderEngine};
use crate::scheduler::ReminderJob;
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::info;

/// Reminder job backed by the record store.
pub struct ReminderService {
    store: RecordStore,
    engine: ReminderEngine,
}

impl ReminderService {
    pub fn new(store: RecordStore, engine: ReminderEngine) -> Self {
        Self { store, engine }
    }
}

#[async_trait]
impl ReminderJob for ReminderService {
    async fn run_pass(&self, today: NaiveDate) -> crate::Result<PassReport> {
        let store = self.store.clone();
        let tasks = tokio::task::spawn_blocking(move || store.load_tasks())
            .await
            .map_err(|e| BotError::Storage(format!("task load aborted: {e}")))?;
        info!("reminder pass for {today} over {} tasks", tasks.len());
        let report = self.engine.run_reminder_pass(&tasks, today).await;
        info!(
            "reminder pass for {today} done: {} sent, {} duplicates suppressed, {} errors",
            report.sent,
            report.suppressed,
            report.errors.len()
        );
        Ok(report)
    }
}

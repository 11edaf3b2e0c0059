//! Scheduler background loop.
//!
//! Spawns a tokio task that polls the wall clock and runs the reminder job
//! once per day at the configured time. The loop is independent of the
//! command runtime and only shares the record store and notifier with it.

use crate::config::DailyTime;
use crate::error::BotError;
use crate::reminder::PassReport;
use crate::scheduler::trigger::DailyTrigger;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Default interval between wall-clock polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Work performed on each daily tick.
#[async_trait]
pub trait ReminderJob: Send + Sync {
    /// Run one reminder pass for `today`.
    async fn run_pass(&self, today: NaiveDate) -> crate::Result<PassReport>;
}

/// Result of one fired tick, published to observers.
#[derive(Debug)]
pub enum PassOutcome {
    /// The job returned a report.
    Completed { date: NaiveDate, report: PassReport },
    /// The job returned an error or panicked.
    Failed { date: NaiveDate, error: String },
}

/// Background timer that drives the reminder job.
pub struct ReminderScheduler {
    trigger: DailyTrigger,
    poll_interval: Duration,
    job: Arc<dyn ReminderJob>,
    /// Optional observer channel for pass outcomes.
    result_tx: Option<mpsc::UnboundedSender<PassOutcome>>,
}

impl ReminderScheduler {
    /// Create a scheduler firing daily at `at`, starting from the current local time.
    pub fn new(at: DailyTime, job: Arc<dyn ReminderJob>) -> Self {
        Self::with_trigger(DailyTrigger::new(at, local_now()), job)
    }

    /// Create a scheduler around an explicit trigger.
    pub fn with_trigger(trigger: DailyTrigger, job: Arc<dyn ReminderJob>) -> Self {
        Self {
            trigger,
            poll_interval: DEFAULT_POLL_INTERVAL,
            job,
            result_tx: None,
        }
    }

    /// Override the wall-clock poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Publish each pass outcome on `tx`.
    pub fn with_result_channel(mut self, tx: mpsc::UnboundedSender<PassOutcome>) -> Self {
        self.result_tx = Some(tx);
        self
    }

    pub fn next_fire(&self) -> NaiveDateTime {
        self.trigger.next_fire()
    }

    /// Start the scheduler background loop. It runs until the task is aborted.
    pub fn run(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "reminder scheduler started; next pass at {}",
                self.trigger.next_fire()
            );
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                self.tick_at(local_now()).await;
            }
        })
    }

    /// Fire the job if `now` has reached the trigger. Returns `true` when a pass ran.
    pub async fn tick_at(&mut self, now: NaiveDateTime) -> bool {
        let Some(today) = self.trigger.poll(now) else {
            return false;
        };

        let outcome = self.execute(today).await;
        debug!("next reminder pass at {}", self.trigger.next_fire());

        if let Some(tx) = &self.result_tx
            && tx.send(outcome).is_err()
        {
            debug!("pass outcome channel closed, no longer publishing");
            self.result_tx = None;
        }
        true
    }

    /// Run the job on its own task so a panic is contained to this pass.
    async fn execute(&self, today: NaiveDate) -> PassOutcome {
        let job = Arc::clone(&self.job);
        match tokio::spawn(async move { job.run_pass(today).await }).await {
            Ok(Ok(report)) => PassOutcome::Completed {
                date: today,
                report,
            },
            Ok(Err(e)) => {
                error!("reminder pass for {today} failed: {e}");
                PassOutcome::Failed {
                    date: today,
                    error: e.to_string(),
                }
            }
            Err(e) => {
                let e = BotError::Scheduler(format!("reminder pass for {today} aborted: {e}"));
                error!("{e}");
                PassOutcome::Failed {
                    date: today,
                    error: e.to_string(),
                }
            }
        }
    }
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::sync::Mutex;

    /// Records each date it ran for and behaves according to `mode`.
    struct ScriptedJob {
        runs: Mutex<Vec<NaiveDate>>,
        mode: Mode,
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Ok,
        Fail,
        Panic,
    }

    impl ScriptedJob {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                runs: Mutex::new(Vec::new()),
                mode,
            })
        }
    }

    #[async_trait]
    impl ReminderJob for ScriptedJob {
        async fn run_pass(&self, today: NaiveDate) -> crate::Result<PassReport> {
            self.runs.lock().unwrap().push(today);
            match self.mode {
                Mode::Ok => Ok(PassReport {
                    sent: 1,
                    attempted: 1,
                    ..Default::default()
                }),
                Mode::Fail => Err(BotError::Storage("store exploded".to_owned())),
                Mode::Panic => panic!("job panicked"),
            }
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn scheduler(job: Arc<ScriptedJob>) -> (ReminderScheduler, mpsc::UnboundedReceiver<PassOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let trigger = DailyTrigger::new(DailyTime::new(9, 0).unwrap(), at("2025-07-13 08:00:00"));
        (
            ReminderScheduler::with_trigger(trigger, job).with_result_channel(tx),
            rx,
        )
    }

    #[tokio::test]
    async fn tick_runs_job_once_per_day() {
        let job = ScriptedJob::new(Mode::Ok);
        let (mut scheduler, mut rx) = scheduler(Arc::clone(&job));

        assert!(!scheduler.tick_at(at("2025-07-13 08:59:00")).await);
        assert!(scheduler.tick_at(at("2025-07-13 09:00:00")).await);
        assert!(!scheduler.tick_at(at("2025-07-13 09:00:01")).await);
        assert!(!scheduler.tick_at(at("2025-07-13 09:00:59")).await);
        assert!(scheduler.tick_at(at("2025-07-14 09:00:00")).await);

        let runs = job.runs.lock().unwrap().clone();
        assert_eq!(
            runs,
            vec![
                NaiveDate::from_ymd_opt(2025, 7, 13).unwrap(),
                NaiveDate::from_ymd_opt(2025, 7, 14).unwrap()
            ]
        );

        let first = rx.try_recv().expect("outcome");
        assert!(matches!(first, PassOutcome::Completed { report, .. } if report.sent == 1));
    }

    #[tokio::test]
    async fn failed_pass_is_reported_and_schedule_continues() {
        let job = ScriptedJob::new(Mode::Fail);
        let (mut scheduler, mut rx) = scheduler(Arc::clone(&job));

        assert!(scheduler.tick_at(at("2025-07-13 09:00:00")).await);
        assert!(matches!(
            rx.try_recv().unwrap(),
            PassOutcome::Failed { ref error, .. } if error.contains("store exploded")
        ));

        assert!(scheduler.tick_at(at("2025-07-14 09:00:00")).await);
        assert_eq!(job.runs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn panicking_pass_is_contained() {
        let job = ScriptedJob::new(Mode::Panic);
        let (mut scheduler, mut rx) = scheduler(Arc::clone(&job));

        assert!(scheduler.tick_at(at("2025-07-13 09:00:00")).await);
        assert!(matches!(
            rx.try_recv().unwrap(),
            PassOutcome::Failed { ref error, .. } if error.starts_with("scheduler error") && error.contains("aborted")
        ));

        assert!(scheduler.tick_at(at("2025-07-14 09:00:00")).await);
        assert!(matches!(rx.try_recv().unwrap(), PassOutcome::Failed { .. }));
        assert_eq!(job.runs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn closed_observer_does_not_stop_schedule() {
        let job = ScriptedJob::new(Mode::Ok);
        let (mut scheduler, rx) = scheduler(Arc::clone(&job));
        drop(rx);

        assert!(scheduler.tick_at(at("2025-07-13 09:00:00")).await);
        assert!(scheduler.tick_at(at("2025-07-14 09:00:00")).await);
        assert_eq!(job.runs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn run_starts_and_fires_due_trigger() {
        let job = ScriptedJob::new(Mode::Ok);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let trigger =
            DailyTrigger::with_next_fire(DailyTime::new(9, 0).unwrap(), at("2000-01-01 09:00:00"));
        let handle = ReminderScheduler::with_trigger(trigger, job)
            .with_poll_interval(Duration::from_millis(10))
            .with_result_channel(tx)
            .run();

        let result = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(
            result,
            Ok(Some(PassOutcome::Completed { .. }))
        ));

        handle.abort();
    }
}

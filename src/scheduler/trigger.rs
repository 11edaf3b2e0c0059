//! Daily wall-clock trigger.

use crate::config::DailyTime;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Fires once per calendar day at a fixed local time.
///
/// The next fire time is always strictly after the moment it was computed,
/// so a trigger created after today's time has passed waits for tomorrow.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    at: NaiveTime,
    next_fire: NaiveDateTime,
}

impl DailyTrigger {
    /// Trigger at `at`, with the first fire computed relative to `now`.
    pub fn new(at: DailyTime, now: NaiveDateTime) -> Self {
        let at = at.as_naive_time();
        Self {
            at,
            next_fire: next_occurrence(at, now),
        }
    }

    /// Trigger with an explicit first fire time.
    pub fn with_next_fire(at: DailyTime, next_fire: NaiveDateTime) -> Self {
        Self {
            at: at.as_naive_time(),
            next_fire,
        }
    }

    pub fn next_fire(&self) -> NaiveDateTime {
        self.next_fire
    }

    /// Returns the date to run for when `now` has reached the fire time,
    /// and moves the trigger to its next occurrence.
    pub fn poll(&mut self, now: NaiveDateTime) -> Option<NaiveDate> {
        if now < self.next_fire {
            return None;
        }
        self.next_fire = next_occurrence(self.at, now);
        Some(now.date())
    }
}

fn next_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        return today;
    }
    now.date()
        .succ_opt()
        .unwrap_or(NaiveDate::MAX)
        .and_time(at)
}

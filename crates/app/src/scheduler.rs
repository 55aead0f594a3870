//! Daily job scheduling.
//!
//! Each job fires once a day at a fixed UTC time of day. A run that is
//! still in progress when the next tick arrives causes that tick to be
//! skipped, so the same expired rows are never processed twice at once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, TimeDelta};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use netalloc_domain::time::{self, Timestamp};

/// A fixed UTC time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    #[must_use]
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// Parse an `HH:MM` time of day.
    ///
    /// # Errors
    ///
    /// Returns a [`chrono::ParseError`] for anything else.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        NaiveTime::parse_from_str(value, "%H:%M").map(Self::new)
    }

    #[must_use]
    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// First run strictly after `now`.
    #[must_use]
    pub fn next_after(&self, now: Timestamp) -> Timestamp {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }

    /// Time to wait from `now` until the next run.
    #[must_use]
    pub fn delay_after(&self, now: Timestamp) -> Duration {
        (self.next_after(now) - now).to_std().unwrap_or_default()
    }
}

/// Lets at most one run of a job be active at a time.
#[derive(Debug)]
pub struct SingleFlight {
    name: &'static str,
    gate: Mutex<()>,
}

impl SingleFlight {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            gate: Mutex::new(()),
        }
    }

    /// Run `job` unless a previous run is still active.
    ///
    /// Returns `None` when the run was skipped.
    pub async fn run<T>(&self, job: impl Future<Output = T>) -> Option<T> {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::warn!(job = self.name, "previous run still active, skipping");
            return None;
        };
        Some(job.await)
    }
}

/// Spawn a background task that runs `job` every day at `schedule`.
///
/// Each run is spawned on its own so a slow run does not delay the timer;
/// ticks that overlap a running job are skipped.
pub fn spawn_daily<F, Fut>(name: &'static str, schedule: DailySchedule, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let flight = Arc::new(SingleFlight::new(name));
    let job = Arc::new(job);
    tokio::spawn(async move {
        loop {
            let delay = schedule.delay_after(time::now());
            tracing::debug!(job = name, delay_secs = delay.as_secs(), "next run scheduled");
            tokio::time::sleep(delay).await;

            let flight = Arc::clone(&flight);
            let job = Arc::clone(&job);
            tokio::spawn(async move {
                tracing::info!(job = name, "scheduled run started");
                if flight.run(job()).await.is_some() {
                    tracing::info!(job = name, "scheduled run finished");
                }
            });
        }
    })
}

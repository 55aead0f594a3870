//! Clock port — the single source of "today" for every date comparison.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Days, NaiveTime};

use netalloc_domain::time::{self, Date, Timestamp};

/// Provides the current calendar date and instant.
pub trait Clock {
    fn today(&self) -> Date;

    fn now(&self) -> Timestamp;
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        time::today()
    }

    fn now(&self) -> Timestamp {
        time::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same date, so a test can keep a handle and advance
/// time under a running service.
#[derive(Debug, Clone)]
pub struct ManualClock {
    date: Arc<Mutex<Date>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(date: Date) -> Self {
        Self {
            date: Arc::new(Mutex::new(date)),
        }
    }

    pub fn set(&self, date: Date) {
        *self.date.lock().unwrap_or_else(PoisonError::into_inner) = date;
    }

    /// Move the date forward by `days`.
    pub fn advance(&self, days: u64) {
        let mut date = self.date.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = date.checked_add_days(Days::new(days)) {
            *date = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> Date {
        *self.date.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> Timestamp {
        self.today().and_time(NaiveTime::MIN).and_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn should_share_date_between_clones() {
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2025, 1, 30).unwrap());
        let handle = clock.clone();

        handle.advance(3);

        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2025, 2, 2).unwrap()
        );
        assert_eq!(clock.now().date_naive(), clock.today());
    }
}

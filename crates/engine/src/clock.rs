//! Source of the current calendar date
//!
//! The registry never reads the wall clock itself; every operation takes
//! `today` from a `Clock`. Production uses `LocalClock` (process-local
//! calendar date) or `UtcClock`; tests inject a `FixedClock` and move it
//! by hand to simulate day rollover.

use chrono::{Days, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use std::fmt;

/// Supplies today's date
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current calendar date
    fn today(&self) -> NaiveDate;
}

/// Process-local calendar date
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// UTC calendar date
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Manually driven clock
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    /// Clock stopped at `date`
    pub fn new(date: NaiveDate) -> Self {
        FixedClock {
            date: Mutex::new(date),
        }
    }

    /// Move to `date` (forwards or backwards)
    pub fn set(&self, date: NaiveDate) {
        *self.date.lock() = date;
    }

    /// Move forward by `days`
    pub fn advance_days(&self, days: u64) {
        let mut date = self.date.lock();
        *date = date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock()
    }
}

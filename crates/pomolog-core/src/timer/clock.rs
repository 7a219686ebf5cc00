//! Interval clock.
//!
//! Pure helpers that turn a phase length into an absolute deadline and a
//! deadline into the time still remaining. The engine never reads the
//! system time itself; callers hand it `now` through a [`Clock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// One minute in milliseconds.
pub const MINUTE_MS: i64 = 60_000;

/// Deadline of a phase of `minutes` length that starts at `now`.
pub fn deadline_after(now: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    now + minutes_to_duration(minutes)
}

/// Deadline of a resumed phase: `now + remaining`.
pub fn deadline_from_remaining(now: DateTime<Utc>, remaining_ms: u64) -> DateTime<Utc> {
    now + Duration::milliseconds(i64::try_from(remaining_ms).unwrap_or(i64::MAX / 2))
}

/// `max(0, deadline - now)` in milliseconds.
pub fn remaining_ms(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let diff = (deadline - now).num_milliseconds();
    u64::try_from(diff).unwrap_or(0)
}

pub fn minutes_to_duration(minutes: u32) -> Duration {
    Duration::milliseconds(i64::from(minutes) * MINUTE_MS)
}

pub fn minutes_to_ms(minutes: u32) -> u64 {
    u64::from(minutes) * MINUTE_MS as u64
}

/// Render a remaining duration as zero-padded `MM:SS`.
///
/// Seconds are floored, so `00:00` only shows once the phase is over.
/// Minutes are not wrapped into hours: a 90 minute phase shows `90:00`.
pub fn format_mmss(remaining_ms: u64) -> String {
    let total_secs = remaining_ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Source of the current wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time, so a
/// test can keep a handle while a `Tracker` owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.epoch_ms.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.epoch_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.epoch_ms.load(Ordering::SeqCst))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

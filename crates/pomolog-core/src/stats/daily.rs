//! Daily Work volume and day-over-day improvement.
//!
//! A session belongs to the calendar day of its end time in the caller's
//! time zone. Only Work sessions count towards volume.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::session::SessionRecord;

/// Category names with their own volume columns.
pub const JOB_CATEGORY: &str = "Job";
pub const PERSONAL_CATEGORY: &str = "Personal";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total_work_minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyImprovement {
    pub improvement_percent: f64,
    pub today_volume: f64,
    pub previous_day_volume: f64,
    pub today_job_volume: f64,
    pub previous_day_job_volume: f64,
    pub today_personal_volume: f64,
    pub previous_day_personal_volume: f64,
}

/// Everything a dashboard needs after a batch is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub totals: Vec<DailyTotal>,
    pub improvement: DailyImprovement,
}

impl StatsSnapshot {
    /// Totals for the last `days` days plus the improvement figures.
    pub fn from_sessions<'a, I, Tz>(sessions: I, today: NaiveDate, days: u32, tz: &Tz) -> Self
    where
        I: IntoIterator<Item = &'a SessionRecord>,
        Tz: TimeZone,
    {
        let by_day = DayVolumes::collect(sessions, tz);
        Self {
            totals: by_day.totals(today, days),
            improvement: by_day.improvement(today),
        }
    }
}

/// Work minutes per day, oldest first, zero-filled, covering
/// `[today - (days - 1), today]`.
pub fn daily_totals<'a, I, Tz>(sessions: I, today: NaiveDate, days: u32, tz: &Tz) -> Vec<DailyTotal>
where
    I: IntoIterator<Item = &'a SessionRecord>,
    Tz: TimeZone,
{
    DayVolumes::collect(sessions, tz).totals(today, days)
}

/// Compare today's Work volume with the most recent earlier day that has
/// any Work session (not necessarily yesterday).
pub fn daily_improvement<'a, I, Tz>(sessions: I, today: NaiveDate, tz: &Tz) -> DailyImprovement
where
    I: IntoIterator<Item = &'a SessionRecord>,
    Tz: TimeZone,
{
    DayVolumes::collect(sessions, tz).improvement(today)
}

#[derive(Debug, Default, Clone, Copy)]
struct Volume {
    total: f64,
    job: f64,
    personal: f64,
}

struct DayVolumes(BTreeMap<NaiveDate, Volume>);

impl DayVolumes {
    fn collect<'a, I, Tz>(sessions: I, tz: &Tz) -> Self
    where
        I: IntoIterator<Item = &'a SessionRecord>,
        Tz: TimeZone,
    {
        let mut days: BTreeMap<NaiveDate, Volume> = BTreeMap::new();
        for session in sessions.into_iter().filter(|s| s.is_work()) {
            let date = session.end_time.with_timezone(tz).date_naive();
            let volume = days.entry(date).or_default();
            volume.total += session.elapsed_minutes;
            if session.category.eq_ignore_ascii_case(JOB_CATEGORY) {
                volume.job += session.elapsed_minutes;
            } else if session.category.eq_ignore_ascii_case(PERSONAL_CATEGORY) {
                volume.personal += session.elapsed_minutes;
            }
        }
        Self(days)
    }

    fn totals(&self, today: NaiveDate, days: u32) -> Vec<DailyTotal> {
        let Some(first) = days
            .checked_sub(1)
            .and_then(|back| today.checked_sub_days(Days::new(u64::from(back))))
        else {
            return Vec::new();
        };
        first
            .iter_days()
            .take(days as usize)
            .map(|date| DailyTotal {
                date,
                total_work_minutes: self.0.get(&date).map(|v| v.total).unwrap_or(0.0),
            })
            .collect()
    }

    fn improvement(&self, today: NaiveDate) -> DailyImprovement {
        let current = self.0.get(&today).copied().unwrap_or_default();
        let previous = self
            .0
            .range(..today)
            .next_back()
            .map(|(_, v)| *v)
            .unwrap_or_default();

        let improvement_percent = if previous.total > 0.0 {
            (current.total - previous.total) / previous.total * 100.0
        } else if current.total > 0.0 {
            100.0
        } else {
            0.0
        };

        DailyImprovement {
            improvement_percent,
            today_volume: current.total,
            previous_day_volume: previous.total,
            today_job_volume: current.job,
            previous_day_job_volume: previous.job,
            today_personal_volume: current.personal,
            previous_day_personal_volume: previous.personal,
        }
    }
}

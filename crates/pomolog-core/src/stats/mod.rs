//! Statistics over stored sessions.
//!
//! Read-only: these functions never touch the timer or the session log.

mod daily;

pub use daily::{
    daily_improvement, daily_totals, DailyImprovement, DailyTotal, StatsSnapshot, JOB_CATEGORY,
    PERSONAL_CATEGORY,
};

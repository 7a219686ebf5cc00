//! Turns the phase in progress into a [`SessionRecord`].

use chrono::{DateTime, Duration, Utc};

use super::{FocusRating, SessionLog, SessionRecord};
use crate::timer::clock::{minutes_to_ms, MINUTE_MS};
use crate::timer::PhaseKind;

/// How a phase came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The countdown reached zero. Elapsed time is the nominal length,
    /// whatever the tick overshoot was.
    Natural { nominal_minutes: u32 },
    /// Stopped early while paused with `remaining_ms` left on the clock.
    Partial { nominal_minutes: u32, remaining_ms: u64 },
}

impl Completion {
    /// Minutes credited to the record.
    ///
    /// A partial phase is rounded to the nearest whole minute (halves round
    /// up) and never goes below zero.
    pub fn elapsed_minutes(&self) -> f64 {
        match *self {
            Completion::Natural { nominal_minutes } => f64::from(nominal_minutes),
            Completion::Partial {
                nominal_minutes,
                remaining_ms,
            } => {
                let used_ms = minutes_to_ms(nominal_minutes).saturating_sub(remaining_ms);
                let half = (MINUTE_MS / 2) as u64;
                ((used_ms + half) / MINUTE_MS as u64) as f64
            }
        }
    }
}

/// Build the record for a phase ending at `now`.
///
/// Work records take the pending rating (and reset it to unrated) and the
/// current category. Rest records are always unrated and uncategorised, and
/// leave the pending rating for the next Work phase.
pub fn build_record(
    completion: Completion,
    phase: PhaseKind,
    pending_rating: &mut FocusRating,
    category: &str,
    now: DateTime<Utc>,
) -> SessionRecord {
    let elapsed_minutes = completion.elapsed_minutes();
    let elapsed = Duration::milliseconds((elapsed_minutes * MINUTE_MS as f64).round() as i64);

    let (focus_rating, category) = match phase {
        PhaseKind::Work => (std::mem::take(pending_rating), category.to_string()),
        PhaseKind::Rest => (FocusRating::UNRATED, String::new()),
    };

    SessionRecord {
        start_time: now - elapsed,
        end_time: now,
        elapsed_minutes,
        phase_kind: phase,
        focus_rating,
        category,
    }
}

/// [`build_record`] and append the result to `log`.
pub fn finalize_into(
    log: &mut SessionLog,
    completion: Completion,
    phase: PhaseKind,
    pending_rating: &mut FocusRating,
    category: &str,
    now: DateTime<Utc>,
) -> SessionRecord {
    let record = build_record(completion, phase, pending_rating, category, now);
    log.append(record.clone());
    record
}

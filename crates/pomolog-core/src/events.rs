use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionRecord;
use crate::timer::{PhaseKind, TimerState};

/// Every state change in the system produces an Event.
/// The presentation layer renders them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: PhaseKind,
        duration_secs: u64,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: PhaseKind,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: PhaseKind,
        remaining_ms: u64,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A phase ran out and the next one started in the same transition.
    PhaseCompleted {
        completed: PhaseKind,
        next: PhaseKind,
        record: SessionRecord,
        full_work_phases: u64,
        /// Set when the completed phase was Work: the log should be
        /// submitted silently.
        auto_submit: bool,
        next_deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TimerReset {
        discarded: usize,
        at: DateTime<Utc>,
    },
    SessionsRecorded {
        count: usize,
        auto: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notification_error: Option<String>,
        at: DateTime<Utc>,
    },
    SubmissionFailed {
        count: usize,
        auto: bool,
        detail: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: PhaseKind,
        phase_label: String,
        remaining_ms: u64,
        display: String,
        full_work_phases: u64,
        progress: u32,
        pending_rating: u8,
        category: String,
        buffered: usize,
        at: DateTime<Utc>,
    },
}

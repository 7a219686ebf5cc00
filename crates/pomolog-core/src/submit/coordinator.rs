//! Drains the session log into a [`SessionStore`].
//!
//! Submission is split in two so the timer can keep ticking while a batch
//! is in flight:
//!
//! 1. [`prepare`] closes a paused phase, then swaps the whole log out as one
//!    [`Submission`]. Anything logged afterwards lands in a fresh log.
//! 2. [`complete`] applies the store's answer: on success the timer goes
//!    back to Idle (for a manual record), on failure the batch is put back
//!    in front of the log for a later retry.
//!
//! [`submit`] runs both halves against a synchronous store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::events::Event;
use crate::session::SessionRecord;
use crate::storage::{AppendReceipt, SessionStore};
use crate::timer::TimerEngine;

/// A batch taken out of the log and not yet acknowledged.
#[derive(Debug, Clone)]
pub struct Submission {
    batch: Vec<SessionRecord>,
    auto: bool,
    generation: u64,
}

impl Submission {
    pub fn records(&self) -> &[SessionRecord] {
        &self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Nothing was logged; no store call was made.
    Empty,
    Recorded {
        count: usize,
        auto: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notification_error: Option<String>,
    },
    Failed {
        count: usize,
        auto: bool,
        detail: String,
    },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SubmissionOutcome::Failed { .. })
    }

    /// Whether downstream statistics should be fetched again.
    pub fn refreshes_stats(&self) -> bool {
        matches!(self, SubmissionOutcome::Recorded { .. })
    }

    /// Text for the user. Automatic submissions and empty records stay
    /// silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            SubmissionOutcome::Empty => None,
            SubmissionOutcome::Recorded { auto: true, .. }
            | SubmissionOutcome::Failed { auto: true, .. } => None,
            SubmissionOutcome::Recorded {
                notification_error: None,
                ..
            } => Some("Sessions recorded successfully.".to_string()),
            SubmissionOutcome::Recorded {
                notification_error: Some(e),
                ..
            } => Some(format!(
                "Sessions recorded successfully. Notification failed: {e}"
            )),
            SubmissionOutcome::Failed { detail, .. } => {
                Some(format!("Error recording sessions: {detail}"))
            }
        }
    }

    pub fn to_event(&self, at: DateTime<Utc>) -> Option<Event> {
        match self {
            SubmissionOutcome::Empty => None,
            SubmissionOutcome::Recorded {
                count,
                auto,
                notification_error,
            } => Some(Event::SessionsRecorded {
                count: *count,
                auto: *auto,
                notification_error: notification_error.clone(),
                at,
            }),
            SubmissionOutcome::Failed {
                count,
                auto,
                detail,
            } => Some(Event::SubmissionFailed {
                count: *count,
                auto: *auto,
                detail: detail.clone(),
                at,
            }),
        }
    }
}

/// Close any paused phase and take the log as one batch.
///
/// Returns `None` when there is nothing to send.
pub fn prepare(engine: &mut TimerEngine, auto: bool, now: DateTime<Utc>) -> Option<Submission> {
    engine.finalize_partial(now);
    if engine.log().is_empty() {
        return None;
    }
    Some(Submission {
        batch: engine.take_batch(),
        auto,
        generation: engine.generation(),
    })
}

/// Apply the store's answer for `submission`.
pub fn complete(
    engine: &mut TimerEngine,
    submission: Submission,
    result: Result<AppendReceipt, StoreError>,
) -> SubmissionOutcome {
    let Submission {
        batch,
        auto,
        generation,
    } = submission;
    let count = batch.len();
    let same_timer = engine.generation() == generation;

    match result {
        Ok(receipt) => {
            tracing::info!(count, auto, "sessions recorded");
            // An automatic save happens mid-chain; only a manual record
            // ends the run. A user reset in the meantime already did.
            if !auto && same_timer {
                engine.reset_after_submission();
            }
            SubmissionOutcome::Recorded {
                count,
                auto,
                notification_error: receipt.notification_error,
            }
        }
        Err(e) => {
            let detail = e.to_string();
            if auto {
                tracing::warn!(count, error = %detail, "automatic submission failed");
            } else {
                tracing::warn!(count, error = %detail, "submission failed");
            }
            if same_timer {
                engine.restore_batch(batch);
            } else {
                tracing::warn!(count, "timer was reset during submission; dropping failed batch");
            }
            SubmissionOutcome::Failed {
                count,
                auto,
                detail,
            }
        }
    }
}

/// Prepare, send and complete in one go.
pub fn submit<S: SessionStore + ?Sized>(
    engine: &mut TimerEngine,
    store: &mut S,
    auto: bool,
    now: DateTime<Utc>,
) -> SubmissionOutcome {
    let Some(submission) = prepare(engine, auto, now) else {
        return SubmissionOutcome::Empty;
    };
    let result = store.append_sessions(submission.records());
    complete(engine, submission, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::{EngineSettings, PhaseDurations, TimerState};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 24, 9, 0, 0).unwrap()
    }

    fn engine() -> TimerEngine {
        TimerEngine::new(PhaseDurations::new(30, 5), EngineSettings::default())
    }

    #[test]
    fn empty_log_makes_no_store_call() {
        let mut e = engine();
        let mut store = MemoryStore::new();
        let outcome = submit(&mut e, &mut store, false, t0());
        assert_eq!(outcome, SubmissionOutcome::Empty);
        assert_eq!(outcome.user_message(), None);
        assert_eq!(store.append_calls(), 0);
    }

    #[test]
    fn running_record_with_empty_log_keeps_running() {
        let mut e = engine();
        let mut store = MemoryStore::new();
        e.start(t0());
        let outcome = submit(&mut e, &mut store, false, t0() + Duration::minutes(3));
        assert_eq!(outcome, SubmissionOutcome::Empty);
        assert_eq!(e.state(), TimerState::Running);
    }

    #[test]
    fn manual_success_resets_timer() {
        let mut e = engine();
        let mut store = MemoryStore::new();
        e.start(t0());
        e.pause(t0() + Duration::minutes(12));

        let outcome = submit(&mut e, &mut store, false, t0() + Duration::minutes(20));
        assert!(outcome.refreshes_stats());
        assert_eq!(
            outcome.user_message().as_deref(),
            Some("Sessions recorded successfully.")
        );
        assert_eq!(e.state(), TimerState::Idle);
        assert!(e.log().is_empty());
        assert_eq!(store.sessions()[0].record.elapsed_minutes, 12.0);
    }

    #[test]
    fn failure_keeps_batch_and_retry_does_not_double_log() {
        let mut e = engine();
        let mut store = MemoryStore::new();
        e.start(t0());
        e.pause(t0() + Duration::minutes(10));
        store.fail_next("connection refused");

        let outcome = submit(&mut e, &mut store, false, t0() + Duration::minutes(11));
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.user_message().as_deref(),
            Some("Error recording sessions: store unavailable: connection refused")
        );
        assert_eq!(e.log().len(), 1);

        let outcome = submit(&mut e, &mut store, false, t0() + Duration::minutes(15));
        assert!(matches!(outcome, SubmissionOutcome::Recorded { count: 1, .. }));
        assert_eq!(store.sessions().len(), 1);
    }

    #[test]
    fn records_logged_during_flight_follow_the_failed_batch() {
        let mut e = engine();
        e.start(t0());
        e.tick(t0() + Duration::minutes(30));
        let submission = prepare(&mut e, true, t0() + Duration::minutes(30)).unwrap();
        assert!(e.log().is_empty());

        // The Rest phase finishes while the request is still pending.
        e.tick(t0() + Duration::minutes(35));
        assert_eq!(e.log().len(), 1);

        let outcome = complete(
            &mut e,
            submission,
            Err(StoreError::Unavailable("timeout".into())),
        );
        assert_eq!(outcome.user_message(), None);
        let kinds: Vec<f64> = e.log().records().iter().map(|r| r.elapsed_minutes).collect();
        assert_eq!(kinds, vec![30.0, 5.0]);
    }

    #[test]
    fn reset_during_flight_is_not_undone() {
        let mut e = engine();
        e.start(t0());
        e.tick(t0() + Duration::minutes(30));
        let submission = prepare(&mut e, false, t0() + Duration::minutes(30)).unwrap();

        e.reset(t0() + Duration::minutes(31));
        e.start(t0() + Duration::minutes(32));

        let outcome = complete(&mut e, submission, Ok(AppendReceipt::stored(1)));
        assert!(outcome.is_success());
        // The run started after the reset is left alone.
        assert_eq!(e.state(), TimerState::Running);
    }

    #[test]
    fn failure_after_reset_drops_batch() {
        let mut e = engine();
        e.start(t0());
        e.tick(t0() + Duration::minutes(30));
        let submission = prepare(&mut e, false, t0() + Duration::minutes(30)).unwrap();
        e.reset(t0() + Duration::minutes(31));

        complete(&mut e, submission, Err(StoreError::Rejected("500".into())));
        assert!(e.log().is_empty());
    }

    #[test]
    fn outcome_events() {
        let ok = SubmissionOutcome::Recorded {
            count: 2,
            auto: true,
            notification_error: None,
        };
        assert!(matches!(
            ok.to_event(t0()),
            Some(Event::SessionsRecorded { count: 2, auto: true, .. })
        ));
        assert_eq!(SubmissionOutcome::Empty.to_event(t0()), None);
    }
}

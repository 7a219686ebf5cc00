//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads or read the system clock - every command takes `now`,
//! and the caller is responsible for calling `tick()` periodically
//! (every 250ms or faster for a smooth display).
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running(Work)
//! Running(k) --pause--> Paused(k) --start--> Running(k)
//! Running(k) --expiry--> Running(!k)      (one atomic step)
//! Paused(k) --record--> Idle              (partial session logged)
//! any --reset--> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::default();
//! engine.start(clock.now());
//! // In a loop:
//! engine.tick(clock.now()); // Returns Some(Event::PhaseCompleted) when a phase ends
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::{self, format_mmss};
use super::phase::{PhaseDurations, PhaseKind};
use crate::events::Event;
use crate::session::{finalize_into, Completion, FocusRating, SessionLog, SessionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Knobs that shape progress counting rather than phase lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// A Work phase of exactly this many minutes counts as a full session.
    pub full_session_minutes: u32,
    /// Upper bound of the progress indicator.
    pub progress_cap: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            full_session_minutes: 30,
            progress_cap: 8,
        }
    }
}

/// Core timer engine.
///
/// Owns the session log: finalized phases are appended here and drained by
/// the submission coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    state: TimerState,
    phase: PhaseKind,
    /// Absolute end of the running phase. Only set while Running.
    deadline: Option<DateTime<Utc>>,
    /// Snapshot taken at pause time. Only meaningful while Paused.
    remaining_ms: u64,
    /// Nominal length of the phase in progress, fixed when it started.
    phase_minutes: u32,
    durations: PhaseDurations,
    #[serde(default)]
    settings: EngineSettings,
    completed_full_work_phases: u64,
    pending_rating: FocusRating,
    category: String,
    log: SessionLog,
    /// Bumped by every user reset so an in-flight submission can tell that
    /// the timer it was taken from no longer exists.
    #[serde(default)]
    generation: u64,
}

impl TimerEngine {
    pub fn new(durations: PhaseDurations, settings: EngineSettings) -> Self {
        Self {
            state: TimerState::Idle,
            phase: PhaseKind::Work,
            deadline: None,
            remaining_ms: 0,
            phase_minutes: durations.work_minutes(),
            durations,
            settings,
            completed_full_work_phases: 0,
            pending_rating: FocusRating::UNRATED,
            category: String::new(),
            log: SessionLog::new(),
            generation: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> PhaseKind {
        self.phase
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn phase_minutes(&self) -> u32 {
        self.phase_minutes
    }

    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Time left in the current phase, clamped at zero.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            TimerState::Running => self
                .deadline
                .map(|d| clock::remaining_ms(d, now))
                .unwrap_or(0),
            TimerState::Paused => self.remaining_ms,
            TimerState::Idle => 0,
        }
    }

    /// `MM:SS` for the countdown display.
    pub fn display(&self, now: DateTime<Utc>) -> String {
        format_mmss(self.remaining_ms(now))
    }

    pub fn phase_label(&self) -> &'static str {
        self.phase.label()
    }

    pub fn completed_full_work_phases(&self) -> u64 {
        self.completed_full_work_phases
    }

    /// Full Work phases, capped for the progress indicator.
    pub fn progress(&self) -> u32 {
        let cap = u64::from(self.settings.progress_cap);
        self.completed_full_work_phases.min(cap) as u32
    }

    pub fn pending_rating(&self) -> FocusRating {
        self.pending_rating
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        let remaining_ms = self.remaining_ms(now);
        Event::StateSnapshot {
            state: self.state,
            phase: self.phase,
            phase_label: self.phase_label().to_string(),
            remaining_ms,
            display: format_mmss(remaining_ms),
            full_work_phases: self.completed_full_work_phases,
            progress: self.progress(),
            pending_rating: self.pending_rating.value(),
            category: self.category.clone(),
            buffered: self.log.len(),
            at: now,
        }
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Durations used from the next phase start on. A phase already in
    /// progress keeps its length.
    pub fn configure(&mut self, durations: PhaseDurations) {
        self.durations = durations;
    }

    pub fn set_settings(&mut self, settings: EngineSettings) {
        self.settings = settings;
    }

    /// Rating for the next Work session that gets logged.
    pub fn set_focus_rating(&mut self, rating: FocusRating) {
        self.pending_rating = rating;
    }

    pub fn select_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a Work phase from Idle, or resume a paused phase.
    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        match self.state {
            TimerState::Idle => {
                self.phase = PhaseKind::Work;
                Some(self.begin_phase(now))
            }
            TimerState::Paused => {
                // Recompute from the snapshot so paused time is not counted.
                let deadline = clock::deadline_from_remaining(now, self.remaining_ms);
                self.deadline = Some(deadline);
                self.state = TimerState::Running;
                tracing::debug!(
                    phase = %self.phase,
                    remaining_ms = self.remaining_ms,
                    "timer resumed"
                );
                Some(Event::TimerResumed {
                    phase: self.phase,
                    remaining_ms: self.remaining_ms,
                    deadline,
                    at: now,
                })
            }
            TimerState::Running => None, // Already running.
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_ms = self.remaining_ms(now);
        self.deadline = None;
        self.state = TimerState::Paused;
        tracing::debug!(phase = %self.phase, remaining_ms = self.remaining_ms, "timer paused");
        Some(Event::TimerPaused {
            phase: self.phase,
            remaining_ms: self.remaining_ms,
            at: now,
        })
    }

    /// User reset: back to Idle defaults, discarding anything not yet
    /// submitted.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Event {
        let discarded = self.log.len();
        self.log.clear();
        self.return_to_idle();
        self.generation = self.generation.wrapping_add(1);
        tracing::debug!(discarded, "timer reset");
        Event::TimerReset { discarded, at: now }
    }

    /// Reset that follows a confirmed submission. The log is left alone:
    /// the submitted batch was already taken out of it, and anything logged
    /// while the request was in flight still needs submitting.
    pub fn reset_after_submission(&mut self) {
        self.return_to_idle();
    }

    /// Call periodically. Returns `Some(Event::PhaseCompleted)` when the
    /// running phase reaches zero; by then the next phase is already running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let deadline = self.deadline?;
        if clock::remaining_ms(deadline, now) > 0 {
            return None;
        }

        let completed = self.phase;
        let record = finalize_into(
            &mut self.log,
            Completion::Natural {
                nominal_minutes: self.phase_minutes,
            },
            completed,
            &mut self.pending_rating,
            &self.category,
            now,
        );

        if completed == PhaseKind::Work {
            if self.phase_minutes == self.settings.full_session_minutes {
                self.completed_full_work_phases += 1;
            }
            // Consumed by the record above; a rating set during Rest is kept
            // for the Work phase that follows.
            self.pending_rating = FocusRating::UNRATED;
        }

        self.phase = completed.flipped();
        let next = self.begin_phase(now);
        let next_deadline = match next {
            Event::TimerStarted { deadline, .. } => deadline,
            _ => now,
        };
        tracing::debug!(
            %completed,
            next = %self.phase,
            minutes = record.elapsed_minutes,
            "phase completed"
        );

        Some(Event::PhaseCompleted {
            completed,
            next: self.phase,
            record,
            full_work_phases: self.completed_full_work_phases,
            auto_submit: completed == PhaseKind::Work,
            next_deadline,
            at: now,
        })
    }

    /// Close a paused phase early and log the time actually used.
    ///
    /// The timer returns to Idle so the same stretch cannot be logged twice.
    /// Returns `None` unless the timer is paused.
    pub fn finalize_partial(&mut self, now: DateTime<Utc>) -> Option<SessionRecord> {
        if self.state != TimerState::Paused {
            return None;
        }
        let record = finalize_into(
            &mut self.log,
            Completion::Partial {
                nominal_minutes: self.phase_minutes,
                remaining_ms: self.remaining_ms,
            },
            self.phase,
            &mut self.pending_rating,
            &self.category,
            now,
        );
        self.state = TimerState::Idle;
        self.deadline = None;
        self.remaining_ms = 0;
        tracing::debug!(
            phase = %record.phase_kind,
            minutes = record.elapsed_minutes,
            "partial session logged"
        );
        Some(record)
    }

    /// Take the whole log as one batch for submission.
    pub fn take_batch(&mut self) -> Vec<SessionRecord> {
        self.log.take()
    }

    /// Return a batch whose submission failed.
    pub fn restore_batch(&mut self, batch: Vec<SessionRecord>) {
        self.log.restore(batch);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_phase(&mut self, now: DateTime<Utc>) -> Event {
        self.phase_minutes = self.durations.minutes_for(self.phase);
        let deadline = clock::deadline_after(now, self.phase_minutes);
        self.deadline = Some(deadline);
        self.remaining_ms = 0;
        self.state = TimerState::Running;
        tracing::debug!(phase = %self.phase, minutes = self.phase_minutes, "phase started");
        Event::TimerStarted {
            phase: self.phase,
            duration_secs: u64::from(self.phase_minutes) * 60,
            deadline,
            at: now,
        }
    }

    fn return_to_idle(&mut self) {
        self.state = TimerState::Idle;
        self.phase = PhaseKind::Work;
        self.deadline = None;
        self.remaining_ms = 0;
        self.phase_minutes = self.durations.work_minutes();
        self.completed_full_work_phases = 0;
        self.pending_rating = FocusRating::UNRATED;
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(PhaseDurations::default(), EngineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 24, 9, 0, 0).unwrap()
    }

    fn engine(work: i64, rest: i64) -> TimerEngine {
        TimerEngine::new(PhaseDurations::new(work, rest), EngineSettings::default())
    }

    #[test]
    fn start_pause_resume() {
        let mut e = engine(25, 5);
        assert_eq!(e.state(), TimerState::Idle);

        assert!(e.start(t0()).is_some());
        assert_eq!(e.state(), TimerState::Running);
        assert_eq!(e.phase(), PhaseKind::Work);

        assert!(e.pause(t0() + Duration::minutes(1)).is_some());
        assert_eq!(e.state(), TimerState::Paused);

        assert!(e.start(t0() + Duration::minutes(2)).is_some());
        assert_eq!(e.state(), TimerState::Running);
    }

    #[test]
    fn start_while_running_is_ignored() {
        let mut e = engine(25, 5);
        e.start(t0());
        let deadline = e.deadline();
        assert!(e.start(t0() + Duration::minutes(3)).is_none());
        assert_eq!(e.deadline(), deadline);
    }

    #[test]
    fn pause_freezes_remaining_and_resume_excludes_pause_time() {
        let mut e = engine(25, 5);
        e.start(t0());
        e.pause(t0() + Duration::minutes(10));
        assert_eq!(e.remaining_ms(t0() + Duration::minutes(10)), 15 * 60_000);
        assert_eq!(e.remaining_ms(t0() + Duration::hours(3)), 15 * 60_000);

        let resumed_at = t0() + Duration::hours(3);
        e.start(resumed_at);
        assert_eq!(e.remaining_ms(resumed_at), 15 * 60_000);
        assert_eq!(e.deadline(), Some(resumed_at + Duration::minutes(15)));
    }

    #[test]
    fn display_counts_down() {
        let mut e = engine(25, 5);
        assert_eq!(e.display(t0()), "00:00");
        e.start(t0());
        assert_eq!(e.display(t0()), "25:00");
        assert_eq!(e.display(t0() + Duration::milliseconds(1_250)), "24:58");
        assert_eq!(e.display(t0() + Duration::minutes(40)), "00:00");
    }

    #[test]
    fn expiry_chains_into_next_phase_atomically() {
        let mut e = engine(30, 5);
        e.start(t0());
        assert!(e.tick(t0() + Duration::minutes(29)).is_none());

        let at = t0() + Duration::minutes(30) + Duration::milliseconds(180);
        match e.tick(at) {
            Some(Event::PhaseCompleted {
                completed,
                next,
                record,
                full_work_phases,
                auto_submit,
                next_deadline,
                ..
            }) => {
                assert_eq!(completed, PhaseKind::Work);
                assert_eq!(next, PhaseKind::Rest);
                assert_eq!(record.elapsed_minutes, 30.0);
                assert_eq!(full_work_phases, 1);
                assert!(auto_submit);
                assert_eq!(next_deadline, at + Duration::minutes(5));
            }
            other => panic!("Expected PhaseCompleted, got {other:?}"),
        }
        assert_eq!(e.state(), TimerState::Running);
        assert_eq!(e.phase(), PhaseKind::Rest);
        assert_eq!(e.remaining_ms(at), 5 * 60_000);
    }

    #[test]
    fn only_full_length_work_phases_count() {
        let mut e = engine(25, 5);
        e.start(t0());
        e.tick(t0() + Duration::minutes(25));
        assert_eq!(e.completed_full_work_phases(), 0);
    }

    #[test]
    fn rest_expiry_does_not_auto_submit_and_keeps_rating() {
        let mut e = engine(30, 5);
        e.start(t0());
        e.tick(t0() + Duration::minutes(30));
        e.set_focus_rating(FocusRating::new(2).unwrap());

        match e.tick(t0() + Duration::minutes(35)) {
            Some(Event::PhaseCompleted { auto_submit, record, .. }) => {
                assert!(!auto_submit);
                assert_eq!(record.phase_kind, PhaseKind::Rest);
                assert_eq!(record.focus_rating, FocusRating::UNRATED);
            }
            other => panic!("Expected PhaseCompleted, got {other:?}"),
        }
        assert_eq!(e.pending_rating().value(), 2);
    }

    #[test]
    fn progress_is_capped_but_counter_is_not() {
        let mut e = engine(30, 5);
        let mut now = t0();
        e.start(now);
        for _ in 0..10 {
            now += Duration::minutes(30);
            e.tick(now);
            now += Duration::minutes(5);
            e.tick(now);
        }
        assert_eq!(e.completed_full_work_phases(), 10);
        assert_eq!(e.progress(), 8);
    }

    #[test]
    fn finalize_partial_returns_to_idle() {
        let mut e = engine(25, 5);
        e.start(t0());
        e.pause(t0() + Duration::minutes(10));
        let rec = e.finalize_partial(t0() + Duration::minutes(12)).unwrap();
        assert_eq!(rec.elapsed_minutes, 10.0);
        assert_eq!(e.state(), TimerState::Idle);
        assert!(e.finalize_partial(t0() + Duration::minutes(13)).is_none());
        assert_eq!(e.log().len(), 1);
    }

    #[test]
    fn reset_discards_log_and_counters() {
        let mut e = engine(30, 5);
        e.start(t0());
        e.tick(t0() + Duration::minutes(30));
        e.set_focus_rating(FocusRating::new(5).unwrap());
        let generation = e.generation();

        match e.reset(t0() + Duration::minutes(31)) {
            Event::TimerReset { discarded, .. } => assert_eq!(discarded, 1),
            other => panic!("Expected TimerReset, got {other:?}"),
        }
        assert_eq!(e.state(), TimerState::Idle);
        assert_eq!(e.phase(), PhaseKind::Work);
        assert_eq!(e.completed_full_work_phases(), 0);
        assert_eq!(e.pending_rating(), FocusRating::UNRATED);
        assert!(e.log().is_empty());
        assert_eq!(e.generation(), generation + 1);
    }

    #[test]
    fn configure_applies_from_next_phase() {
        let mut e = engine(30, 5);
        e.start(t0());
        e.configure(PhaseDurations::new(50, 10));
        assert_eq!(e.phase_minutes(), 30);
        e.tick(t0() + Duration::minutes(30));
        assert_eq!(e.phase_minutes(), 10);
    }

    #[test]
    fn engine_survives_serialization() {
        let mut e = engine(25, 5);
        e.start(t0());
        e.pause(t0() + Duration::minutes(4));
        let json = serde_json::to_string(&e).unwrap();
        let restored: TimerEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.state(), TimerState::Paused);
        assert_eq!(restored.remaining_ms(t0()), 21 * 60_000);
    }
}

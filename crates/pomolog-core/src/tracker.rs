//! Wires the timer engine, a session store and a clock together.
//!
//! `Tracker` is what a presentation layer talks to: it takes user intents,
//! drives the engine with the current time, submits the log when a Work
//! phase runs out, and keeps statistics fresh after every recorded batch.

use chrono::Local;

use crate::error::{StoreError, ValidationError};
use crate::events::Event;
use crate::session::FocusRating;
use crate::stats::StatsSnapshot;
use crate::storage::{AppendReceipt, SessionStore};
use crate::submit::{self, Submission, SubmissionOutcome};
use crate::timer::{Clock, PhaseDurations, SystemClock, TimerEngine};

/// Days covered by the cached totals.
pub const STATS_DAYS: u32 = 7;

pub struct Tracker<S, C = SystemClock> {
    engine: TimerEngine,
    store: S,
    clock: C,
    stats: Option<StatsSnapshot>,
    /// Expiries found while catching up before an intent.
    missed: Vec<Event>,
}

impl<S: SessionStore, C: Clock> Tracker<S, C> {
    pub fn new(engine: TimerEngine, store: S, clock: C) -> Self {
        Self {
            engine,
            store,
            clock,
            stats: None,
            missed: Vec::new(),
        }
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ── Intents ──────────────────────────────────────────────────────
    //
    // Each intent first lets an overdue phase expire, so a deadline that
    // passed while nobody was ticking is logged before the intent applies.

    pub fn start(&mut self) -> Option<Event> {
        self.catch_up();
        self.engine.start(self.clock.now())
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.catch_up();
        self.engine.pause(self.clock.now())
    }

    pub fn reset(&mut self) -> Event {
        self.catch_up();
        self.engine.reset(self.clock.now())
    }

    /// Manual record: closes a paused phase and submits the log.
    pub fn record(&mut self) -> SubmissionOutcome {
        self.catch_up();
        self.submit(false)
    }

    pub fn set_focus_rating(&mut self, rating: u8) -> Result<(), ValidationError> {
        let rating = FocusRating::new(rating)?;
        self.catch_up();
        self.engine.set_focus_rating(rating);
        Ok(())
    }

    pub fn select_category(&mut self, category: &str) {
        self.catch_up();
        self.engine.select_category(category);
    }

    pub fn configure(&mut self, durations: PhaseDurations) {
        self.catch_up();
        self.engine.configure(durations);
    }

    /// Events produced by catch-up since the last call, oldest first.
    pub fn take_missed(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.missed)
    }

    /// Advance the engine. When a Work phase completes, the log is
    /// submitted silently and the outcome event follows the completion.
    pub fn tick(&mut self) -> Vec<Event> {
        let Some(completed) = self.advance() else {
            return Vec::new();
        };
        let auto_submit = matches!(completed, Event::PhaseCompleted { auto_submit: true, .. });
        let mut events = vec![completed];
        if auto_submit {
            let outcome = self.submit(true);
            events.extend(outcome.to_event(self.clock.now()));
        }
        events
    }

    // ── Split submission ─────────────────────────────────────────────
    //
    // For callers that send the batch elsewhere (e.g. on a worker thread)
    // and keep ticking until the store answers.

    /// Expire the current phase if its deadline has passed. Never submits.
    pub fn advance(&mut self) -> Option<Event> {
        self.engine.tick(self.clock.now())
    }

    pub fn begin_submission(&mut self, auto: bool) -> Option<Submission> {
        submit::prepare(&mut self.engine, auto, self.clock.now())
    }

    /// Apply the store's answer; a successful batch refreshes statistics.
    pub fn finish_submission(
        &mut self,
        submission: Submission,
        result: Result<AppendReceipt, StoreError>,
    ) -> SubmissionOutcome {
        let outcome = submit::complete(&mut self.engine, submission, result);
        if outcome.refreshes_stats() {
            if let Err(e) = self.refresh_stats() {
                tracing::warn!(error = %e, "statistics refresh failed");
            }
        }
        outcome
    }

    // ── Outputs ──────────────────────────────────────────────────────

    pub fn display(&self) -> String {
        self.engine.display(self.clock.now())
    }

    pub fn phase_label(&self) -> &'static str {
        self.engine.phase_label()
    }

    pub fn progress(&self) -> u32 {
        self.engine.progress()
    }

    pub fn pending_rating(&self) -> u8 {
        self.engine.pending_rating().value()
    }

    pub fn snapshot(&self) -> Event {
        self.engine.snapshot(self.clock.now())
    }

    /// Statistics as of the last successful submission or refresh.
    pub fn stats(&self) -> Option<&StatsSnapshot> {
        self.stats.as_ref()
    }

    /// Fetch every stored session and recompute the statistics.
    pub fn refresh_stats(&mut self) -> Result<&StatsSnapshot, StoreError> {
        let sessions = self.store.fetch_all_sessions()?;
        let today = self.clock.now().with_timezone(&Local).date_naive();
        let snapshot = StatsSnapshot::from_sessions(
            sessions.iter().map(|s| &s.record),
            today,
            STATS_DAYS,
            &Local,
        );
        Ok(self.stats.insert(snapshot))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn catch_up(&mut self) {
        let events = self.tick();
        self.missed.extend(events);
    }

    fn submit(&mut self, auto: bool) -> SubmissionOutcome {
        let Some(submission) = self.begin_submission(auto) else {
            return SubmissionOutcome::Empty;
        };
        let result = self.store.append_sessions(submission.records());
        self.finish_submission(submission, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::{EngineSettings, ManualClock, PhaseKind, TimerState};
    use chrono::{TimeZone, Utc};

    fn tracker(work: i64) -> (Tracker<MemoryStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 24, 9, 0, 0).unwrap());
        let engine = TimerEngine::new(PhaseDurations::new(work, 5), EngineSettings::default());
        (Tracker::new(engine, MemoryStore::new(), clock.clone()), clock)
    }

    #[test]
    fn outputs_follow_the_clock() {
        let (mut t, clock) = tracker(25);
        t.start();
        assert_eq!(t.display(), "25:00");
        assert_eq!(t.phase_label(), "Work Session");
        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(t.display(), "23:59");
    }

    #[test]
    fn work_expiry_auto_submits_and_refreshes_stats() {
        let (mut t, clock) = tracker(30);
        t.select_category("Job");
        t.start();
        clock.advance_minutes(30);

        let events = t.tick();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            Event::SessionsRecorded { count: 1, auto: true, .. }
        ));
        assert_eq!(t.store().sessions().len(), 1);
        assert_eq!(t.engine().state(), TimerState::Running);
        assert_eq!(t.progress(), 1);

        let stats = t.stats().unwrap();
        assert_eq!(stats.totals.len(), STATS_DAYS as usize);
        assert_eq!(stats.improvement.today_volume, 30.0);
        assert_eq!(stats.improvement.today_job_volume, 30.0);
    }

    #[test]
    fn failed_auto_submission_is_silent_but_reported() {
        let (mut t, clock) = tracker(30);
        t.store_mut().fail_next("offline");
        t.start();
        clock.advance_minutes(30);

        let events = t.tick();
        match &events[1] {
            Event::SubmissionFailed { auto, detail, .. } => {
                assert!(*auto);
                assert!(detail.contains("offline"));
            }
            other => panic!("Expected SubmissionFailed, got {other:?}"),
        }
        assert_eq!(t.engine().log().len(), 1);
        assert!(t.stats().is_none());
    }

    #[test]
    fn rating_is_validated() {
        let (mut t, _clock) = tracker(30);
        assert!(t.set_focus_rating(6).is_err());
        t.set_focus_rating(4).unwrap();
        assert_eq!(t.pending_rating(), 4);
    }

    #[test]
    fn pause_after_an_overdue_deadline_logs_the_work_phase_first() {
        let (mut t, clock) = tracker(30);
        t.start();
        clock.advance_minutes(35);

        let paused = t.pause();
        assert!(matches!(
            paused,
            Some(Event::TimerPaused { phase: PhaseKind::Rest, .. })
        ));
        let missed = t.take_missed();
        assert!(matches!(
            missed[0],
            Event::PhaseCompleted { completed: PhaseKind::Work, full_work_phases: 1, .. }
        ));
        assert!(matches!(missed[1], Event::SessionsRecorded { count: 1, auto: true, .. }));
        assert!(t.take_missed().is_empty());

        let stored = t.store().sessions();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record.elapsed_minutes, 30.0);
        assert_eq!(t.engine().state(), TimerState::Paused);
        assert_eq!(t.progress(), 1);
        assert!(t.stats().is_some());
    }

    #[test]
    fn rating_after_an_overdue_deadline_goes_to_the_next_work_record() {
        let (mut t, clock) = tracker(30);
        t.set_focus_rating(2).unwrap();
        t.start();
        clock.advance_minutes(31);

        t.set_focus_rating(5).unwrap();
        assert_eq!(t.store().sessions()[0].record.focus_rating.value(), 2);
        assert_eq!(t.pending_rating(), 5);
    }

    #[test]
    fn split_submission_matches_record() {
        let (mut t, clock) = tracker(30);
        t.start();
        clock.advance_minutes(30);
        assert!(t.advance().is_some());
        assert!(t.store().sessions().is_empty());

        let submission = t.begin_submission(true).unwrap();
        let result = t.store_mut().append_sessions(submission.records());
        let outcome = t.finish_submission(submission, result);
        assert!(outcome.refreshes_stats());
        assert_eq!(t.store().sessions().len(), 1);
        assert_eq!(t.stats().unwrap().improvement.today_volume, 30.0);
    }
}

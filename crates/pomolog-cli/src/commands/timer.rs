use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Subcommand;
use pomolog_core::error::{StoreError, ValidationError};
use pomolog_core::submit::Submission;
use pomolog_core::{
    AppendReceipt, Config, Database, Event, PhaseDurations, SessionStore, StatsSnapshot,
    SubmissionOutcome, SystemClock, TimerEngine, TimerState, Tracker,
};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use super::{open_store, CliStore};

const ENGINE_KEY: &str = "timer_engine";

type CliTracker = Tracker<CliStore>;
/// The foreground runner shares its store with submissions on the blocking pool.
type RunTracker = Tracker<Arc<Mutex<CliStore>>>;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a Work phase, or resume a paused one
    Start {
        /// Work minutes (non-numeric input falls back to the default)
        #[arg(long)]
        work: Option<String>,
        /// Rest minutes (non-numeric input falls back to the default)
        #[arg(long)]
        rest: Option<String>,
    },
    /// Pause the running phase
    Pause,
    /// Reset to idle, discarding sessions not yet recorded
    Reset,
    /// Close a paused phase and record every logged session
    Record,
    /// Focus rating (0-5) for the next Work session
    Rate { rating: u8 },
    /// Category for the next Work session
    Category { label: String },
    /// Print current timer state as JSON
    Status,
    /// Run the timer in the foreground until Ctrl-C
    Run,
}

fn load_engine(db: &Database, config: &Config) -> TimerEngine {
    if let Ok(Some(json)) = db.kv_get(ENGINE_KEY) {
        match serde_json::from_str::<TimerEngine>(&json) {
            Ok(mut engine) => {
                engine.set_settings(config.engine_settings());
                return engine;
            }
            Err(e) => tracing::warn!(error = %e, "stored timer state unreadable; starting fresh"),
        }
    }
    TimerEngine::new(config.durations(), config.engine_settings())
}

fn save_engine(db: &Database, engine: &TimerEngine) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(engine)?;
    db.kv_set(ENGINE_KEY, &json)?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct RecordReport<'a> {
    #[serde(flatten)]
    outcome: &'a SubmissionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a StatsSnapshot>,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    if let TimerAction::Run = action {
        return run_foreground(config);
    }

    let store = open_store(&config)?;
    let engine = load_engine(store.inner(), &config);
    let mut tracker = Tracker::new(engine, store, SystemClock);
    let result = apply(&mut tracker, &config, action);
    // Saved even when the intent failed: catch-up may already have stored records.
    save_engine(tracker.store().inner(), tracker.engine())?;
    result
}

/// Apply one intent. Expiries caught up on the way are printed before the
/// intent's own output.
fn apply(
    tracker: &mut CliTracker,
    config: &Config,
    action: TimerAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Start { work, rest } => {
            if work.is_some() || rest.is_some() {
                let current = tracker.engine().durations();
                let work = work.unwrap_or_else(|| current.work_minutes().to_string());
                let rest = rest.unwrap_or_else(|| current.rest_minutes().to_string());
                tracker.configure(PhaseDurations::from_inputs(&work, &rest));
            }
            let started = tracker.start();
            print_missed(tracker)?;
            match started {
                Some(event) => print_json(&event)?,
                None => print_json(&tracker.snapshot())?,
            }
        }
        TimerAction::Pause => {
            let paused = tracker.pause();
            print_missed(tracker)?;
            match paused {
                Some(event) => print_json(&event)?,
                None => print_json(&tracker.snapshot())?,
            }
        }
        TimerAction::Reset => {
            let reset = tracker.reset();
            print_missed(tracker)?;
            print_json(&reset)?;
        }
        TimerAction::Record => {
            let outcome = tracker.record();
            print_missed(tracker)?;
            let stats = if outcome.refreshes_stats() {
                tracker.stats()
            } else {
                None
            };
            print_json(&RecordReport {
                outcome: &outcome,
                stats,
            })?;
            if let Some(message) = outcome.user_message() {
                eprintln!("{message}");
            }
            if !outcome.is_success() {
                return Err("recording failed; sessions kept for the next attempt".into());
            }
        }
        TimerAction::Rate { rating } => {
            tracker.set_focus_rating(rating)?;
            print_missed(tracker)?;
            print_json(&tracker.snapshot())?;
        }
        TimerAction::Category { label } => {
            let choices = &config.categories.choices;
            if !label.is_empty() && !choices.iter().any(|c| c.eq_ignore_ascii_case(&label)) {
                return Err(ValidationError::InvalidValue {
                    field: "category".into(),
                    message: format!("expected one of: {}", choices.join(", ")),
                }
                .into());
            }
            tracker.select_category(&label);
            print_missed(tracker)?;
            print_json(&tracker.snapshot())?;
        }
        TimerAction::Status => {
            for event in tracker.tick() {
                print_json(&event)?;
            }
            print_json(&tracker.snapshot())?;
        }
        TimerAction::Run => return Err("the foreground runner owns its own tracker".into()),
    }
    Ok(())
}

fn print_missed(tracker: &mut CliTracker) -> Result<(), Box<dyn std::error::Error>> {
    for event in tracker.take_missed() {
        print_json(&event)?;
    }
    Ok(())
}

type Answer = (Submission, Result<AppendReceipt, StoreError>);

/// Send a batch on the blocking pool so ticking carries on meanwhile.
fn spawn_submission(
    in_flight: &mut JoinSet<Answer>,
    store: &Arc<Mutex<CliStore>>,
    submission: Submission,
) {
    let mut store = Arc::clone(store);
    in_flight.spawn_blocking(move || {
        let result = store.append_sessions(submission.records());
        (submission, result)
    });
}

fn redraw(tracker: &RunTracker) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    write!(
        out,
        "\r{:<14} {}  [{}/{}]",
        tracker.phase_label(),
        tracker.display(),
        tracker.progress(),
        tracker.engine().settings().progress_cap
    )?;
    out.flush()
}

fn report(event: &Event) {
    match event {
        Event::PhaseCompleted { completed, next, .. } => {
            println!("\n{completed} finished, {next} started");
        }
        Event::SubmissionFailed { detail, .. } => println!("\nrecording failed: {detail}"),
        Event::SessionsRecorded {
            count,
            notification_error,
            ..
        } => {
            println!("\nrecorded {count} session(s)");
            if let Some(e) = notification_error {
                println!("notification failed: {e}");
            }
        }
        _ => {}
    }
}

fn report_outcome(tracker: &RunTracker, outcome: &SubmissionOutcome) {
    if let Some(event) = outcome.to_event(chrono::Utc::now()) {
        report(&event);
    }
    if outcome.refreshes_stats() {
        if let Some(stats) = tracker.stats() {
            println!("today: {:.1} min", stats.improvement.today_volume);
        }
    }
}

fn run_foreground(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // A separate connection keeps timer state writes off the store lock.
    let state_db = Database::open()?;
    let engine = load_engine(&state_db, &config);
    let store = Arc::new(Mutex::new(open_store(&config)?));
    let mut tracker = Tracker::new(engine, store, SystemClock);
    if tracker.engine().state() != TimerState::Running {
        tracker.start();
    }
    for event in tracker.take_missed() {
        report(&event);
    }
    save_engine(&state_db, tracker.engine())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let interval = config.tick_interval();
    let result = runtime.block_on(tick_loop(&mut tracker, &state_db, interval));
    save_engine(&state_db, tracker.engine())?;
    println!();
    result
}

async fn tick_loop(
    tracker: &mut RunTracker,
    state_db: &Database,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: JoinSet<Answer> = JoinSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(event) = tracker.advance() {
                    report(&event);
                    if matches!(event, Event::PhaseCompleted { auto_submit: true, .. }) {
                        if let Some(submission) = tracker.begin_submission(true) {
                            spawn_submission(&mut in_flight, tracker.store(), submission);
                        }
                    }
                    save_engine(state_db, tracker.engine())?;
                }
                redraw(tracker)?;
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                let (submission, result) = joined?;
                let outcome = tracker.finish_submission(submission, result);
                report_outcome(tracker, &outcome);
                save_engine(state_db, tracker.engine())?;
            }
            _ = &mut ctrl_c => {
                tracker.pause();
                for event in tracker.take_missed() {
                    report(&event);
                }
                break;
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        let (submission, result) = joined?;
        let outcome = tracker.finish_submission(submission, result);
        report_outcome(tracker, &outcome);
    }
    Ok(())
}

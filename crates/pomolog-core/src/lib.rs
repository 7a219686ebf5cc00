//! # Pomolog Core Library
//!
//! Core logic for a two-phase work/rest timer that logs every completed or
//! interrupted phase as a session record and batches those records into a
//! persistent store. The `pomolog` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock state machine. The caller passes the
//!   current time into every command and polls `tick()` for expiry
//! - **Session Log**: In-memory buffer of finalized records awaiting
//!   submission, drained with a swap-and-clear
//! - **Submission**: Two-phase prepare/complete so a slow store never blocks
//!   the timer, with the batch restored on failure
//! - **Storage**: SQLite session storage and TOML configuration
//! - **Statistics**: Daily Work totals and day-over-day improvement
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`Tracker`]: Engine, store and clock wired together
//! - [`Database`]: Session persistence
//! - [`Config`]: Application configuration management
//! - [`SessionStore`]: Seam for anything that accepts session batches

pub mod error;
pub mod events;
pub mod session;
pub mod stats;
pub mod storage;
pub mod submit;
pub mod timer;
pub mod tracker;

pub use error::{ConfigError, CoreError, DatabaseError, NotifyError, StoreError, ValidationError};
pub use events::Event;
pub use session::{FocusRating, SessionLog, SessionRecord, StoredSession};
pub use stats::{DailyImprovement, DailyTotal, StatsSnapshot};
pub use storage::{
    open_relay_store, AppendReceipt, Config, Database, MemoryStore, NotifyingStore, RelayStore,
    SessionStore,
};
pub use submit::{Notifier, SubmissionOutcome, WebhookNotifier};
pub use timer::{
    Clock, ManualClock, PhaseDurations, PhaseKind, SystemClock, TimerEngine, TimerState,
};
pub use tracker::Tracker;

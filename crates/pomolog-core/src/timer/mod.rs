pub mod clock;
mod engine;
mod phase;

pub use clock::{format_mmss, Clock, ManualClock, SystemClock};
pub use engine::{EngineSettings, TimerEngine, TimerState};
pub use phase::{
    parse_minutes, PhaseDurations, PhaseKind, DEFAULT_REST_MINUTES, DEFAULT_WORK_MINUTES,
};

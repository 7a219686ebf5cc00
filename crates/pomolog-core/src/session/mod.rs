mod finalizer;
mod log;
mod record;

pub use finalizer::{build_record, finalize_into, Completion};
pub use log::SessionLog;
pub use record::{FocusRating, SessionRecord, StoredSession};

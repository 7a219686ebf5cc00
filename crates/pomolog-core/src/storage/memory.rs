//! In-memory session store.
//!
//! Used for dry runs and tests. Failures can be injected to exercise the
//! retry path of the submission coordinator.

use crate::error::StoreError;
use crate::session::{SessionRecord, StoredSession};

use super::store::{AppendReceipt, SessionStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Vec<StoredSession>,
    next_id: i64,
    fail_next: Option<String>,
    offline: Option<String>,
    append_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next append fails with `detail`, later ones succeed.
    pub fn fail_next(&mut self, detail: impl Into<String>) {
        self.fail_next = Some(detail.into());
    }

    /// Every append fails with `detail` until [`go_online`](Self::go_online).
    pub fn go_offline(&mut self, detail: impl Into<String>) {
        self.offline = Some(detail.into());
    }

    pub fn go_online(&mut self) {
        self.offline = None;
    }

    /// How many times `append_sessions` was called, failed calls included.
    pub fn append_calls(&self) -> usize {
        self.append_calls
    }

    pub fn sessions(&self) -> &[StoredSession] {
        &self.sessions
    }
}

impl SessionStore for MemoryStore {
    fn append_sessions(&mut self, records: &[SessionRecord]) -> Result<AppendReceipt, StoreError> {
        self.append_calls += 1;
        if let Some(detail) = self.fail_next.take() {
            return Err(StoreError::Unavailable(detail));
        }
        if let Some(detail) = &self.offline {
            return Err(StoreError::Unavailable(detail.clone()));
        }
        if records.is_empty() {
            return Err(StoreError::Rejected("No sessions provided.".into()));
        }
        for record in records {
            record
                .validate()
                .map_err(|e| StoreError::Rejected(e.to_string()))?;
        }
        for record in records {
            self.next_id += 1;
            self.sessions.push(StoredSession {
                id: self.next_id,
                record: record.clone(),
            });
        }
        Ok(AppendReceipt::stored(records.len()))
    }

    fn fetch_all_sessions(&self) -> Result<Vec<StoredSession>, StoreError> {
        Ok(self.sessions.clone())
    }
}

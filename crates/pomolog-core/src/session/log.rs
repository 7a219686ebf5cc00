//! In-memory log of sessions waiting to be submitted.

use serde::{Deserialize, Serialize};

use super::SessionRecord;

/// Ordered, append-only buffer of finalized sessions.
///
/// Records are never edited in place. The only ways out are [`take`],
/// which hands the whole buffer to a submission and leaves a fresh one
/// behind, and [`clear`], used by an explicit user reset.
///
/// [`take`]: SessionLog::take
/// [`clear`]: SessionLog::clear
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    records: Vec<SessionRecord>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: SessionRecord) {
        self.records.push(record);
    }

    /// Swap the buffer out as one batch.
    pub fn take(&mut self) -> Vec<SessionRecord> {
        std::mem::take(&mut self.records)
    }

    /// Put a batch that failed to submit back in front of anything logged
    /// since it was taken, so order is preserved for the retry.
    pub fn restore(&mut self, mut batch: Vec<SessionRecord>) {
        batch.append(&mut self.records);
        self.records = batch;
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }
}

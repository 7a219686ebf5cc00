//! The persistence seam consumed by the submission coordinator.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::session::{SessionRecord, StoredSession};
use crate::submit::notify::{summarize, Notifier};

/// Result of a successful append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReceipt {
    /// Number of records durably stored.
    pub stored: usize,
    /// Set when the batch was stored but the follow-up notification failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_error: Option<String>,
}

impl AppendReceipt {
    pub fn stored(stored: usize) -> Self {
        Self {
            stored,
            notification_error: None,
        }
    }
}

/// Somewhere completed sessions are kept.
///
/// `append_sessions` is all-or-nothing: on `Err` none of the batch may have
/// been stored.
pub trait SessionStore {
    fn append_sessions(&mut self, records: &[SessionRecord]) -> Result<AppendReceipt, StoreError>;

    fn fetch_all_sessions(&self) -> Result<Vec<StoredSession>, StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn append_sessions(&mut self, records: &[SessionRecord]) -> Result<AppendReceipt, StoreError> {
        (**self).append_sessions(records)
    }

    fn fetch_all_sessions(&self) -> Result<Vec<StoredSession>, StoreError> {
        (**self).fetch_all_sessions()
    }
}

/// A store shared with background submissions.
impl<S: SessionStore> SessionStore for Arc<Mutex<S>> {
    fn append_sessions(&mut self, records: &[SessionRecord]) -> Result<AppendReceipt, StoreError> {
        self.lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?
            .append_sessions(records)
    }

    fn fetch_all_sessions(&self) -> Result<Vec<StoredSession>, StoreError> {
        self.lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?
            .fetch_all_sessions()
    }
}

/// Wraps a store and relays a summary of every stored batch.
///
/// A relay failure is reported in the receipt; the append itself still
/// counts as successful.
pub struct NotifyingStore<S, N> {
    inner: S,
    notifier: N,
}

impl<S, N> std::fmt::Debug for NotifyingStore<S, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyingStore").finish_non_exhaustive()
    }
}

impl<S: SessionStore, N: Notifier> NotifyingStore<S, N> {
    pub fn new(inner: S, notifier: N) -> Self {
        Self { inner, notifier }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: SessionStore, N: Notifier> SessionStore for NotifyingStore<S, N> {
    fn append_sessions(&mut self, records: &[SessionRecord]) -> Result<AppendReceipt, StoreError> {
        let mut receipt = self.inner.append_sessions(records)?;
        if let Err(e) = self.notifier.notify(&summarize(records)) {
            tracing::warn!(error = %e, "sessions stored but notification failed");
            receipt.notification_error = Some(e.to_string());
        }
        Ok(receipt)
    }

    fn fetch_all_sessions(&self) -> Result<Vec<StoredSession>, StoreError> {
        self.inner.fetch_all_sessions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::session::FocusRating;
    use crate::storage::MemoryStore;
    use crate::timer::PhaseKind;
    use chrono::Utc;
    use std::cell::RefCell;

    struct RecordingNotifier {
        sent: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, summary: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport("relay down".into()));
            }
            self.sent.borrow_mut().push(summary.to_string());
            Ok(())
        }
    }

    fn rec() -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            start_time: now,
            end_time: now,
            elapsed_minutes: 0.0,
            phase_kind: PhaseKind::Work,
            focus_rating: FocusRating::UNRATED,
            category: String::new(),
        }
    }

    #[test]
    fn notification_runs_after_append() {
        let notifier = RecordingNotifier {
            sent: RefCell::new(Vec::new()),
            fail: false,
        };
        let mut store = NotifyingStore::new(MemoryStore::new(), notifier);
        let receipt = store.append_sessions(&[rec()]).unwrap();
        assert_eq!(receipt, AppendReceipt::stored(1));
        assert_eq!(store.notifier.sent.borrow().len(), 1);
    }

    #[test]
    fn notification_failure_keeps_the_append() {
        let notifier = RecordingNotifier {
            sent: RefCell::new(Vec::new()),
            fail: true,
        };
        let mut store = NotifyingStore::new(MemoryStore::new(), notifier);
        let receipt = store.append_sessions(&[rec()]).unwrap();
        assert_eq!(receipt.stored, 1);
        assert!(receipt.notification_error.unwrap().contains("relay down"));
        assert_eq!(store.fetch_all_sessions().unwrap().len(), 1);
    }

    #[test]
    fn failed_append_skips_notification() {
        let notifier = RecordingNotifier {
            sent: RefCell::new(Vec::new()),
            fail: false,
        };
        let mut inner = MemoryStore::new();
        inner.fail_next("offline");
        let mut store = NotifyingStore::new(inner, notifier);
        assert!(store.append_sessions(&[rec()]).is_err());
        assert!(store.notifier.sent.borrow().is_empty());
    }

    #[test]
    fn shared_store_appends_through_every_handle() {
        let mut shared = Arc::new(Mutex::new(MemoryStore::new()));
        let mut other = Arc::clone(&shared);
        shared.append_sessions(&[rec()]).unwrap();
        other.append_sessions(&[rec(), rec()]).unwrap();
        assert_eq!(shared.fetch_all_sessions().unwrap().len(), 3);
    }

    #[test]
    fn poisoned_shared_store_is_unavailable() {
        let mut shared = Arc::new(Mutex::new(MemoryStore::new()));
        let handle = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = handle.lock().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(matches!(
            shared.append_sessions(&[rec()]),
            Err(StoreError::Unavailable(_))
        ));
    }
}

mod config;
pub mod database;
mod memory;
pub mod migrations;
mod store;

pub use config::{CategoriesConfig, Config, NotificationsConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use store::{AppendReceipt, NotifyingStore, SessionStore};

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::submit::{NoopNotifier, Notifier, WebhookNotifier};

/// A database that relays every stored batch to the configured webhook.
pub type RelayStore = NotifyingStore<Database, Box<dyn Notifier + Send>>;

/// Open the database at `path`, relaying stored batches when notifications
/// are enabled in `config`.
///
/// # Errors
/// Returns an error if the database cannot be opened or the webhook client
/// cannot be built.
pub fn open_relay_store(path: &Path, config: &Config) -> Result<RelayStore> {
    let db = Database::open_at(path)?;
    let notifier: Box<dyn Notifier + Send> = match config.notification_webhook() {
        Some(url) => Box::new(WebhookNotifier::new(url)?),
        None => Box::new(NoopNotifier),
    };
    Ok(NotifyingStore::new(db, notifier))
}

/// Returns the data directory.
///
/// `POMOLOG_DATA_DIR` wins when set. Otherwise `~/.config/pomolog`, or
/// `~/.config/pomolog-dev` when `POMOLOG_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("POMOLOG_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOLOG_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomolog-dev")
            } else {
                base_dir.join("pomolog")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, DatabaseError};

    #[test]
    fn relay_store_opens_without_a_webhook() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_relay_store(&dir.path().join("pomolog.db"), &Config::default()).unwrap();
        assert!(store.fetch_all_sessions().unwrap().is_empty());
    }

    #[test]
    fn relay_store_reports_an_unopenable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("pomolog.db");
        let err = open_relay_store(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, CoreError::Database(DatabaseError::OpenFailed { .. })));
        assert!(err.to_string().starts_with("Database error:"));
    }
}

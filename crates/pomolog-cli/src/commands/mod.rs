pub mod config;
pub mod session;
pub mod stats;
pub mod timer;

use pomolog_core::{open_relay_store, Config, Database, RelayStore};

/// The store every submitting command writes through.
pub type CliStore = RelayStore;

/// Open the session database, relaying each stored batch to the configured
/// webhook when notifications are enabled.
pub fn open_store(config: &Config) -> Result<CliStore, Box<dyn std::error::Error>> {
    let path = Database::default_path()?;
    Ok(open_relay_store(&path, config)?)
}

mod config;
pub mod database;
mod memory;
pub mod migrations;
pub mod records;

pub use config::{Config, NotificationsConfig, SchedulerConfig, TimerDefaults};
pub use database::Database;
pub use memory::MemoryStore;
pub use records::LoadReport;

use std::path::PathBuf;

use crate::error::{ConfigError, PersistenceError};
use crate::history::HistoryEntry;
use crate::timer::Timer;

/// Durable, ordered timer collection.
///
/// `load_timers` returns an empty collection when nothing has been stored yet.
/// Insertion order survives a save/load round-trip.
pub trait TimerRepository {
    fn load_timers(&self) -> Result<LoadReport, PersistenceError>;
    fn save_timers(&self, timers: &[Timer]) -> Result<(), PersistenceError>;

    /// Read-modify-write with no other writer in between, across processes
    /// sharing the same store.
    ///
    /// `apply` receives the stored collection and returns the collection to
    /// write, or `None` to leave the store as it is. It is not called when the
    /// store cannot be read; that surfaces as [`PersistenceError::Load`].
    fn update_timers(
        &self,
        apply: &mut dyn FnMut(LoadReport) -> Option<Vec<Timer>>,
    ) -> Result<(), PersistenceError>;
}

/// Append-only log of completed timers, read back newest first.
pub trait HistoryRepository {
    fn append_history(&self, entry: &HistoryEntry) -> Result<(), PersistenceError>;
    fn load_history(&self) -> Result<Vec<HistoryEntry>, PersistenceError>;
    fn clear_history(&self) -> Result<(), PersistenceError>;
}

/// Returns the countdeck data directory, creating it if needed.
///
/// `COUNTDECK_DATA_DIR` overrides the location entirely. Otherwise it is
/// `~/.config/countdeck/`, or `~/.config/countdeck-dev/` with `COUNTDECK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("COUNTDECK_DATA_DIR") {
        Some(path) => PathBuf::from(path),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("COUNTDECK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("countdeck-dev")
            } else {
                base_dir.join("countdeck")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}

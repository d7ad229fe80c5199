pub mod category;
pub mod clear;
pub mod config;
pub mod history;
pub mod run;
pub mod timer;

use countdeck_core::storage::Database;
use countdeck_core::{CoreError, Durability, TimerService};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the timer service over the on-disk store.
pub fn open_service() -> Result<TimerService<Database>, CoreError> {
    let service = TimerService::open(Database::open()?)?;
    for issue in service.load_issues() {
        eprintln!("warning: {issue}");
    }
    Ok(service)
}

/// A CLI invocation exits right after the mutation, so an unsaved change is lost.
pub fn require_committed(durability: Durability) -> Result<(), CoreError> {
    match durability {
        Durability::Committed => Ok(()),
        Durability::NotCommitted(e) => Err(e.into()),
    }
}

/// `mm:ss`, or `h:mm:ss` past an hour.
pub fn format_secs(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

//! In-memory repository, shared between clones.
//!
//! Used by tests and by `countdeck run --ephemeral`. Writes can be made to fail
//! on demand to exercise the persistence-error paths.

use std::sync::{Arc, Mutex, MutexGuard};

use super::records::LoadReport;
use super::{HistoryRepository, TimerRepository};
use crate::error::PersistenceError;
use crate::history::HistoryEntry;
use crate::timer::Timer;

#[derive(Debug, Default)]
struct Inner {
    timers: Vec<Timer>,
    history: Vec<HistoryEntry>,
    fail_saves: bool,
    fail_loads: bool,
    saves: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `timers`.
    pub fn with_timers(timers: Vec<Timer>) -> Self {
        let store = Self::default();
        store.lock().timers = timers;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent save/append fail until switched off.
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Make every subsequent load fail until switched off.
    pub fn fail_loads(&self, fail: bool) {
        self.lock().fail_loads = fail;
    }

    /// Timers as last successfully saved.
    pub fn stored_timers(&self) -> Vec<Timer> {
        self.lock().timers.clone()
    }

    /// Number of successful timer saves.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }
}

impl TimerRepository for MemoryStore {
    fn load_timers(&self) -> Result<LoadReport, PersistenceError> {
        let inner = self.lock();
        if inner.fail_loads {
            return Err(PersistenceError::Load {
                what: "timers",
                message: "injected failure".into(),
            });
        }
        Ok(LoadReport {
            timers: inner.timers.clone(),
            issues: Vec::new(),
        })
    }

    fn save_timers(&self, timers: &[Timer]) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(PersistenceError::Save {
                what: "timers",
                message: "injected failure".into(),
            });
        }
        inner.timers = timers.to_vec();
        inner.saves += 1;
        Ok(())
    }

    fn update_timers(
        &self,
        apply: &mut dyn FnMut(LoadReport) -> Option<Vec<Timer>>,
    ) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.fail_loads {
            return Err(PersistenceError::Load {
                what: "timers",
                message: "injected failure".into(),
            });
        }
        let report = LoadReport {
            timers: inner.timers.clone(),
            issues: Vec::new(),
        };
        let Some(next) = apply(report) else {
            return Ok(());
        };
        if inner.fail_saves {
            return Err(PersistenceError::Save {
                what: "timers",
                message: "injected failure".into(),
            });
        }
        inner.timers = next;
        inner.saves += 1;
        Ok(())
    }
}

impl HistoryRepository for MemoryStore {
    fn append_history(&self, entry: &HistoryEntry) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(PersistenceError::Save {
                what: "history",
                message: "injected failure".into(),
            });
        }
        inner.history.insert(0, entry.clone());
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let inner = self.lock();
        if inner.fail_loads {
            return Err(PersistenceError::Load {
                what: "history",
                message: "injected failure".into(),
            });
        }
        Ok(inner.history.clone())
    }

    fn clear_history(&self) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(PersistenceError::Save {
                what: "history",
                message: "injected failure".into(),
            });
        }
        inner.history.clear();
        Ok(())
    }
}

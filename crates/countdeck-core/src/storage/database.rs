//! SQLite-based timer and history storage.
//!
//! Provides persistent storage for:
//! - The timer collection, as a versioned document in the key-value table
//! - The completed-timer history log
//! - Key-value store for other application state

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use super::migrations;
use super::records::{self, LoadReport};
use super::{data_dir, HistoryRepository, TimerRepository};
use crate::error::{DatabaseError, PersistenceError};
use crate::history::HistoryEntry;
use crate::timer::{Category, Timer, TimerId};

const TIMERS_KEY: &str = "timers";

/// SQLite database holding the timer store and the history log.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/countdeck.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> crate::Result<Self> {
        let path = data_dir()?.join("countdeck.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        // `countdeck run` and one-shot CLI commands share the file.
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn load_err(what: &'static str) -> impl Fn(String) -> PersistenceError {
    move |message| PersistenceError::Load { what, message }
}

fn save_err(what: &'static str) -> impl Fn(String) -> PersistenceError {
    move |message| PersistenceError::Save { what, message }
}

impl TimerRepository for Database {
    fn load_timers(&self) -> Result<LoadReport, PersistenceError> {
        let to_err = load_err("timers");
        match self.kv_get(TIMERS_KEY).map_err(|e| to_err(e.to_string()))? {
            Some(json) => records::decode(&json).map_err(|e| to_err(e.to_string())),
            None => Ok(LoadReport::default()),
        }
    }

    fn save_timers(&self, timers: &[Timer]) -> Result<(), PersistenceError> {
        let to_err = save_err("timers");
        let json = records::encode(timers).map_err(|e| to_err(e.to_string()))?;
        self.kv_set(TIMERS_KEY, &json)
            .map_err(|e| to_err(e.to_string()))
    }

    /// Runs inside `BEGIN IMMEDIATE`, so a second process blocks (up to the
    /// busy timeout) until this read-modify-write has committed.
    fn update_timers(
        &self,
        apply: &mut dyn FnMut(LoadReport) -> Option<Vec<Timer>>,
    ) -> Result<(), PersistenceError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|e| load_err("timers")(e.to_string()))?;
        let report = self.load_timers()?;

        if let Some(next) = apply(report) {
            self.save_timers(&next)?;
        }
        tx.commit().map_err(|e| save_err("timers")(e.to_string()))
    }
}

impl HistoryRepository for Database {
    fn append_history(&self, entry: &HistoryEntry) -> Result<(), PersistenceError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO history (id, timer_id, name, category, duration, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    entry.timer_id.as_ref().map(TimerId::as_str),
                    entry.name,
                    entry.category.map(Category::as_str),
                    entry.duration.map(|d| d as i64),
                    entry.completion_time.to_rfc3339(),
                ],
            )
            .map(|_| ())
            .map_err(|e| save_err("history")(e.to_string()))
    }

    fn load_history(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let to_err = load_err("history");
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timer_id, name, category, duration, completed_at
                 FROM history ORDER BY seq DESC",
            )
            .map_err(|e| to_err(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| to_err(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, timer_id, name, category, duration, completed_at) =
                row.map_err(|e| to_err(e.to_string()))?;
            let completion_time = DateTime::parse_from_rfc3339(&completed_at)
                .map_err(|e| to_err(format!("history entry '{id}': {e}")))?
                .with_timezone(&Utc);
            entries.push(HistoryEntry {
                id,
                timer_id: timer_id.map(TimerId::from),
                name,
                category: category.map(Category::from),
                duration: duration.and_then(|d| u64::try_from(d).ok()),
                completion_time,
            });
        }
        Ok(entries)
    }

    fn clear_history(&self) -> Result<(), PersistenceError> {
        self.conn
            .execute("DELETE FROM history", [])
            .map(|_| ())
            .map_err(|e| save_err("history")(e.to_string()))
    }
}

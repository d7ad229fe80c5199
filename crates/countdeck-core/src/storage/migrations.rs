//! Database schema migrations for countdeck.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use serde::Deserialize;
use tracing::{info, warn};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// kv key under which the history log used to be kept as one JSON array,
/// newest entry first.
pub(crate) const LEGACY_HISTORY_KEY: &str = "completedTimers";

/// `toLocaleString()` output in the en-US locale, e.g. `11/14/2023, 10:13:20 PM`.
const LOCALE_TIME_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

/// One element of the legacy history array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyHistoryItem {
    /// Epoch millis of the completion, as a string.
    id: String,
    name: String,
    /// Free-form local time string.
    completion_time: String,
}

impl LegacyHistoryItem {
    /// RFC 3339 first, then the millis in `id`, then the en-US local format.
    fn completed_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(t) = DateTime::parse_from_rfc3339(&self.completion_time) {
            return Some(t.with_timezone(&Utc));
        }
        if let Some(t) = self
            .id
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        {
            return Some(t);
        }
        NaiveDateTime::parse_from_str(self.completion_time.trim(), LOCALE_TIME_FORMAT)
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a database that has never been migrated.
fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: key-value table and the history log.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS history (
            seq          INTEGER PRIMARY KEY AUTOINCREMENT,
            id           TEXT NOT NULL UNIQUE,
            timer_id     TEXT,
            name         TEXT NOT NULL,
            category     TEXT,
            duration     INTEGER,
            completed_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_completed_at ON history(completed_at);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: move the history blob left in the kv table into rows.
///
/// The blob is newest first, so it is inserted back to front to keep
/// `ORDER BY seq DESC` newest first. Items without a usable completion time
/// are skipped. An unreadable blob is kept in place and logged; it never
/// blocks opening the database.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let blob = match tx.query_row(
        "SELECT value FROM kv WHERE key = ?1",
        params![LEGACY_HISTORY_KEY],
        |row| row.get::<_, String>(0),
    ) {
        Ok(v) => Some(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e),
    };

    if let Some(blob) = blob {
        match serde_json::from_str::<Vec<LegacyHistoryItem>>(&blob) {
            Ok(items) => {
                let mut imported = 0;
                for item in items.iter().rev() {
                    let Some(completed_at) = item.completed_at() else {
                        warn!(id = %item.id, time = %item.completion_time, "skipping legacy history item with unknown time");
                        continue;
                    };
                    imported += tx.execute(
                        "INSERT OR IGNORE INTO history (id, name, completed_at) VALUES (?1, ?2, ?3)",
                        params![item.id, item.name, completed_at.to_rfc3339()],
                    )?;
                }
                tx.execute(
                    "DELETE FROM kv WHERE key = ?1",
                    params![LEGACY_HISTORY_KEY],
                )?;
                info!(imported, total = items.len(), "imported legacy history log");
            }
            Err(e) => warn!(error = %e, "legacy history log is unreadable, leaving it in place"),
        }
    }

    set_schema_version(&tx, 2)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('kv', 'history')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    fn legacy_db(blob: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)",
            params![LEGACY_HISTORY_KEY, blob],
        )
        .unwrap();
        conn
    }

    fn imported(conn: &Connection) -> Vec<(String, String)> {
        conn.prepare("SELECT name, completed_at FROM history ORDER BY seq DESC")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<SqliteResult<_>>()
            .unwrap()
    }

    #[test]
    fn test_locale_string_history_is_imported() {
        let conn = legacy_db(
            r#"[{"id":"1700000000000","name":"Run","completionTime":"11/14/2023, 10:13:20 PM"},
                {"id":"1699900000000","name":"Walk","completionTime":"11/13/2023, 6:26:40 PM"}]"#,
        );

        migrate(&conn).unwrap();

        let rows = imported(&conn);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "Run");
        assert_eq!(rows[1].0, "Walk");
        let run_at = DateTime::parse_from_rfc3339(&rows[0].1).unwrap();
        assert_eq!(run_at.timestamp_millis(), 1_700_000_000_000);

        let left: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM kv WHERE key = ?1",
                params![LEGACY_HISTORY_KEY],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn test_locale_time_is_used_when_id_is_not_millis() {
        let conn = legacy_db(
            r#"[{"id":"a","name":"Stretch","completionTime":"1/2/2024, 9:05:00 AM"},
                {"id":"b","name":"Iso","completionTime":"2024-01-01T08:00:00Z"},
                {"id":"c","name":"Lost","completionTime":"sometime"}]"#,
        );

        migrate(&conn).unwrap();

        let rows = imported(&conn);
        let names: Vec<&str> = rows.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["Stretch", "Iso"]);

        let expected = Local
            .with_ymd_and_hms(2024, 1, 2, 9, 5, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        let stretch_at = DateTime::parse_from_rfc3339(&rows[0].1).unwrap();
        assert_eq!(stretch_at.with_timezone(&Utc), expected);
    }

    #[test]
    fn test_unreadable_history_blob_does_not_block_open() {
        let conn = legacy_db("not json");

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 2);
        assert!(imported(&conn).is_empty());
    }
}

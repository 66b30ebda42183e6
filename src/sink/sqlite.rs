//! SQLite store of completed intervals.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::Sink;
use crate::error::SinkError;
use crate::event::IntervalEvent;

/// Default destination table.
pub const DEFAULT_TABLE: &str = "cg_timetracker";

/// How long a write waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Inserts one row per event, opening a fresh connection for each.
///
/// Event frequency is bounded by human window switching, so there is no
/// pooling or batching.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    path: PathBuf,
    table: String,
}

impl SqliteSink {
    /// `table` must be a plain SQL identifier; it is interpolated into DDL.
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn open(&self) -> Result<Connection, SinkError> {
        let conn = Connection::open(&self.path).map_err(|source| SinkError::Connect {
            path: self.path.clone(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn create_table(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                ID INTEGER PRIMARY KEY AUTOINCREMENT,
                Time_Started TEXT,
                Duration TEXT,
                Time_Ended TEXT,
                Application_Name TEXT,
                Window_Name TEXT,
                Project_Name TEXT,
                Client TEXT,
                Tags TEXT,
                Current_User TEXT
            );",
            table = self.table
        ))
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn record(&self, event: &IntervalEvent) -> Result<(), SinkError> {
        let mut conn = self.open()?;
        self.create_table(&conn)?;

        let row = event.row();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO {} (
                    Time_Started, Duration, Time_Ended, Application_Name, Window_Name,
                    Project_Name, Client, Tags, Current_User
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                self.table
            ),
            params![
                row.time_started,
                row.duration,
                row.time_ended,
                row.application_name,
                row.window_name,
                row.project_name,
                row.client,
                row.tags,
                row.current_user,
            ],
        )?;
        tx.commit()?;

        debug!("Inserted interval into {}.{}", self.path.display(), self.table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    fn idle_event() -> IntervalEvent {
        IntervalEvent::idle(
            Local.with_ymd_and_hms(2024, 1, 15, 9, 0, 11).unwrap(),
            Local.with_ymd_and_hms(2024, 1, 15, 9, 0, 42).unwrap(),
            "alice",
        )
    }

    fn row_count(path: &Path) -> i64 {
        let conn = Connection::open(path).unwrap();
        conn.query_row("SELECT COUNT(*) FROM cg_timetracker", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_creates_table_and_inserts() {
        let dir = tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("tracker.db"), DEFAULT_TABLE);

        sink.record(&idle_event()).unwrap();

        let conn = Connection::open(sink.path()).unwrap();
        let row: (i64, String, String, String, String, String, String, String, String, String) =
            conn.query_row(
                "SELECT ID, Time_Started, Duration, Time_Ended, Application_Name, Window_Name,
                        Project_Name, Client, Tags, Current_User
                 FROM cg_timetracker",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!(row.0, 1);
        assert_eq!(row.1, "2024/01/15 09:00:11");
        assert_eq!(row.2, "0:00:31");
        assert_eq!(row.3, "2024/01/15 09:00:42");
        assert_eq!(row.4, "Unknown");
        assert_eq!(row.5, "Idle");
        assert_eq!(row.6, "idle");
        assert_eq!(row.7, "");
        assert_eq!(row.8, "idle");
        assert_eq!(row.9, "alice");
    }

    #[test]
    fn test_table_creation_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracker.db");

        SqliteSink::new(&path, DEFAULT_TABLE).record(&idle_event()).unwrap();
        SqliteSink::new(&path, DEFAULT_TABLE).record(&idle_event()).unwrap();
        SqliteSink::new(&path, DEFAULT_TABLE).record(&idle_event()).unwrap();

        assert_eq!(row_count(&path), 3);
    }

    #[test]
    fn test_custom_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracker.db");
        let sink = SqliteSink::new(&path, "intervals");

        sink.record(&idle_event()).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM intervals", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unreachable_database_is_an_error() {
        let dir = tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("missing").join("tracker.db"), DEFAULT_TABLE);

        let err = sink.record(&idle_event()).unwrap_err();
        assert!(matches!(err, SinkError::Connect { .. }), "unexpected error: {err:?}");
    }

    #[test]
    fn test_statement_failure_is_a_database_error() {
        let dir = tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("tracker.db"), "not a table");

        let err = sink.record(&idle_event()).unwrap_err();
        assert!(matches!(err, SinkError::Database(_)), "unexpected error: {err:?}");
    }
}

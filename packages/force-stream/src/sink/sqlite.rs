use super::{SampleSink, SinkError, SinkKind, SinkResult};
use crate::types::Sample;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;

/// Relational sink: one `force_readings` row per accepted sample.
#[derive(Debug)]
pub struct SqliteSink {
    name: String,
    conn: Option<Connection>,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path).context("Failed to open force readings database")?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .context("Failed to set SQLite pragmas")?;

        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS force_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT DEFAULT CURRENT_TIMESTAMP,
                force_value REAL
            );",
        )
        .context("Failed to create force_readings table")?;

        Ok(Self {
            name: "sqlite-store".to_string(),
            conn: Some(conn),
        })
    }

    /// Rows currently in `force_readings`
    pub fn row_count(&self) -> SinkResult<u64> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM force_readings", [], |row| {
            row.get(0)
        })?;
        Ok(count.max(0) as u64)
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn connection(&self) -> SinkResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| SinkError::Closed(self.name.clone()))
    }
}

impl SampleSink for SqliteSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Relational
    }

    fn write(&mut self, sample: &Sample) -> SinkResult<()> {
        self.connection()?.execute(
            "INSERT INTO force_readings (force_value) VALUES (?1)",
            params![sample.value],
        )?;
        Ok(())
    }

    fn flush(&mut self, _samples: &[Sample]) -> SinkResult<()> {
        // rows are committed per sample
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| SinkError::Database(e))?;
            log::info!("Closed force readings database");
        }
        Ok(())
    }
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use chunkwise_common::{Error, ExecutionRecord, NewExecutionRecord, Result};
use rusqlite::{Connection, Row, params};
use tracing::{debug, info};

const UNKNOWN_ERROR: &str = "unknown error";

const SELECT_COLUMNS: &str = "SELECT id, migration_name, chunk_id, chunk_name, executed_by, executed_at,
        success, error_message, execution_time_ms
 FROM migration_history";

/// Append-only log of chunk and rollback execution attempts.
///
/// Records are only ever inserted. Nothing in this type updates or deletes
/// a row once written.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open the store at `db_path` and make sure the history table exists.
    pub fn open(db_path: &Path) -> Result<Self> {
        let store = Self::open_uninitialized(db_path)?;
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open without creating the history table. Appends fail until
    /// [`HistoryStore::ensure_schema`] has been called.
    pub fn open_uninitialized(db_path: &Path) -> Result<Self> {
        info!("opening history store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Persistence(format!("failed to open database: {e}")))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Persistence(format!("failed to open in-memory database: {e}")))?;
        let store = Self::from_connection(conn)?;
        store.ensure_schema()?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Persistence(format!("failed to set pragmas: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Persistence("history store lock poisoned".into()))
    }

    /// Create the history table and its index. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS migration_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                migration_name TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                chunk_name TEXT NOT NULL,
                executed_by TEXT NOT NULL,
                executed_at TEXT NOT NULL,
                success INTEGER NOT NULL,
                error_message TEXT,
                execution_time_ms INTEGER NOT NULL CHECK (execution_time_ms >= 0)
            );

            CREATE INDEX IF NOT EXISTS idx_migration_history_name
                ON migration_history(migration_name, id);",
        )
        .map_err(|e| Error::Persistence(format!("failed to create history table: {e}")))?;
        debug!("history table ensured");
        Ok(())
    }

    pub fn is_initialized(&self) -> Result<bool> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'migration_history'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::Persistence(format!("failed to inspect schema: {e}")))?;
        Ok(count > 0)
    }

    /// Persist one attempt. `executed_at` is stamped here.
    ///
    /// `error_message` is kept only for failures, and a failure without
    /// text is stored as "unknown error".
    pub fn append(&self, record: NewExecutionRecord) -> Result<ExecutionRecord> {
        let error_message = if record.success {
            None
        } else {
            Some(
                record
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            )
        };
        let executed_at = Utc::now();
        let elapsed = i64::try_from(record.execution_time_ms).unwrap_or(i64::MAX);

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO migration_history
                (migration_name, chunk_id, chunk_name, executed_by, executed_at,
                 success, error_message, execution_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.migration_name,
                record.chunk_id,
                record.chunk_name,
                record.executed_by,
                executed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                record.success,
                error_message,
                elapsed,
            ],
        )
        .map_err(|e| Error::Persistence(format!("failed to append execution record: {e}")))?;

        Ok(ExecutionRecord {
            id: conn.last_insert_rowid(),
            migration_name: record.migration_name,
            chunk_id: record.chunk_id,
            chunk_name: record.chunk_name,
            executed_by: record.executed_by,
            executed_at,
            success: record.success,
            error_message,
            execution_time_ms: record.execution_time_ms,
        })
    }

    /// Most recent records for one migration, newest first.
    pub fn recent(&self, migration_name: &str, limit: usize) -> Result<Vec<ExecutionRecord>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE migration_name = ?1 ORDER BY id DESC LIMIT ?2"),
            params![migration_name, limit_param(limit)],
        )
    }

    /// Most recent records across every migration, newest first.
    pub fn recent_all(&self, limit: usize) -> Result<Vec<ExecutionRecord>> {
        self.query(
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"),
            params![limit_param(limit)],
        )
    }

    /// Every record for one migration, oldest first.
    pub fn all_for(&self, migration_name: &str) -> Result<Vec<ExecutionRecord>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE migration_name = ?1 ORDER BY id ASC"),
            params![migration_name],
        )
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM migration_history", [], |row| row.get(0))
            .map_err(|e| Error::Persistence(format!("failed to count records: {e}")))?;
        Ok(count as usize)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<ExecutionRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Persistence(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params, record_from_row)
            .map_err(|e| Error::Persistence(format!("failed to query history: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| Error::Persistence(format!("failed to read history row: {e}")))?,
            );
        }
        Ok(records)
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let elapsed: i64 = row.get(8)?;
    Ok(ExecutionRecord {
        id: row.get(0)?,
        migration_name: row.get(1)?,
        chunk_id: row.get(2)?,
        chunk_name: row.get(3)?,
        executed_by: row.get(4)?,
        executed_at: parse_datetime(row.get::<_, String>(5)?),
        success: row.get(6)?,
        error_message: row.get(7)?,
        execution_time_ms: elapsed.max(0) as u64,
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // Rows written by hand through sqlite's datetime('now')
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        })
}

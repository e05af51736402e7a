use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chunkwise_common::{Error, ExecOutcome, Result, SchemaCatalog, SqlExecutor, TableStatus};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};

/// VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 1000;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub busy_timeout: Duration,
    /// Interrupt a statement block that runs longer than this once it holds
    /// the connection. Waiting on another process's lock is bounded by
    /// `busy_timeout` instead.
    pub statement_timeout: Option<Duration>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
            statement_timeout: None,
        }
    }
}

/// Runs chunk SQL against a SQLite database.
///
/// Statements execute on the blocking pool; one block runs at a time per
/// executor.
pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
    statement_timeout: Option<Duration>,
}

impl SqliteExecutor {
    pub fn open(db_path: &Path, options: ExecutorOptions) -> Result<Self> {
        info!("opening sql executor at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        Self::from_connection(conn, options)
    }

    pub fn in_memory(options: ExecutorOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Self::from_connection(conn, options)
    }

    fn from_connection(conn: Connection, options: ExecutorOptions) -> Result<Self> {
        conn.busy_timeout(options.busy_timeout)
            .map_err(|e| Error::Database(format!("failed to set busy timeout: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            statement_timeout: options.statement_timeout,
        })
    }

    async fn run_batch(&self, sql: String) -> ExecOutcome {
        let conn = Arc::clone(&self.conn);
        let statement_timeout = self.statement_timeout;
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| "sql executor lock poisoned".to_string())?;
            match statement_timeout {
                Some(limit) => execute_with_deadline(&conn, &sql, limit),
                None => conn.execute_batch(&sql).map_err(|e| e.to_string()),
            }
        })
        .await
        .map_err(|e| format!("executor task failed: {e}"))?
    }
}

/// Run `sql` on a connection the caller already holds, aborting it from
/// SQLite's progress handler once `limit` has elapsed. The clock starts here,
/// so time spent queued behind another caller does not count against it.
fn execute_with_deadline(conn: &Connection, sql: &str, limit: Duration) -> ExecOutcome {
    let deadline = Instant::now() + limit;
    let expired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&expired);
    conn.progress_handler(
        PROGRESS_OPS,
        Some(move || {
            let over = Instant::now() >= deadline;
            if over {
                flag.store(true, Ordering::Relaxed);
            }
            over
        }),
    );

    let result = conn.execute_batch(sql);
    conn.progress_handler(0, None::<fn() -> bool>);

    match result {
        Ok(()) => Ok(()),
        Err(_) if expired.load(Ordering::Relaxed) => {
            warn!("statement block exceeded {}ms, interrupted", limit.as_millis());
            Err(format!("statement timed out after {}ms", limit.as_millis()))
        }
        Err(e) => Err(e.to_string()),
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> ExecOutcome {
        debug!(bytes = sql.len(), "executing sql block");
        self.run_batch(sql.to_string()).await
    }
}

#[async_trait]
impl SchemaCatalog for SqliteExecutor {
    async fn tables_status(&self, table_names: &[String]) -> Result<Vec<TableStatus>> {
        let conn = Arc::clone(&self.conn);
        let names = table_names.to_vec();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::Database("sql executor lock poisoned".into()))?;
            let mut stmt = conn
                .prepare(
                    "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                )
                .map_err(|e| Error::Database(format!("failed to prepare catalog query: {e}")))?;

            let mut statuses = Vec::with_capacity(names.len());
            for name in names {
                let exists = stmt
                    .query_row(params![name], |_| Ok(()))
                    .optional()
                    .map_err(|e| Error::Database(format!("failed to query catalog: {e}")))?
                    .is_some();
                statuses.push(TableStatus {
                    table_name: name,
                    exists,
                });
            }
            Ok(statuses)
        })
        .await
        .map_err(|e| Error::Database(format!("catalog task failed: {e}")))?
    }
}

use std::sync::Arc;

use chunkwise_common::{
    Error, ExecutionRecord, ROLLBACK_CHUNK_ID, ROLLBACK_CHUNK_NAME, Result,
    rollback_migration_name,
};
use tracing::info;

use crate::chunk_runner::ChunkRunner;
use crate::lock::{self, MigrationLock};
use crate::registry::ChunkRegistry;

/// Runs a migration's hand-written reversal script as one unit.
///
/// The record is logged under `<migration>_rollback` so it never mixes with
/// forward history. A failed rollback is reported and not retried.
pub struct RollbackRunner {
    registry: Arc<ChunkRegistry>,
    chunks: ChunkRunner,
    lock: Option<Arc<dyn MigrationLock>>,
}

impl RollbackRunner {
    pub fn new(registry: Arc<ChunkRegistry>, chunks: ChunkRunner) -> Self {
        Self {
            registry,
            chunks,
            lock: None,
        }
    }

    pub fn with_lock(mut self, lock: Arc<dyn MigrationLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub async fn rollback(
        &self,
        migration_name: &str,
        rollback_sql: &str,
        executed_by: &str,
    ) -> Result<ExecutionRecord> {
        if rollback_sql.trim().is_empty() {
            return Err(Error::Validation("rollback sql cannot be empty".into()));
        }
        // same key as forward runs so a rollback cannot interleave with one
        let _guard = lock::guard(self.lock.as_ref(), migration_name)?;
        info!(migration = migration_name, executed_by, "rolling back migration");

        self.chunks
            .run_sql(
                &rollback_migration_name(migration_name),
                ROLLBACK_CHUNK_ID,
                ROLLBACK_CHUNK_NAME,
                rollback_sql,
                executed_by,
            )
            .await
    }

    /// Roll back using the script registered with the migration.
    pub async fn rollback_registered(
        &self,
        migration_name: &str,
        executed_by: &str,
    ) -> Result<ExecutionRecord> {
        let sql = self
            .registry
            .rollback_sql(migration_name)?
            .ok_or_else(|| {
                Error::Validation(format!("migration {migration_name} has no rollback script"))
            })?
            .to_string();
        self.rollback(migration_name, &sql, executed_by).await
    }
}

use std::sync::Arc;

use chunkwise_common::{Error, ExecutionRecord, MigrationChunk, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::chunk_runner::ChunkRunner;
use crate::lock::{self, MigrationLock};
use crate::registry::ChunkRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed {
        chunk_id: String,
        chunk_name: String,
        error_message: String,
    },
}

/// What one `run_full` call did. Not persisted; the history store holds the
/// individual records.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRunResult {
    pub migration_name: String,
    pub records: Vec<ExecutionRecord>,
    /// Sum of the per-chunk execution times.
    pub total_execution_time_ms: u64,
    pub outcome: RunOutcome,
}

impl MigrationRunResult {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    pub fn chunks_executed(&self) -> usize {
        self.records.len()
    }

    pub fn failed_chunk(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Failed { chunk_id, .. } => Some(chunk_id),
            RunOutcome::Completed => None,
        }
    }
}

/// Runs a migration's chunks in order, stopping at the first failure.
///
/// There is no automatic resume: chunks before the failure stay applied and
/// the operator re-runs individual chunks with [`MigrationRunner::run_single_chunk`].
pub struct MigrationRunner {
    registry: Arc<ChunkRegistry>,
    chunks: ChunkRunner,
    lock: Option<Arc<dyn MigrationLock>>,
}

impl MigrationRunner {
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

    pub async fn run_full(
        &self,
        migration_name: &str,
        executed_by: &str,
    ) -> Result<MigrationRunResult> {
        let chunks = self.registry.chunks_for(migration_name)?;
        let _guard = lock::guard(self.lock.as_ref(), migration_name)?;

        info!(
            migration = migration_name,
            chunks = chunks.len(),
            executed_by,
            "starting full migration"
        );

        let mut records = Vec::with_capacity(chunks.len());
        let mut total_ms = 0u64;

        for chunk in chunks {
            let record = self.chunks.run(chunk, migration_name, executed_by).await?;
            total_ms = total_ms.saturating_add(record.execution_time_ms);
            let failed = !record.success;
            let error_message = record.error_message.clone();
            records.push(record);

            if failed {
                warn!(
                    migration = migration_name,
                    chunk = %chunk.id,
                    executed = records.len(),
                    remaining = chunks.len() - records.len(),
                    "migration stopped at failing chunk"
                );
                return Ok(MigrationRunResult {
                    migration_name: migration_name.to_string(),
                    records,
                    total_execution_time_ms: total_ms,
                    outcome: RunOutcome::Failed {
                        chunk_id: chunk.id.clone(),
                        chunk_name: chunk.name.clone(),
                        error_message: error_message.unwrap_or_default(),
                    },
                });
            }
        }

        info!(
            migration = migration_name,
            chunks = records.len(),
            total_ms,
            "migration completed"
        );
        Ok(MigrationRunResult {
            migration_name: migration_name.to_string(),
            records,
            total_execution_time_ms: total_ms,
            outcome: RunOutcome::Completed,
        })
    }

    /// Re-run one registered chunk, regardless of the state of the others.
    pub async fn run_single_chunk(
        &self,
        migration_name: &str,
        chunk_id: &str,
        executed_by: &str,
    ) -> Result<ExecutionRecord> {
        let chunk = self.registry.chunk_for(migration_name, chunk_id)?;
        let _guard = lock::guard(self.lock.as_ref(), migration_name)?;
        info!(migration = migration_name, chunk = chunk_id, executed_by, "running single chunk");
        self.chunks.run(chunk, migration_name, executed_by).await
    }

    /// Execute caller-supplied SQL under the same tracking as a registered
    /// chunk. The migration name does not need to be registered.
    pub async fn run_adhoc(
        &self,
        migration_name: &str,
        chunk: &MigrationChunk,
        executed_by: &str,
    ) -> Result<ExecutionRecord> {
        if chunk.sql.trim().is_empty() {
            return Err(Error::Validation("sql cannot be empty".into()));
        }
        let _guard = lock::guard(self.lock.as_ref(), migration_name)?;
        info!(migration = migration_name, chunk = %chunk.id, executed_by, "running ad-hoc chunk");
        self.chunks.run(chunk, migration_name, executed_by).await
    }
}

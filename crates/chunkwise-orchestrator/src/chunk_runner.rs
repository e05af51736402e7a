use std::sync::Arc;
use std::time::Instant;

use chunkwise_common::{ExecutionRecord, MigrationChunk, NewExecutionRecord, Result, SqlExecutor};
use chunkwise_db::HistoryStore;
use tracing::{info, warn};

/// Executes one chunk and records exactly one history entry for it.
#[derive(Clone)]
pub struct ChunkRunner {
    executor: Arc<dyn SqlExecutor>,
    history: Arc<HistoryStore>,
}

impl ChunkRunner {
    pub fn new(executor: Arc<dyn SqlExecutor>, history: Arc<HistoryStore>) -> Self {
        Self { executor, history }
    }

    /// A failing chunk comes back as `Ok` with `success == false`; only a
    /// history write failure is an `Err`.
    pub async fn run(
        &self,
        chunk: &MigrationChunk,
        migration_name: &str,
        executed_by: &str,
    ) -> Result<ExecutionRecord> {
        self.run_sql(migration_name, &chunk.id, &chunk.name, &chunk.sql, executed_by)
            .await
    }

    pub(crate) async fn run_sql(
        &self,
        migration_name: &str,
        chunk_id: &str,
        chunk_name: &str,
        sql: &str,
        executed_by: &str,
    ) -> Result<ExecutionRecord> {
        info!(migration = migration_name, chunk = chunk_id, "executing chunk");
        let started = Instant::now();
        let outcome = self.executor.execute(sql).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (success, error_message) = match outcome {
            Ok(()) => {
                info!(
                    migration = migration_name,
                    chunk = chunk_id,
                    elapsed_ms,
                    "chunk succeeded"
                );
                (true, None)
            }
            Err(e) => {
                warn!(
                    migration = migration_name,
                    chunk = chunk_id,
                    elapsed_ms,
                    error = %e,
                    "chunk failed"
                );
                (false, Some(e))
            }
        };

        self.history.append(NewExecutionRecord {
            migration_name: migration_name.to_string(),
            chunk_id: chunk_id.to_string(),
            chunk_name: chunk_name.to_string(),
            executed_by: executed_by.to_string(),
            success,
            error_message,
            execution_time_ms: elapsed_ms,
        })
    }
}

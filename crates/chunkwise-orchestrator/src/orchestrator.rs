use std::sync::Arc;

use chunkwise_common::{SchemaCatalog, SqlExecutor};
use chunkwise_db::HistoryStore;

use crate::chunk_runner::ChunkRunner;
use crate::lock::MigrationLock;
use crate::migration_runner::MigrationRunner;
use crate::registry::ChunkRegistry;
use crate::rollback::RollbackRunner;
use crate::status::StatusReporter;

/// Wires the runners and the reporter around one registry, executor and
/// history store.
pub struct Orchestrator {
    registry: Arc<ChunkRegistry>,
    history: Arc<HistoryStore>,
    migrations: MigrationRunner,
    rollbacks: RollbackRunner,
    status: StatusReporter,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ChunkRegistry>,
        executor: Arc<dyn SqlExecutor>,
        catalog: Arc<dyn SchemaCatalog>,
        history: Arc<HistoryStore>,
        lock: Option<Arc<dyn MigrationLock>>,
    ) -> Self {
        let chunks = ChunkRunner::new(executor, history.clone());

        let mut migrations = MigrationRunner::new(registry.clone(), chunks.clone());
        let mut rollbacks = RollbackRunner::new(registry.clone(), chunks);
        if let Some(lock) = lock {
            migrations = migrations.with_lock(lock.clone());
            rollbacks = rollbacks.with_lock(lock);
        }

        Self {
            status: StatusReporter::new(registry.clone(), history.clone(), catalog),
            registry,
            history,
            migrations,
            rollbacks,
        }
    }

    pub fn registry(&self) -> &ChunkRegistry {
        &self.registry
    }

    pub fn history_store(&self) -> &HistoryStore {
        &self.history
    }

    pub fn migrations(&self) -> &MigrationRunner {
        &self.migrations
    }

    pub fn rollbacks(&self) -> &RollbackRunner {
        &self.rollbacks
    }

    pub fn status(&self) -> &StatusReporter {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{INSTAGRAM_SCRAPER_SCHEMA, INSTAGRAM_TABLES};
    use crate::lock::LocalMigrationLock;
    use crate::state::MigrationState;
    use chunkwise_db::{ExecutorOptions, SqliteExecutor};

    #[tokio::test]
    async fn builtin_migration_end_to_end_on_sqlite() {
        let exec = Arc::new(SqliteExecutor::in_memory(ExecutorOptions::default()).unwrap());
        let history = Arc::new(HistoryStore::in_memory().unwrap());
        let lock: Arc<dyn MigrationLock> = Arc::new(LocalMigrationLock::new());
        let orchestrator = Orchestrator::new(
            Arc::new(ChunkRegistry::builtin()),
            exec.clone(),
            exec,
            history,
            Some(lock),
        );

        let result = orchestrator
            .migrations()
            .run_full(INSTAGRAM_SCRAPER_SCHEMA, "ops")
            .await
            .unwrap();
        assert!(result.is_success());

        let tables = orchestrator
            .status()
            .expected_tables_status(INSTAGRAM_SCRAPER_SCHEMA)
            .await
            .unwrap();
        assert_eq!(tables.len(), INSTAGRAM_TABLES.len());
        assert!(tables.iter().all(|t| t.exists));
        assert_eq!(
            orchestrator.status().state(INSTAGRAM_SCRAPER_SCHEMA).unwrap(),
            MigrationState::Completed
        );

        let record = orchestrator
            .rollbacks()
            .rollback_registered(INSTAGRAM_SCRAPER_SCHEMA, "ops")
            .await
            .unwrap();
        assert!(record.success);

        let tables = orchestrator
            .status()
            .expected_tables_status(INSTAGRAM_SCRAPER_SCHEMA)
            .await
            .unwrap();
        assert!(tables.iter().all(|t| !t.exists));
        assert_eq!(
            orchestrator.history_store().count().unwrap(),
            result.chunks_executed() + 1
        );
    }
}

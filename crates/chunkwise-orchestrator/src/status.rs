use std::sync::Arc;

use chrono::{DateTime, Utc};
use chunkwise_common::{
    ChunkSummary, ExecutionRecord, Result, SchemaCatalog, TableStatus, rollback_migration_name,
};
use chunkwise_db::HistoryStore;
use serde::Serialize;

use crate::registry::ChunkRegistry;
use crate::state::{self, MigrationState};

/// Latest recorded attempt at one chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkAttempt {
    pub success: bool,
    pub executed_at: DateTime<Utc>,
    pub executed_by: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkStatus {
    pub id: String,
    pub name: String,
    pub last_attempt: Option<ChunkAttempt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub migration_name: String,
    pub state: MigrationState,
    pub chunks: Vec<ChunkStatus>,
    pub tables: Vec<TableStatus>,
    pub recent_history: Vec<ExecutionRecord>,
}

/// Read-only questions about migrations. Nothing here writes.
pub struct StatusReporter {
    registry: Arc<ChunkRegistry>,
    history: Arc<HistoryStore>,
    catalog: Arc<dyn SchemaCatalog>,
}

impl StatusReporter {
    pub fn new(
        registry: Arc<ChunkRegistry>,
        history: Arc<HistoryStore>,
        catalog: Arc<dyn SchemaCatalog>,
    ) -> Self {
        Self {
            registry,
            history,
            catalog,
        }
    }

    pub fn list_chunks(&self, migration_name: &str) -> Result<Vec<ChunkSummary>> {
        self.registry.summaries(migration_name)
    }

    pub fn available_migrations(&self) -> Vec<String> {
        self.registry
            .migration_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Newest first, at most `limit` records. Any name is accepted so
    /// rollback and ad-hoc history can be read too.
    pub fn history(&self, migration_name: &str, limit: usize) -> Result<Vec<ExecutionRecord>> {
        self.history.recent(migration_name, limit)
    }

    /// Newest first across every migration name, including rollbacks.
    pub fn history_all(&self, limit: usize) -> Result<Vec<ExecutionRecord>> {
        self.history.recent_all(limit)
    }

    pub async fn tables_status(&self, expected: &[String]) -> Result<Vec<TableStatus>> {
        self.catalog.tables_status(expected).await
    }

    /// Status of the tables registered as the migration's expected output.
    pub async fn expected_tables_status(&self, migration_name: &str) -> Result<Vec<TableStatus>> {
        let expected = self.registry.expected_tables(migration_name)?;
        self.tables_status(expected).await
    }

    pub fn state(&self, migration_name: &str) -> Result<MigrationState> {
        let chunks = self.registry.chunks_for(migration_name)?;
        let forward = self.history.all_for(migration_name)?;
        let rollbacks = self
            .history
            .all_for(&rollback_migration_name(migration_name))?;
        Ok(state::derive(chunks, &forward, &rollbacks))
    }

    pub async fn report(&self, migration_name: &str, limit: usize) -> Result<MigrationReport> {
        let chunks = self.registry.chunks_for(migration_name)?;
        let forward = self.history.all_for(migration_name)?;
        let rollbacks = self
            .history
            .all_for(&rollback_migration_name(migration_name))?;

        let chunk_statuses = chunks
            .iter()
            .map(|chunk| ChunkStatus {
                id: chunk.id.clone(),
                name: chunk.name.clone(),
                last_attempt: forward
                    .iter()
                    .rev()
                    .find(|r| r.chunk_id == chunk.id)
                    .map(|r| ChunkAttempt {
                        success: r.success,
                        executed_at: r.executed_at,
                        executed_by: r.executed_by.clone(),
                        error_message: r.error_message.clone(),
                    }),
            })
            .collect();

        Ok(MigrationReport {
            migration_name: migration_name.to_string(),
            state: state::derive(chunks, &forward, &rollbacks),
            chunks: chunk_statuses,
            tables: self.expected_tables_status(migration_name).await?,
            recent_history: self.history(migration_name, limit)?,
        })
    }
}

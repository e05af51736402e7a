use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chunk id used for full-rollback history records.
pub const ROLLBACK_CHUNK_ID: &str = "rollback";
pub const ROLLBACK_CHUNK_NAME: &str = "Full Rollback";
/// Appended to a migration name to form the name its rollbacks are logged under.
pub const ROLLBACK_SUFFIX: &str = "_rollback";

pub fn rollback_migration_name(migration: &str) -> String {
    format!("{migration}{ROLLBACK_SUFFIX}")
}

/// One named unit of migration SQL. Position in the owning migration's list
/// is its execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationChunk {
    pub id: String,
    pub name: String,
    pub sql: String,
}

impl MigrationChunk {
    pub fn new(id: impl Into<String>, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sql: sql.into(),
        }
    }

    pub fn summary(&self) -> ChunkSummary {
        ChunkSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub id: String,
    pub name: String,
}

/// An execution attempt that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExecutionRecord {
    pub migration_name: String,
    pub chunk_id: String,
    pub chunk_name: String,
    pub executed_by: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

/// Immutable audit-log entry for one chunk (or rollback) execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub migration_name: String,
    pub chunk_id: String,
    pub chunk_name: String,
    pub executed_by: String,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

impl ExecutionRecord {
    pub fn is_rollback(&self) -> bool {
        self.chunk_id == ROLLBACK_CHUNK_ID
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatus {
    pub table_name: String,
    pub exists: bool,
}

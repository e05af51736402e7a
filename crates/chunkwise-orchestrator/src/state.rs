use std::collections::HashMap;

use chunkwise_common::{ExecutionRecord, MigrationChunk};
use serde::Serialize;

/// Current state of a migration, always recomputed from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    NotStarted,
    /// Some chunks have records but the migration neither completed nor
    /// stopped on a failure. A run that crashed midway looks like this.
    Partial { succeeded: usize, total: usize },
    Completed,
    Failed {
        chunk_id: String,
        error_message: Option<String>,
    },
    RolledBack,
}

/// Derive the state of a migration.
///
/// `forward` and `rollbacks` may be in any order; record ids give the write
/// order. Forward records written before the latest successful rollback do
/// not count.
pub fn derive(
    chunks: &[MigrationChunk],
    forward: &[ExecutionRecord],
    rollbacks: &[ExecutionRecord],
) -> MigrationState {
    let cutoff = rollbacks
        .iter()
        .filter(|r| r.success && r.is_rollback())
        .map(|r| r.id)
        .max();

    let live: Vec<&ExecutionRecord> = forward
        .iter()
        .filter(|r| cutoff.is_none_or(|c| r.id > c))
        .collect();

    if live.is_empty() {
        return if cutoff.is_some() {
            MigrationState::RolledBack
        } else {
            MigrationState::NotStarted
        };
    }

    let mut latest: HashMap<&str, &ExecutionRecord> = HashMap::new();
    for &record in &live {
        latest
            .entry(record.chunk_id.as_str())
            .and_modify(|cur| {
                if record.id > cur.id {
                    *cur = record;
                }
            })
            .or_insert(record);
    }

    let last_success = |id: &str| latest.get(id).map(|r| r.success);

    if chunks.iter().all(|c| last_success(&c.id) == Some(true)) {
        return MigrationState::Completed;
    }

    for (idx, chunk) in chunks.iter().enumerate() {
        let Some(record) = latest.get(chunk.id.as_str()) else {
            continue;
        };
        if record.success {
            continue;
        }
        let later_succeeded = chunks[idx + 1..]
            .iter()
            .any(|later| live.iter().any(|r| r.chunk_id == later.id && r.success));
        if !later_succeeded {
            return MigrationState::Failed {
                chunk_id: chunk.id.clone(),
                error_message: record.error_message.clone(),
            };
        }
    }

    MigrationState::Partial {
        succeeded: chunks
            .iter()
            .filter(|c| last_success(&c.id) == Some(true))
            .count(),
        total: chunks.len(),
    }
}

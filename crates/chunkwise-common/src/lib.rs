pub mod error;
pub mod executor;
pub mod model;

pub use error::{Error, Result};
pub use executor::{ExecOutcome, SchemaCatalog, SqlExecutor};
pub use model::{
    ChunkSummary, ExecutionRecord, MigrationChunk, NewExecutionRecord, ROLLBACK_CHUNK_ID,
    ROLLBACK_CHUNK_NAME, ROLLBACK_SUFFIX, TableStatus, rollback_migration_name,
};

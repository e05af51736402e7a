pub mod builtin;
pub mod chunk_runner;
pub mod lock;
pub mod migration_runner;
pub mod orchestrator;
pub mod registry;
pub mod rollback;
pub mod state;
pub mod status;

#[cfg(test)]
mod testing;

pub use chunk_runner::ChunkRunner;
pub use lock::{LocalMigrationLock, LockGuard, MigrationLock};
pub use migration_runner::{MigrationRunResult, MigrationRunner, RunOutcome};
pub use orchestrator::Orchestrator;
pub use registry::{ChunkRegistry, MigrationDef, RegistryBuilder};
pub use rollback::RollbackRunner;
pub use state::MigrationState;
pub use status::{ChunkAttempt, ChunkStatus, MigrationReport, StatusReporter};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::TableStatus;

/// Outcome of handing one SQL block to an executor. `Err` carries the
/// executor's raw error text and is a normal, recordable result.
pub type ExecOutcome = std::result::Result<(), String>;

/// Opaque capability that runs a block of SQL text.
///
/// Implementations must not interpret the SQL; any timeout they apply is
/// reported as a failed outcome.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> ExecOutcome;
}

/// Read-only view of the execution environment's catalog.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Report, in input order, whether each named table exists.
    async fn tables_status(&self, table_names: &[String]) -> Result<Vec<TableStatus>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl SqlExecutor for Echo {
        async fn execute(&self, sql: &str) -> ExecOutcome {
            if sql.trim().is_empty() {
                Err("empty statement".into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn executor_is_object_safe() {
        let exec: Box<dyn SqlExecutor> = Box::new(Echo);
        assert!(exec.execute("SELECT 1").await.is_ok());
        assert_eq!(exec.execute("  ").await, Err("empty statement".to_string()));
    }
}

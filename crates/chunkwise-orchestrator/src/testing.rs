use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chunkwise_common::{ExecOutcome, Result, SchemaCatalog, SqlExecutor, TableStatus};
use chunkwise_db::HistoryStore;

use crate::registry::{ChunkRegistry, MigrationDef};

/// Executor double: any SQL containing "FAIL" errors, everything else
/// succeeds. Every call is recorded in order.
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<String>>,
    fixed: HashSet<String>,
}

impl ScriptedExecutor {
    /// Treat the listed SQL texts as succeeding even if they contain "FAIL".
    pub fn fixed<I: IntoIterator<Item = &'static str>>(sql: I) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fixed: sql.into_iter().map(String::from).collect(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for ScriptedExecutor {
    async fn execute(&self, sql: &str) -> ExecOutcome {
        self.calls.lock().unwrap().push(sql.to_string());
        if sql.contains("FAIL") && !self.fixed.contains(sql) {
            Err(format!("simulated failure: {sql}"))
        } else {
            Ok(())
        }
    }
}

/// Catalog double backed by a fixed set of table names.
pub struct FakeCatalog(pub HashSet<String>);

#[async_trait]
impl SchemaCatalog for FakeCatalog {
    async fn tables_status(&self, table_names: &[String]) -> Result<Vec<TableStatus>> {
        Ok(table_names
            .iter()
            .map(|name| TableStatus {
                table_name: name.clone(),
                exists: self.0.contains(name),
            })
            .collect())
    }
}

/// `m = [a: OK, b: FAIL, c: OK]` with a rollback script.
pub fn abc_registry() -> Arc<ChunkRegistry> {
    let mut builder = ChunkRegistry::builder();
    builder
        .register(
            MigrationDef::new("m")
                .chunk("a", "Chunk A", "OK a")
                .chunk("b", "Chunk B", "FAIL b")
                .chunk("c", "Chunk C", "OK c")
                .rollback("DROP everything")
                .expected_tables(["table_a", "table_c"]),
        )
        .unwrap();
    builder
        .register(
            MigrationDef::new("clean")
                .chunk("x", "Chunk X", "OK x")
                .chunk("y", "Chunk Y", "OK y"),
        )
        .unwrap();
    Arc::new(builder.build())
}

pub fn history() -> Arc<HistoryStore> {
    Arc::new(HistoryStore::in_memory().unwrap())
}

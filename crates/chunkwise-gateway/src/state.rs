use std::sync::Arc;
use std::time::Duration;

use chunkwise_common::{Error, Result};
use chunkwise_config::{AppConfig, MigrationConfig};
use chunkwise_db::{ExecutorOptions, HistoryStore, SqliteExecutor};
use chunkwise_orchestrator::{
    ChunkRegistry, LocalMigrationLock, MigrationDef, MigrationLock, Orchestrator, RegistryBuilder,
};
use chunkwise_security::ApiKeyAuthenticator;
use tracing::{info, warn};

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
    pub auth: ApiKeyAuthenticator,
}

impl AppState {
    pub fn new(config: AppConfig, orchestrator: Orchestrator) -> Self {
        let auth = ApiKeyAuthenticator::new(&config.gateway.api_keys);
        Self {
            config,
            orchestrator,
            auth,
        }
    }

    /// Open the database, build the registry and wire the orchestrator.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let registry = build_registry(&config.migrations)?;
        if !registry.contains(&config.default_migration) {
            return Err(Error::Config(format!(
                "default migration {} is not registered",
                config.default_migration
            )));
        }

        let db_path = config.database.resolved_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let executor = Arc::new(SqliteExecutor::open(
            &db_path,
            ExecutorOptions {
                busy_timeout: Duration::from_millis(config.database.busy_timeout_ms),
                statement_timeout: config.database.statement_timeout_ms.map(Duration::from_millis),
            },
        )?);

        let history = if config.database.auto_init {
            HistoryStore::open(&db_path)?
        } else {
            let store = HistoryStore::open_uninitialized(&db_path)?;
            if !store.is_initialized()? {
                warn!("history table missing, run the init action before migrating");
            }
            store
        };

        let lock: Arc<dyn MigrationLock> = Arc::new(LocalMigrationLock::new());
        let orchestrator = Orchestrator::new(
            Arc::new(registry),
            executor.clone(),
            executor,
            Arc::new(history),
            Some(lock),
        );

        info!(
            "orchestrator ready: database={}, migrations={}",
            db_path.display(),
            orchestrator.registry().migration_names().join(", ")
        );
        Ok(Self::new(config, orchestrator))
    }
}

/// Built-in migrations followed by the ones defined in config. SQL files
/// must already have been inlined by the config loader.
pub fn build_registry(migrations: &[MigrationConfig]) -> Result<ChunkRegistry> {
    let mut builder = RegistryBuilder::with_builtins();
    for migration in migrations {
        let mut def = MigrationDef::new(&migration.name)
            .expected_tables(migration.expected_tables.iter().cloned());
        for chunk in &migration.chunks {
            let sql = chunk.sql.clone().ok_or_else(|| {
                Error::Config(format!(
                    "chunk {} in migration {} has no resolved sql",
                    chunk.id, migration.name
                ))
            })?;
            def = def.chunk(&chunk.id, &chunk.name, sql);
        }
        if let Some(rollback) = &migration.rollback_sql {
            def = def.rollback(rollback);
        }
        builder.register(def)?;
    }
    Ok(builder.build())
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;
    use chunkwise_config::ChunkConfig;

    fn migration(name: &str, sql: Option<&str>) -> MigrationConfig {
        MigrationConfig {
            name: name.into(),
            chunks: vec![ChunkConfig {
                id: "a".into(),
                name: "A".into(),
                sql: sql.map(String::from),
                sql_file: None,
            }],
            rollback_sql: Some("DROP TABLE a;".into()),
            rollback_file: None,
            expected_tables: vec!["a".into()],
        }
    }

    #[test]
    fn registry_includes_builtin_and_configured() {
        let registry = build_registry(&[migration("reports", Some("CREATE TABLE a (id INTEGER);"))])
            .unwrap();
        assert_eq!(
            registry.migration_names(),
            vec!["instagram_scraper_schema", "reports"]
        );
        assert_eq!(registry.rollback_sql("reports").unwrap(), Some("DROP TABLE a;"));
        assert_eq!(registry.expected_tables("reports").unwrap(), ["a".to_string()]);
    }

    #[test]
    fn unresolved_sql_is_rejected() {
        let err = build_registry(&[migration("reports", None)]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_default_migration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database.path = Some(dir.path().join("app.db"));
        config.default_migration = "missing".into();
        assert!(matches!(
            AppState::from_config(config),
            Err(Error::Config(_))
        ));
    }
}

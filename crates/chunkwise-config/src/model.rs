use std::collections::HashSet;
use std::path::PathBuf;

use chunkwise_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIGRATION: &str = "instagram_scraper_schema";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    /// Migration used when a request does not name one.
    pub default_migration: String,
    /// Deployment-defined migrations, registered next to the built-in ones.
    pub migrations: Vec<MigrationConfig>,
    pub history: HistoryConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            default_migration: DEFAULT_MIGRATION.to_string(),
            migrations: Vec::new(),
            history: HistoryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            api_keys: Vec::new(),
        }
    }
}

/// A caller credential. Only the SHA-256 of the key is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub identity: String,
    pub key_sha256: String,
    #[serde(default)]
    pub role: ApiKeyRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyRole {
    Admin,
    #[default]
    Viewer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub statement_timeout_ms: Option<u64>,
    /// Create the history table at startup instead of waiting for `init`.
    pub auto_init: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
            statement_timeout_ms: None,
            auto_init: true,
        }
    }
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".chunkwise")
                .join("data")
                .join("app.db")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub name: String,
    pub chunks: Vec<ChunkConfig>,
    #[serde(default)]
    pub rollback_sql: Option<String>,
    #[serde(default)]
    pub rollback_file: Option<PathBuf>,
    #[serde(default)]
    pub expected_tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub sql_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
        }
    }
}

impl HistoryConfig {
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Structural checks that do not touch the filesystem.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for migration in &self.migrations {
            if migration.name.trim().is_empty() {
                return Err(Error::Config("migration name cannot be empty".into()));
            }
            if !names.insert(migration.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate migration name: {}",
                    migration.name
                )));
            }
            migration.validate()?;
        }

        for key in &self.gateway.api_keys {
            if key.identity.trim().is_empty() {
                return Err(Error::Config("api key identity cannot be empty".into()));
            }
            let hash = key.key_sha256.trim();
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::Config(format!(
                    "api key for {} must be a 64-character sha256 hex digest",
                    key.identity
                )));
            }
        }

        if self.history.default_limit == 0 {
            return Err(Error::Config("history.default_limit must be positive".into()));
        }
        Ok(())
    }
}

impl MigrationConfig {
    fn validate(&self) -> Result<()> {
        if self.chunks.is_empty() {
            return Err(Error::Config(format!(
                "migration {} has no chunks",
                self.name
            )));
        }

        let mut ids = HashSet::new();
        for chunk in &self.chunks {
            if chunk.id.trim().is_empty() {
                return Err(Error::Config(format!(
                    "migration {} has a chunk with an empty id",
                    self.name
                )));
            }
            if !ids.insert(chunk.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate chunk id {} in migration {}",
                    chunk.id, self.name
                )));
            }
            if chunk.sql.is_some() == chunk.sql_file.is_some() {
                return Err(Error::Config(format!(
                    "chunk {} in migration {} must set exactly one of sql or sql_file",
                    chunk.id, self.name
                )));
            }
        }

        if self.rollback_sql.is_some() && self.rollback_file.is_some() {
            return Err(Error::Config(format!(
                "migration {} sets both rollback_sql and rollback_file",
                self.name
            )));
        }
        Ok(())
    }
}

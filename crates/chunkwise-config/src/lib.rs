pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{
    ApiKeyConfig, ApiKeyRole, AppConfig, ChunkConfig, DatabaseConfig, GatewayConfig,
    HistoryConfig, LogConfig, MigrationConfig,
};

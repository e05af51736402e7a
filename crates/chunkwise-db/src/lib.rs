pub mod history_store;
pub mod sqlite_executor;

pub use history_store::HistoryStore;
pub use sqlite_executor::{ExecutorOptions, SqliteExecutor};

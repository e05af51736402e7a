use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown migration: {0}")]
    UnknownMigration(String),

    #[error("unknown chunk '{chunk}' in migration '{migration}'")]
    UnknownChunk { migration: String, chunk: String },

    /// The execution log could not be written or read.
    #[error("history persistence error: {0}")]
    Persistence(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration locked: {0}")]
    Locked(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Registry lookup failures, raised before anything is executed.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Error::UnknownMigration(_) | Error::UnknownChunk { .. })
    }
}

//! Infrastructure errors shared by the metrology crates
//!
//! Business-rule failures (duplicate certificates, repetition ceilings) live
//! in `metro-cal`; this enum only covers storage, files and configuration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite failure, including UNIQUE and CHECK constraint rejections
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database file or config file access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable TOML or unusable root folder
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tenant-scoped lookup found no live row; carries the entity name
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored value that no longer decodes (bad UUID, unknown outcome)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Write rejected by one of the uniqueness indexes (live instrument
    /// code, live certificate per instrument, due date per instrument)
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

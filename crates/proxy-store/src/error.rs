//! Proxy store errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Number already in pool: {0}")]
    DuplicateNumber(String),

    #[error("Number not in pool: {0}")]
    NumberNotFound(String),

    #[error("Number {number} is bound to session {session_id}")]
    NumberInUse { number: String, session_id: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Backend(format!("Storage task failed: {}", e))
    }
}

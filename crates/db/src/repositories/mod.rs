use cloudscope_core::errors::AuditError;
use thiserror::Error;

pub mod query_history;

pub use query_history::{SqlQueryAuditLog, MAX_HISTORY_LIMIT};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for AuditError {
    fn from(error: RepositoryError) -> Self {
        AuditError::Storage(error.to_string())
    }
}

//! MySQL storage for ten minute archive buckets
//!
//! Each bucket is one row holding the JSON document and a version counter.
//! Writers update a row only if its version is unchanged since they read it,
//! so concurrent ingesters never overwrite each other's samples.

pub mod client;
pub mod queries;
pub mod schema;

pub use client::*;
pub use schema::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl DbError {
    /// Whether the failure is a connectivity problem worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::ConnectionError(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            DbError::ConfigError(_) => false,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(DbError::from(sqlx::Error::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset
        )))
        .is_transient());
        assert!(!DbError::from(sqlx::Error::RowNotFound).is_transient());
        assert!(!DbError::ConfigError("bad".into()).is_transient());
    }
}

//! Error types for the SQLite checkpoint store
//!
//! Backend failures are wrapped here and converted into the facade's
//! [`CheckpointError`] at the trait boundary, propagated unmodified in
//! substance: the store performs no internal retry and never swallows an
//! error to produce a default value.

use hearth_checkpoint::CheckpointError;
use thiserror::Error;

/// Errors raised inside the SQLite store before crossing the facade boundary
#[derive(Debug, Error)]
pub enum SqliteSaverError {
    /// Query or connection failure from the backend
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration failure while preparing the schema
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// JSON (de)serialization failure for a persisted column
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Failure inside the shared codec layer
    #[error(transparent)]
    Codec(#[from] CheckpointError),
}

impl From<SqliteSaverError> for CheckpointError {
    fn from(err: SqliteSaverError) -> Self {
        match err {
            SqliteSaverError::Sqlx(e) => CheckpointError::Storage(e.to_string()),
            SqliteSaverError::Migrate(e) => CheckpointError::Storage(e.to_string()),
            SqliteSaverError::Serde(e) => CheckpointError::Serialization(e),
            SqliteSaverError::Codec(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_errors_surface_as_storage() {
        let err: CheckpointError = SqliteSaverError::Sqlx(sqlx::Error::PoolClosed).into();
        assert!(matches!(err, CheckpointError::Storage(_)));
    }

    #[test]
    fn test_codec_errors_pass_through() {
        let inner = CheckpointError::Invalid("unknown value type tag: pickle".to_string());
        let err: CheckpointError = SqliteSaverError::Codec(inner).into();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }
}

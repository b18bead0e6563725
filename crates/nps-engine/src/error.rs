//! Error types for the engine layer.

use std::path::PathBuf;
use thiserror::Error;

use nps_ingest::IngestError;

use crate::connection::Capability;

/// Errors raised by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An operation needed the engine handle while disconnected.
    #[error("engine is not connected")]
    NotConnected,

    /// Opening the engine handle failed.
    #[error("failed to open engine at {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: duckdb::Error,
    },

    /// Source file missing for a direct registration.
    #[error("source file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The file extension does not map to a known source format.
    #[error("unrecognised source format for {path}")]
    UnknownFormat { path: PathBuf },

    /// A relation name failed the identifier allow-list.
    #[error("invalid relation name '{name}': use letters, digits and '_' only")]
    InvalidIdentifier { name: String },

    /// A capability the operation needs was not loaded at connect time.
    #[error("capability '{capability}' is unavailable, cannot register {path}")]
    CapabilityUnavailable {
        capability: Capability,
        path: PathBuf,
    },

    /// Statement preparation or execution failed.
    #[error("query failed: {source}\n  query: {sql}")]
    Query {
        sql: String,
        #[source]
        source: duckdb::Error,
    },

    /// A relation the operation depends on does not exist.
    #[error("relation '{name}' does not exist")]
    UnknownRelation { name: String },

    /// Building a DataFrame from query results failed.
    #[error("DataFrame conversion failed: {message}")]
    Frame { message: String },

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl EngineError {
    pub(crate) fn query(sql: impl Into<String>, source: duckdb::Error) -> Self {
        Self::Query {
            sql: sql.into(),
            source,
        }
    }
}

impl From<polars::prelude::PolarsError> for EngineError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::Frame {
            message: err.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_includes_sql() {
        let err = EngineError::query(
            "SELECT * FROM missing_table",
            duckdb::Error::InvalidParameterName("x".to_string()),
        );
        assert!(err.to_string().contains("SELECT * FROM missing_table"));
    }

    #[test]
    fn test_capability_error_names_file() {
        let err = EngineError::CapabilityUnavailable {
            capability: Capability::Parquet,
            path: PathBuf::from("data/neurocog.parquet"),
        };
        assert_eq!(
            err.to_string(),
            "capability 'parquet' is unavailable, cannot register data/neurocog.parquet"
        );
    }
}

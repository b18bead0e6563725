use thiserror::Error;

/// Errors raised while parsing model tokens from configuration or the command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown stream '{0}' (expected one of: neurocog, neurobehav, validity)")]
    UnknownStream(String),
    #[error("unknown source format '{0}' (expected one of: parquet, feather, csv)")]
    UnknownFormat(String),
    #[error("unknown summary level '{0}' (expected one of: domain, subdomain, narrow)")]
    UnknownLevel(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

use thiserror::Error;

/// Top-level error type for the Salesdesk service.
///
/// Subsystem crates define their own error types and convert into this one
/// (or from it) at crate boundaries so `?` works across them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SalesdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Blob storage error: {0}")]
    Blob(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for SalesdeskError {
    fn from(err: toml::de::Error) -> Self {
        SalesdeskError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SalesdeskError {
    fn from(err: toml::ser::Error) -> Self {
        SalesdeskError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SalesdeskError {
    fn from(err: serde_json::Error) -> Self {
        SalesdeskError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Salesdesk operations.
pub type Result<T> = std::result::Result<T, SalesdeskError>;

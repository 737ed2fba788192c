//! Error types for blob access.

use salesdesk_core::error::SalesdeskError;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("invalid document name: {0}")]
    InvalidName(String),
    #[error("blob request failed: {0}")]
    Request(String),
    #[error("blob service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BlobError> for SalesdeskError {
    fn from(err: BlobError) -> Self {
        SalesdeskError::Blob(err.to_string())
    }
}

impl From<reqwest::Error> for BlobError {
    fn from(err: reqwest::Error) -> Self {
        BlobError::Request(err.to_string())
    }
}

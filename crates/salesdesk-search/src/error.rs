//! Error types for index queries.

use salesdesk_core::error::SalesdeskError;

/// Errors from a single index query.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Network failure, timeout, throttling or a server-side error.
    #[error("transient search failure: {0}")]
    Transient(String),
    /// The request was rejected and retrying will not help.
    #[error("search request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid search response: {0}")]
    InvalidResponse(String),
}

impl SearchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SearchError::Transient(_))
    }
}

impl From<SearchError> for SalesdeskError {
    fn from(err: SearchError) -> Self {
        SalesdeskError::Search(err.to_string())
    }
}

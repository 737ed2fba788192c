//! Error types for the conversation engine.

use salesdesk_blob::BlobError;
use salesdesk_core::error::SalesdeskError;

/// Errors from the chat engine.
///
/// `InvalidImage`, `InvalidFeedback` and `EmptyChatExists` carry text meant
/// for the end user.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("no active session")]
    NoActiveSession,
    #[error("{0}")]
    InvalidImage(String),
    #[error("{0}")]
    InvalidFeedback(String),
    #[error("chat creation in progress")]
    CreationInProgress,
    #[error("You already have an empty chat. Please use your existing empty chat before creating a new one.")]
    EmptyChatExists,
    #[error("completion error: {0}")]
    Completion(String),
    #[error("mail error: {0}")]
    Mail(String),
    #[error("blob error: {0}")]
    Blob(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<SalesdeskError> for ChatError {
    fn from(err: SalesdeskError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<BlobError> for ChatError {
    fn from(err: BlobError) -> Self {
        ChatError::Blob(err.to_string())
    }
}

impl From<ChatError> for SalesdeskError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Storage(msg) => SalesdeskError::Storage(msg),
            ChatError::Completion(msg) => SalesdeskError::Completion(msg),
            ChatError::Mail(msg) => SalesdeskError::Mail(msg),
            ChatError::Blob(msg) => SalesdeskError::Blob(msg),
            other => SalesdeskError::Api(other.to_string()),
        }
    }
}

//! The blob storage seam.

use async_trait::async_trait;

use crate::error::BlobError;

/// A downloaded blob with the content type recorded on it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download `name` from `container`. A missing blob is `Ok(None)`.
    async fn get(&self, container: &str, name: &str) -> Result<Option<BlobObject>, BlobError>;

    /// Append `data` to an append blob, creating it on first write.
    async fn append(&self, container: &str, name: &str, data: &[u8]) -> Result<(), BlobError>;
}

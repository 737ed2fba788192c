//! In-process blob store for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::BlobError;
use crate::store::{BlobObject, BlobStore};

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<(String, String), BlobObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        container: &str,
        name: &str,
        bytes: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) {
        self.lock().insert(
            (container.to_string(), name.to_string()),
            BlobObject {
                bytes: bytes.into(),
                content_type: content_type.map(str::to_string),
            },
        );
    }

    /// Contents of a blob as UTF-8 text.
    pub fn read_string(&self, container: &str, name: &str) -> Option<String> {
        self.lock()
            .get(&(container.to_string(), name.to_string()))
            .map(|b| String::from_utf8_lossy(&b.bytes).into_owned())
    }

    /// Blob names in `container`, sorted.
    pub fn names(&self, container: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), BlobObject>> {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, container: &str, name: &str) -> Result<Option<BlobObject>, BlobError> {
        Ok(self
            .lock()
            .get(&(container.to_string(), name.to_string()))
            .cloned())
    }

    async fn append(&self, container: &str, name: &str, data: &[u8]) -> Result<(), BlobError> {
        self.lock()
            .entry((container.to_string(), name.to_string()))
            .or_insert_with(|| BlobObject {
                bytes: Vec::new(),
                content_type: Some("application/octet-stream".to_string()),
            })
            .bytes
            .extend_from_slice(data);
        Ok(())
    }
}

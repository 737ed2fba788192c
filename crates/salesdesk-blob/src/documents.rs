//! Product documents served from the documents container.

use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::error::BlobError;
use crate::store::{BlobObject, BlobStore};

const MAX_NAME_LEN: usize = 255;
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
/// Suffix the upload tooling adds to duplicate file names.
const COPY_SUFFIX: &str = " (1)";
const DOCUMENTS_PREFIX: &str = "/documents/";
const OCTET_STREAM: &str = "application/octet-stream";

/// A document ready to send to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedDocument {
    /// Decoded name as requested.
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// A document fetched for attaching to an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSource {
    /// Name of the blob actually found.
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub struct DocumentService {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl DocumentService {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    /// Fetch a document by its (still percent-encoded) path.
    ///
    /// Falls back to the name without a ` (1)` copy suffix.
    pub async fn serve(&self, raw_path: &str) -> Result<ServedDocument, BlobError> {
        let name = decode_name(raw_path);
        validate_name(&name)?;

        let blob = match self.store.get(&self.container, &name).await? {
            Some(blob) => blob,
            None => {
                let alt = name.replace(COPY_SUFFIX, "");
                if alt == name {
                    return Err(BlobError::NotFound(name));
                }
                debug!(name = %name, alt = %alt, "Document not found, trying alternative");
                match self.store.get(&self.container, &alt).await? {
                    Some(blob) => blob,
                    None => return Err(BlobError::NotFound(name)),
                }
            }
        };

        let mut content_type = resolve_content_type(&name, blob.content_type.as_deref());
        if name.to_ascii_lowercase().ends_with(".pdf") {
            content_type = "application/pdf".to_string();
        }

        Ok(ServedDocument {
            name,
            bytes: blob.bytes,
            content_type,
        })
    }

    /// Fetch a cited document for an email attachment.
    ///
    /// Accepts either a bare blob name or a `/documents/...` URL path. Tries
    /// the exact name, then the copy-suffix variant. Missing or empty blobs
    /// are `Ok(None)`.
    pub async fn fetch_attachment(
        &self,
        filepath: &str,
    ) -> Result<Option<AttachmentSource>, BlobError> {
        let decoded = decode_name(filepath);
        let name = decoded
            .strip_prefix(DOCUMENTS_PREFIX)
            .unwrap_or(&decoded)
            .to_string();

        let (found_name, blob) = match self.store.get(&self.container, &name).await? {
            Some(blob) => (name, blob),
            None => {
                let alt = alternate_name(&name);
                debug!(name = %name, alt = %alt, "Attachment not found, trying alternative");
                match self.store.get(&self.container, &alt).await? {
                    Some(blob) => (alt, blob),
                    None => {
                        warn!(name = %name, "Attachment not found in documents container");
                        return Ok(None);
                    }
                }
            }
        };

        if blob.bytes.is_empty() {
            warn!(name = %found_name, "Attachment blob is empty");
            return Ok(None);
        }

        let BlobObject {
            bytes,
            content_type,
        } = blob;
        Ok(Some(AttachmentSource {
            content_type: resolve_content_type(&found_name, content_type.as_deref()),
            name: found_name,
            bytes,
        }))
    }
}

/// Percent-decode a request path. Invalid UTF-8 is replaced, not rejected.
pub fn decode_name(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Reject names that could escape the container or confuse the blob API.
pub fn validate_name(name: &str) -> Result<(), BlobError> {
    let invalid = name.is_empty()
        || name.contains("..")
        || name.starts_with('.')
        || name.chars().count() > MAX_NAME_LEN
        || name.contains(FORBIDDEN_CHARS);
    if invalid {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// The other spelling of a possibly duplicated upload: without ` (1)` when
/// present, otherwise with ` (1)` before the extension.
pub fn alternate_name(name: &str) -> String {
    if name.contains(COPY_SUFFIX) {
        return name.replace(COPY_SUFFIX, "");
    }
    let (stem, ext) = split_extension(name);
    format!("{}{}{}", stem, COPY_SUFFIX, ext)
}

/// Split `name` into stem and extension (with its dot). Dots in directory
/// segments and a leading dot on the file name do not count.
pub fn split_extension(name: &str) -> (&str, &str) {
    let file_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => name.split_at(file_start + dot),
        _ => (name, ""),
    }
}

/// Content type recorded on the blob, else guessed from the name.
pub fn resolve_content_type(name: &str, stored: Option<&str>) -> String {
    match stored.filter(|ct| !ct.trim().is_empty()) {
        Some(ct) => ct.to_string(),
        None => mime_guess::from_path(name)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBlobStore;

    fn service(store: Arc<MemoryBlobStore>) -> DocumentService {
        DocumentService::new(store, "documents")
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Spec Sheet.pdf").is_ok());
        assert!(validate_name("guides/Install.docx").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../secrets").is_err());
        assert!(validate_name(".env").is_err());
        assert!(validate_name("a|b.pdf").is_err());
        assert!(validate_name("what?.pdf").is_err());
        assert!(validate_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_alternate_name() {
        assert_eq!(alternate_name("Brochure (1).pdf"), "Brochure.pdf");
        assert_eq!(alternate_name("Brochure.pdf"), "Brochure (1).pdf");
        assert_eq!(alternate_name("notes"), "notes (1)");
        assert_eq!(alternate_name("v1.2/readme"), "v1.2/readme (1)");
    }

    #[test]
    fn test_resolve_content_type() {
        assert_eq!(resolve_content_type("a.pdf", Some("application/x-custom")), "application/x-custom");
        assert_eq!(resolve_content_type("a.png", None), "image/png");
        assert_eq!(resolve_content_type("a.png", Some("")), "image/png");
        assert_eq!(resolve_content_type("a.unknownext", None), OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_serve_decodes_and_forces_pdf_type() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("documents", "Spec Sheet.pdf", b"%PDF".to_vec(), Some("application/octet-stream"));

        let doc = service(store).serve("Spec%20Sheet.pdf").await.unwrap();
        assert_eq!(doc.name, "Spec Sheet.pdf");
        assert_eq!(doc.content_type, "application/pdf");
        assert_eq!(doc.bytes, b"%PDF");
    }

    #[tokio::test]
    async fn test_serve_falls_back_without_copy_suffix() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("documents", "Guide.docx", b"doc".to_vec(), None);

        let doc = service(store).serve("Guide%20(1).docx").await.unwrap();
        assert_eq!(doc.bytes, b"doc");
        assert_eq!(
            doc.content_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
    }

    #[tokio::test]
    async fn test_serve_missing_and_invalid() {
        let store = Arc::new(MemoryBlobStore::new());
        let svc = service(store);
        assert!(matches!(svc.serve("missing.pdf").await, Err(BlobError::NotFound(_))));
        assert!(matches!(svc.serve("%2E%2E/etc").await, Err(BlobError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_fetch_attachment_adds_copy_suffix() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("documents", "Brochure (1).pdf", b"pdf".to_vec(), None);

        let att = service(store)
            .fetch_attachment("/documents/Brochure.pdf")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(att.name, "Brochure (1).pdf");
        assert_eq!(att.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_fetch_attachment_skips_empty_and_missing() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("documents", "empty.txt", Vec::new(), None);
        let svc = service(store);

        assert!(svc.fetch_attachment("empty.txt").await.unwrap().is_none());
        assert!(svc.fetch_attachment("gone.txt").await.unwrap().is_none());
    }
}

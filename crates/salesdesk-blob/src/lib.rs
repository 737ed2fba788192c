//! Blob storage for Salesdesk.
//!
//! Serves product documents out of the documents container and appends
//! chat and feedback telemetry as JSON lines.

pub mod azure;
pub mod documents;
pub mod error;
pub mod memory;
pub mod store;
pub mod telemetry;

pub use azure::AzureBlobStore;
pub use documents::{AttachmentSource, DocumentService, ServedDocument};
pub use error::BlobError;
pub use memory::MemoryBlobStore;
pub use store::{BlobObject, BlobStore};
pub use telemetry::{ChatLogEntry, FeedbackLogEntry, TelemetryLogger};

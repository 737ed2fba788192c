//! JSON-lines telemetry for chats and feedback.
//!
//! Chat lines go to hourly blobs under `chats/`, feedback lines to daily
//! blobs under `feedback/`. Each blob is an append blob created on first
//! write.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BlobError;
use crate::store::BlobStore;

/// One user message as logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_email: String,
    pub session_id: String,
    pub message: String,
}

impl ChatLogEntry {
    pub fn new(
        now: DateTime<Utc>,
        user_id: &str,
        user_email: &str,
        session_id: &str,
        message: &str,
    ) -> Self {
        Self {
            id: format!("chat_{}", now.timestamp()),
            timestamp: now,
            user_id: user_id.to_string(),
            user_email: user_email.to_string(),
            session_id: session_id.to_string(),
            message: message.to_string(),
        }
    }
}

/// One piece of user feedback as logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_email: String,
    pub session_id: String,
    pub feedback_type: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

impl FeedbackLogEntry {
    pub fn new(
        now: DateTime<Utc>,
        user_id: &str,
        user_email: &str,
        session_id: &str,
        feedback_type: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("feedback_{}", now.timestamp()),
            timestamp: now,
            user_id: user_id.to_string(),
            user_email: user_email.to_string(),
            session_id: session_id.to_string(),
            feedback_type: feedback_type.to_string(),
            content: content.to_string(),
            metadata,
        }
    }
}

pub struct TelemetryLogger {
    store: Arc<dyn BlobStore>,
    telemetry_container: String,
    feedback_container: String,
}

impl TelemetryLogger {
    pub fn new(
        store: Arc<dyn BlobStore>,
        telemetry_container: impl Into<String>,
        feedback_container: impl Into<String>,
    ) -> Self {
        Self {
            store,
            telemetry_container: telemetry_container.into(),
            feedback_container: feedback_container.into(),
        }
    }

    /// Append a chat line; returns the blob name written.
    pub async fn log_chat(&self, entry: &ChatLogEntry) -> Result<String, BlobError> {
        let name = chat_blob_name(entry.timestamp);
        self.append_line(&self.telemetry_container, &name, entry)
            .await?;
        info!(blob = %name, "Chat logged to blob");
        Ok(name)
    }

    /// Append a feedback line; returns the blob name written.
    pub async fn log_feedback(&self, entry: &FeedbackLogEntry) -> Result<String, BlobError> {
        let name = feedback_blob_name(entry.timestamp);
        self.append_line(&self.feedback_container, &name, entry)
            .await?;
        info!(blob = %name, "Feedback logged to blob");
        Ok(name)
    }

    async fn append_line<T: Serialize>(
        &self,
        container: &str,
        name: &str,
        entry: &T,
    ) -> Result<(), BlobError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.store.append(container, name, &line).await
    }
}

/// `chats/<yyyy>/<mm>/<dd>/<hh>/chat_log_<unix>.jsonl`
pub fn chat_blob_name(now: DateTime<Utc>) -> String {
    format!(
        "chats/{}/{:02}/{:02}/{:02}/chat_log_{}.jsonl",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.timestamp()
    )
}

/// `feedback/<yyyy>/<mm>/<dd>/feedback_log_<unix>.jsonl`
pub fn feedback_blob_name(now: DateTime<Utc>) -> String {
    format!(
        "feedback/{}/{:02}/{:02}/feedback_log_{}.jsonl",
        now.year(),
        now.month(),
        now.day(),
        now.timestamp()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBlobStore;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_blob_names() {
        let now = at();
        let unix = now.timestamp();
        assert_eq!(
            chat_blob_name(now),
            format!("chats/2024/03/07/09/chat_log_{}.jsonl", unix)
        );
        assert_eq!(
            feedback_blob_name(now),
            format!("feedback/2024/03/07/feedback_log_{}.jsonl", unix)
        );
    }

    #[tokio::test]
    async fn test_log_chat_writes_json_line() {
        let store = Arc::new(MemoryBlobStore::new());
        let logger = TelemetryLogger::new(store.clone(), "telemetry", "feedback");

        let entry = ChatLogEntry::new(at(), "u-1", "rep@example.com", "s-1", "stock for ACME?");
        let name = logger.log_chat(&entry).await.unwrap();

        let content = store.read_string("telemetry", &name).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: ChatLogEntry = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.id, format!("chat_{}", at().timestamp()));
    }

    #[tokio::test]
    async fn test_log_feedback_appends_to_daily_blob() {
        let store = Arc::new(MemoryBlobStore::new());
        let logger = TelemetryLogger::new(store.clone(), "telemetry", "feedback");

        let entry = FeedbackLogEntry::new(
            at(),
            "u-1",
            "rep@example.com",
            "s-1",
            "idea",
            "Add pricing",
            serde_json::json!({"focus_area": "Pricing"}),
        );
        let name = logger.log_feedback(&entry).await.unwrap();
        logger.log_feedback(&entry).await.unwrap();

        let content = store.read_string("feedback", &name).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(store.names("telemetry").is_empty());
    }
}

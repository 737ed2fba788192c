//! User feedback: validation, sanitising and logging.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use salesdesk_blob::{FeedbackLogEntry, TelemetryLogger};
use salesdesk_core::types::UserIdentity;
use salesdesk_storage::ChatSessionRepository;

use crate::error::ChatError;

const MAX_FEEDBACK_CHARS: usize = 2000;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackType {
    Problem,
    Idea,
}

impl FeedbackType {
    /// Case-insensitive, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        match raw.trim().to_lowercase().as_str() {
            "" => Err(ChatError::InvalidFeedback("Feedback type is required".to_string())),
            "problem" => Ok(FeedbackType::Problem),
            "idea" => Ok(FeedbackType::Idea),
            _ => Err(ChatError::InvalidFeedback("Invalid feedback type".to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::Problem => "problem",
            FeedbackType::Idea => "idea",
        }
    }
}

/// Validate raw request fields into a type and sanitised content.
pub fn validate_feedback(
    kind: Option<&str>,
    content: Option<&str>,
) -> Result<(FeedbackType, String), ChatError> {
    let kind = FeedbackType::parse(kind.unwrap_or_default())?;

    let content = content.unwrap_or_default();
    if content.is_empty() {
        return Err(ChatError::InvalidFeedback(
            "Feedback content is required".to_string(),
        ));
    }
    let sanitized = sanitize_content(content);
    if sanitized.is_empty() {
        return Err(ChatError::InvalidFeedback(
            "Invalid feedback content".to_string(),
        ));
    }
    Ok((kind, sanitized))
}

/// Escape HTML, drop tags and non-printable characters, cap the length and
/// collapse whitespace.
pub fn sanitize_content(content: &str) -> String {
    let escaped = escape_html(content);
    let untagged = TAG.replace_all(&escaped, "");
    let printable: String = untagged
        .chars()
        .filter(|c| matches!(c, '\n' | '\t' | ' '..='~'))
        .take(MAX_FEEDBACK_CHARS)
        .collect();
    printable.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Records feedback against the user's active session.
pub struct FeedbackService {
    sessions: Arc<ChatSessionRepository>,
    telemetry: Arc<TelemetryLogger>,
}

impl FeedbackService {
    pub fn new(sessions: Arc<ChatSessionRepository>, telemetry: Arc<TelemetryLogger>) -> Self {
        Self {
            sessions,
            telemetry,
        }
    }

    /// Validate and log one piece of feedback. Returns the blob written.
    pub async fn submit(
        &self,
        identity: &UserIdentity,
        kind: Option<&str>,
        content: Option<&str>,
    ) -> Result<String, ChatError> {
        let (kind, content) = validate_feedback(kind, content)?;

        let session_id = self
            .sessions
            .active_session_id(&identity.user_id)?
            .ok_or(ChatError::NoActiveSession)?;

        let metadata = match self.sessions.find_by_id(&session_id)? {
            Some(session) => json!({
                "product_category": session.product_category,
                "focus_area": session.focus_area,
                "detected_language": session.detected_language,
                "sales_metadata": session.sales_metadata,
            }),
            None => {
                warn!(session_id = %session_id, "Active session vanished before feedback was logged");
                json!({
                    "product_category": "",
                    "focus_area": "",
                    "detected_language": "",
                    "sales_metadata": {},
                })
            }
        };

        let entry = FeedbackLogEntry::new(
            Utc::now(),
            &identity.user_id,
            &identity.email,
            &session_id,
            kind.as_str(),
            &content,
            metadata,
        );
        let blob = self.telemetry.log_feedback(&entry).await?;
        info!(user_id = %identity.user_id, kind = kind.as_str(), "Feedback recorded");
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_blob::MemoryBlobStore;
    use salesdesk_core::types::{ChatSession, SalesContext};
    use salesdesk_storage::Database;

    fn invalid_message(result: Result<(FeedbackType, String), ChatError>) -> String {
        match result {
            Err(ChatError::InvalidFeedback(msg)) => msg,
            other => panic!("expected invalid feedback, got {:?}", other),
        }
    }

    #[test]
    fn test_feedback_type_parse() {
        assert_eq!(FeedbackType::parse(" Problem ").unwrap(), FeedbackType::Problem);
        assert_eq!(FeedbackType::parse("IDEA").unwrap(), FeedbackType::Idea);
        assert!(FeedbackType::parse("praise").is_err());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            invalid_message(validate_feedback(None, Some("x"))),
            "Feedback type is required"
        );
        assert_eq!(
            invalid_message(validate_feedback(Some("bug"), Some("x"))),
            "Invalid feedback type"
        );
        assert_eq!(
            invalid_message(validate_feedback(Some("idea"), Some(""))),
            "Feedback content is required"
        );
        assert_eq!(
            invalid_message(validate_feedback(Some("idea"), Some("\u{1}\u{2}  \n"))),
            "Invalid feedback content"
        );
    }

    #[test]
    fn test_sanitize_content() {
        assert_eq!(sanitize_content("  hello\n\n  world\t! "), "hello world !");
        assert_eq!(sanitize_content("<b>bold</b>"), "&lt;b&gt;bold&lt;/b&gt;");
        assert_eq!(sanitize_content("café"), "caf");
        assert_eq!(sanitize_content(&"a".repeat(2500)).len(), 2000);
    }

    #[tokio::test]
    async fn test_submit_requires_active_session() {
        let db = Arc::new(Database::in_memory().unwrap());
        let sessions = Arc::new(ChatSessionRepository::new(db));
        let store = Arc::new(MemoryBlobStore::new());
        let telemetry = Arc::new(TelemetryLogger::new(store.clone(), "telemetry", "feedback"));
        let service = FeedbackService::new(sessions.clone(), telemetry);
        let identity = UserIdentity::new("u-1", "rep@example.com");

        let err = service
            .submit(&identity, Some("idea"), Some("More filters"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NoActiveSession));

        let mut session = ChatSession::new("u-1", "sys", SalesContext::for_email("rep@example.com"));
        session.focus_area = "Pricing".to_string();
        sessions.save(&session).unwrap();
        sessions.set_active("u-1", &session.id).unwrap();

        let blob = service
            .submit(&identity, Some("Idea"), Some("More <i>filters</i>"))
            .await
            .unwrap();
        let line = store.read_string("feedback", &blob).unwrap();
        let logged: FeedbackLogEntry = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(logged.feedback_type, "idea");
        assert_eq!(logged.session_id, session.id);
        assert_eq!(logged.metadata["focus_area"], "Pricing");
        assert_eq!(logged.metadata["sales_metadata"]["Email"], "rep@example.com");
    }
}

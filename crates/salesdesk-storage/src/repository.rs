//! Chat session persistence.
//!
//! One row per session with JSON-valued message columns, plus a per-user
//! pointer to the session the user is currently working in. Sessions are
//! never removed, only soft-deleted by the empty-chat sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::de::DeserializeOwned;
use tracing::debug;

use salesdesk_core::error::SalesdeskError;
use salesdesk_core::types::ChatSession;

use crate::db::Database;

const SESSION_COLUMNS: &str = "id, user_id, messages, chat_history, citations, product_category,
     confidence_level, focus_area, detected_language, sales_metadata, created_at, last_activity";

/// Repository for chat sessions and the active-session pointer.
pub struct ChatSessionRepository {
    db: Arc<Database>,
}

impl ChatSessionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or fully replace a session (last write wins).
    ///
    /// Runs in a transaction; a failed write leaves the stored row untouched.
    pub fn save(&self, session: &ChatSession) -> Result<(), SalesdeskError> {
        let messages = serde_json::to_string(&session.messages)?;
        let chat_history = serde_json::to_string(&session.chat_history)?;
        let citations = serde_json::to_string(&session.citations)?;
        let sales_metadata = serde_json::to_string(&session.sales_metadata)?;

        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| SalesdeskError::Storage(format!("Failed to begin transaction: {}", e)))?;
            tx.execute(
                "INSERT INTO chat_sessions (id, user_id, messages, chat_history, citations,
                     product_category, confidence_level, focus_area, detected_language,
                     sales_metadata, is_empty, created_at, last_activity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                     messages = excluded.messages,
                     chat_history = excluded.chat_history,
                     citations = excluded.citations,
                     product_category = excluded.product_category,
                     confidence_level = excluded.confidence_level,
                     focus_area = excluded.focus_area,
                     detected_language = excluded.detected_language,
                     sales_metadata = excluded.sales_metadata,
                     is_empty = excluded.is_empty,
                     last_activity = excluded.last_activity",
                rusqlite::params![
                    session.id,
                    session.user_id,
                    messages,
                    chat_history,
                    citations,
                    session.product_category,
                    session.confidence_level,
                    session.focus_area,
                    session.detected_language,
                    sales_metadata,
                    session.is_empty() as i32,
                    session.created_at.timestamp_millis(),
                    session.last_activity.timestamp_millis(),
                ],
            )
            .map_err(|e| SalesdeskError::Storage(format!("Failed to save chat session: {}", e)))?;
            tx.commit()
                .map_err(|e| SalesdeskError::Storage(format!("Failed to commit chat session: {}", e)))?;
            Ok(())
        })
    }

    /// Find a live (not soft-deleted) session by id.
    pub fn find_by_id(&self, id: &str) -> Result<Option<ChatSession>, SalesdeskError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM chat_sessions WHERE id = ?1 AND deleted_at IS NULL",
                SESSION_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| SalesdeskError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id], |row| Ok(row_to_session(row)))
                .optional()
                .map_err(|e| SalesdeskError::Storage(e.to_string()))?;

            result.transpose()
        })
    }

    /// All live sessions of a user, newest first.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<ChatSession>, SalesdeskError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM chat_sessions
                 WHERE user_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at DESC",
                SESSION_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| SalesdeskError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| Ok(row_to_session(row)))
                .map_err(|e| SalesdeskError::Storage(e.to_string()))?;

            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row.map_err(|e| SalesdeskError::Storage(e.to_string()))??);
            }
            Ok(sessions)
        })
    }

    /// Whether the user has an empty session created at or after `since`.
    pub fn has_empty_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, SalesdeskError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chat_sessions
                     WHERE user_id = ?1 AND is_empty = 1 AND deleted_at IS NULL
                       AND created_at >= ?2",
                    rusqlite::params![user_id, since.timestamp_millis()],
                    |row| row.get(0),
                )
                .map_err(|e| SalesdeskError::Storage(e.to_string()))?;
            Ok(count > 0)
        })
    }

    /// Soft-delete every empty session created before `cutoff`.
    ///
    /// A session some user currently has active is kept, so the pointer
    /// always resolves. Returns the number of sessions swept.
    pub fn soft_delete_empty_before(&self, cutoff: DateTime<Utc>) -> Result<usize, SalesdeskError> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            let swept = conn
                .execute(
                    "UPDATE chat_sessions SET deleted_at = ?2
                     WHERE is_empty = 1 AND deleted_at IS NULL AND created_at < ?1
                       AND id NOT IN (SELECT session_id FROM active_sessions)",
                    rusqlite::params![cutoff.timestamp_millis(), now],
                )
                .map_err(|e| SalesdeskError::Storage(format!("Failed to sweep sessions: {}", e)))?;
            debug!(swept, "Empty chat sessions soft-deleted");
            Ok(swept)
        })
    }

    /// Point the user's active session at `session_id`.
    pub fn set_active(&self, user_id: &str, session_id: &str) -> Result<(), SalesdeskError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO active_sessions (user_id, session_id, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     session_id = excluded.session_id,
                     updated_at = excluded.updated_at",
                rusqlite::params![user_id, session_id, Utc::now().timestamp_millis()],
            )
            .map_err(|e| SalesdeskError::Storage(format!("Failed to set active session: {}", e)))?;
            Ok(())
        })
    }

    /// The user's active session id, if it points at a live session.
    pub fn active_session_id(&self, user_id: &str) -> Result<Option<String>, SalesdeskError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT a.session_id FROM active_sessions a
                 JOIN chat_sessions s ON s.id = a.session_id
                 WHERE a.user_id = ?1 AND s.deleted_at IS NULL",
                rusqlite::params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SalesdeskError::Storage(e.to_string()))
        })
    }

    /// Count live sessions.
    pub fn count(&self) -> Result<u64, SalesdeskError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chat_sessions WHERE deleted_at IS NULL",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| SalesdeskError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn json_column<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<T, SalesdeskError> {
    let raw: String = row
        .get(idx)
        .map_err(|e| SalesdeskError::Storage(e.to_string()))?;
    serde_json::from_str(&raw).map_err(SalesdeskError::from)
}

fn millis_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<DateTime<Utc>, SalesdeskError> {
    let ms: i64 = row
        .get(idx)
        .map_err(|e| SalesdeskError::Storage(e.to_string()))?;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| SalesdeskError::Storage(format!("Invalid timestamp: {}", ms)))
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<ChatSession, SalesdeskError> {
    let text = |idx: usize| -> Result<String, SalesdeskError> {
        row.get(idx)
            .map_err(|e| SalesdeskError::Storage(e.to_string()))
    };

    Ok(ChatSession {
        id: text(0)?,
        user_id: text(1)?,
        messages: json_column(row, 2)?,
        chat_history: json_column(row, 3)?,
        citations: json_column(row, 4)?,
        product_category: text(5)?,
        confidence_level: row
            .get(6)
            .map_err(|e| SalesdeskError::Storage(e.to_string()))?,
        focus_area: text(7)?,
        detected_language: text(8)?,
        sales_metadata: json_column(row, 9)?,
        created_at: millis_column(row, 10)?,
        last_activity: millis_column(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use salesdesk_core::types::{Citation, DisplayMessage, ModelMessage, SalesContext, TurnMetadata};

    fn make_repo() -> ChatSessionRepository {
        ChatSessionRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn make_session(user_id: &str) -> ChatSession {
        ChatSession::new(
            user_id,
            "system prompt",
            SalesContext::for_email("rep@example.com"),
        )
    }

    fn with_exchange(mut session: ChatSession) -> ChatSession {
        session.chat_history.push(DisplayMessage::user("Where is order 42?"));
        session.chat_history.push(DisplayMessage::assistant(
            "It shipped.",
            vec![Citation {
                title: "Order guide".to_string(),
                filepath: "guide.pdf".to_string(),
                url: "/documents/guide.pdf".to_string(),
                ..Citation::default()
            }],
            TurnMetadata::default(),
        ));
        session.messages.push(ModelMessage::user("Where is order 42?"));
        session.messages.push(ModelMessage::assistant("It shipped."));
        session.focus_area = "Order status".to_string();
        session.confidence_level = 8;
        session
    }

    #[test]
    fn test_save_and_find() {
        let repo = make_repo();
        let session = with_exchange(make_session("user-1"));
        repo.save(&session).unwrap();

        let found = repo.find_by_id(&session.id).unwrap().unwrap();
        assert_eq!(found.user_id, "user-1");
        assert_eq!(found.chat_history.len(), 2);
        assert_eq!(found.chat_history[1].citations[0].filepath, "guide.pdf");
        assert_eq!(found.messages.len(), 3);
        assert_eq!(found.focus_area, "Order status");
        assert_eq!(found.confidence_level, 8);
        assert_eq!(found.sales_metadata.email, "rep@example.com");
        assert_eq!(
            found.created_at.timestamp_millis(),
            session.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_find_nonexistent() {
        let repo = make_repo();
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let repo = make_repo();
        let mut session = make_session("user-1");
        repo.save(&session).unwrap();

        session = with_exchange(session);
        repo.save(&session).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let found = repo.find_by_id(&session.id).unwrap().unwrap();
        assert!(!found.is_empty());
    }

    #[test]
    fn test_list_for_user_newest_first() {
        let repo = make_repo();
        let mut older = make_session("user-1");
        older.created_at = Utc::now() - Duration::minutes(10);
        let newer = make_session("user-1");
        let other = make_session("user-2");
        repo.save(&older).unwrap();
        repo.save(&newer).unwrap();
        repo.save(&other).unwrap();

        let sessions = repo.list_for_user("user-1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, newer.id);
        assert_eq!(sessions[1].id, older.id);
    }

    #[test]
    fn test_has_empty_since() {
        let repo = make_repo();
        let mut stale = make_session("user-1");
        stale.created_at = Utc::now() - Duration::hours(2);
        repo.save(&stale).unwrap();

        let cutoff = Utc::now() - Duration::hours(1);
        assert!(!repo.has_empty_since("user-1", cutoff).unwrap());

        repo.save(&make_session("user-1")).unwrap();
        assert!(repo.has_empty_since("user-1", cutoff).unwrap());

        let busy = with_exchange(make_session("user-2"));
        repo.save(&busy).unwrap();
        assert!(!repo.has_empty_since("user-2", cutoff).unwrap());
    }

    #[test]
    fn test_soft_delete_empty_before() {
        let repo = make_repo();
        let cutoff = Utc::now() - Duration::hours(1);

        let mut stale_empty = make_session("user-1");
        stale_empty.created_at = Utc::now() - Duration::hours(2);
        let mut stale_busy = with_exchange(make_session("user-1"));
        stale_busy.created_at = Utc::now() - Duration::hours(2);
        let fresh_empty = make_session("user-1");

        repo.save(&stale_empty).unwrap();
        repo.save(&stale_busy).unwrap();
        repo.save(&fresh_empty).unwrap();

        assert_eq!(repo.soft_delete_empty_before(cutoff).unwrap(), 1);
        assert!(repo.find_by_id(&stale_empty.id).unwrap().is_none());
        assert!(repo.find_by_id(&stale_busy.id).unwrap().is_some());
        assert!(repo.find_by_id(&fresh_empty.id).unwrap().is_some());

        // Already swept rows are not counted twice.
        assert_eq!(repo.soft_delete_empty_before(cutoff).unwrap(), 0);
    }

    #[test]
    fn test_sweep_keeps_active_empty_session() {
        let repo = make_repo();
        let cutoff = Utc::now() - Duration::hours(1);

        let mut active = make_session("user-1");
        active.created_at = Utc::now() - Duration::hours(2);
        let mut idle = make_session("user-2");
        idle.created_at = Utc::now() - Duration::hours(2);
        repo.save(&active).unwrap();
        repo.save(&idle).unwrap();
        repo.set_active("user-1", &active.id).unwrap();

        assert_eq!(repo.soft_delete_empty_before(cutoff).unwrap(), 1);
        assert!(repo.find_by_id(&active.id).unwrap().is_some());
        assert!(repo.find_by_id(&idle.id).unwrap().is_none());
        assert_eq!(repo.active_session_id("user-1").unwrap(), Some(active.id.clone()));

        // Once the user moves on, the old empty chat is swept.
        let next = make_session("user-1");
        repo.save(&next).unwrap();
        repo.set_active("user-1", &next.id).unwrap();
        assert_eq!(repo.soft_delete_empty_before(cutoff).unwrap(), 1);
        assert!(repo.find_by_id(&active.id).unwrap().is_none());
    }

    #[test]
    fn test_active_session_pointer() {
        let repo = make_repo();
        assert!(repo.active_session_id("user-1").unwrap().is_none());

        let first = make_session("user-1");
        let second = make_session("user-1");
        repo.save(&first).unwrap();
        repo.save(&second).unwrap();

        repo.set_active("user-1", &first.id).unwrap();
        assert_eq!(repo.active_session_id("user-1").unwrap(), Some(first.id.clone()));

        repo.set_active("user-1", &second.id).unwrap();
        assert_eq!(repo.active_session_id("user-1").unwrap(), Some(second.id));
    }

    #[test]
    fn test_set_active_unknown_session_fails() {
        let repo = make_repo();
        assert!(repo.set_active("user-1", "missing").is_err());
    }
}

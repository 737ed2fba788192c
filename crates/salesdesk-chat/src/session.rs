//! Chat session lifecycle: bootstrap, creation, switching, history and the
//! empty-chat sweep.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use salesdesk_core::types::{ChatSession, DisplayMessage, SalesContext, UserIdentity};
use salesdesk_storage::ChatSessionRepository;

use crate::error::ChatError;
use crate::prompt::{PromptBuilder, PromptProfile};

/// One entry of the conversation sidebar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    /// Creation time, `%I:%M %p`.
    pub time: String,
    pub active: bool,
}

/// Everything the chat page needs on load.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapData {
    pub session_id: String,
    pub chat_history: Vec<DisplayMessage>,
    pub conversations: Vec<ConversationSummary>,
    pub confidence_level: i64,
    pub product_category: String,
    pub detected_language: String,
    pub focus_area: String,
    pub metadata: SalesContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryMetadata {
    pub confidence_level: i64,
    pub product_category: String,
    pub focus_area: String,
    pub detected_language: String,
}

/// Display history of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionHistory {
    pub messages: Vec<DisplayMessage>,
    pub metadata: HistoryMetadata,
}

/// Owns the per-user session lifecycle on top of the session repository.
pub struct SessionManager {
    sessions: Arc<ChatSessionRepository>,
    prompts: PromptBuilder,
    empty_chat_timeout: Duration,
    /// Serialises chat creation across users.
    creation_lock: Mutex<()>,
    /// Users with a creation request in flight.
    creating: Mutex<HashSet<String>>,
}

/// Clears a user's in-flight creation flag when dropped.
struct CreationGuard<'a> {
    creating: &'a Mutex<HashSet<String>>,
    user_id: String,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        let mut creating = self
            .creating
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        creating.remove(&self.user_id);
    }
}

impl SessionManager {
    pub fn new(
        sessions: Arc<ChatSessionRepository>,
        prompts: PromptBuilder,
        empty_chat_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            prompts,
            empty_chat_timeout,
            creation_lock: Mutex::new(()),
            creating: Mutex::new(HashSet::new()),
        }
    }

    pub fn repository(&self) -> &Arc<ChatSessionRepository> {
        &self.sessions
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Persist a session (last write wins).
    pub fn save(&self, session: &ChatSession) -> Result<(), ChatError> {
        self.sessions.save(session)?;
        Ok(())
    }

    /// The caller's active session, if it still exists and is theirs.
    pub fn active_session(&self, identity: &UserIdentity) -> Result<Option<ChatSession>, ChatError> {
        let Some(id) = self.sessions.active_session_id(&identity.user_id)? else {
            return Ok(None);
        };
        Ok(self
            .sessions
            .find_by_id(&id)?
            .filter(|s| s.user_id == identity.user_id))
    }

    /// Load the chat page: refresh the active session's sales context, or
    /// start a session when there is none.
    pub fn bootstrap(
        &self,
        identity: &UserIdentity,
        ctx: SalesContext,
        profile: PromptProfile,
    ) -> Result<BootstrapData, ChatError> {
        let session = match self.active_session(identity)? {
            Some(mut session) => {
                session.sales_metadata = ctx;
                self.sessions.save(&session)?;
                session
            }
            None => {
                debug!(user_id = %identity.user_id, "No usable active session, creating one");
                self.create_session(&identity.user_id, ctx, profile)?
            }
        };

        let conversations = self
            .sessions
            .list_for_user(&identity.user_id)?
            .iter()
            .map(|chat| ConversationSummary {
                id: chat.id.clone(),
                title: chat.title().to_string(),
                time: chat.created_at.format("%I:%M %p").to_string(),
                active: chat.id == session.id,
            })
            .collect();

        Ok(BootstrapData {
            session_id: session.id.clone(),
            conversations,
            confidence_level: session.confidence_level,
            product_category: session.product_category.clone(),
            detected_language: session.detected_language.clone(),
            focus_area: session.title().to_string(),
            chat_history: session.chat_history,
            metadata: session.sales_metadata,
        })
    }

    /// Start a new conversation and make it active.
    ///
    /// Refused while the same user has a creation in flight, or while they
    /// still have an empty chat younger than the empty-chat timeout.
    pub fn new_chat(
        &self,
        identity: &UserIdentity,
        ctx: SalesContext,
        profile: PromptProfile,
    ) -> Result<ChatSession, ChatError> {
        let _guard = self.begin_creation(&identity.user_id)?;
        let _lock = self
            .creation_lock
            .lock()
            .map_err(|e| ChatError::Storage(format!("creation lock poisoned: {}", e)))?;

        if let Err(e) = self.cleanup_empty() {
            warn!(error = %e, "Failed to clean up old empty chats");
        }

        if self
            .sessions
            .has_empty_since(&identity.user_id, self.cutoff())?
        {
            return Err(ChatError::EmptyChatExists);
        }

        let session = self.create_session(&identity.user_id, ctx, profile)?;
        info!(user_id = %identity.user_id, session_id = %session.id, "New chat created");
        Ok(session)
    }

    /// Activate one of the caller's sessions and return the sales context
    /// the page should show for it.
    pub fn switch_chat(
        &self,
        identity: &UserIdentity,
        session_id: &str,
    ) -> Result<SalesContext, ChatError> {
        let session = self.owned_session(identity, session_id)?;
        self.sessions.set_active(&identity.user_id, &session.id)?;

        if session.sales_metadata.has_sales_rep_data() {
            Ok(session.sales_metadata)
        } else {
            Ok(SalesContext::for_email(&identity.email))
        }
    }

    /// Display history of one of the caller's sessions.
    pub fn history(
        &self,
        identity: &UserIdentity,
        session_id: &str,
    ) -> Result<SessionHistory, ChatError> {
        let session = self.owned_session(identity, session_id)?;
        Ok(SessionHistory {
            metadata: HistoryMetadata {
                confidence_level: session.confidence_level,
                product_category: session.product_category,
                focus_area: session.focus_area,
                detected_language: session.detected_language,
            },
            messages: session.chat_history,
        })
    }

    /// Soft-delete empty sessions created before the timeout window.
    pub fn cleanup_empty(&self) -> Result<usize, ChatError> {
        let swept = self.sessions.soft_delete_empty_before(self.cutoff())?;
        info!(swept, "Cleaned up old empty chats");
        Ok(swept)
    }

    fn create_session(
        &self,
        user_id: &str,
        ctx: SalesContext,
        profile: PromptProfile,
    ) -> Result<ChatSession, ChatError> {
        let prompt = self.prompts.system_prompt(profile, &ctx);
        let session = ChatSession::new(user_id, prompt, ctx);
        self.sessions.save(&session)?;
        self.sessions.set_active(user_id, &session.id)?;
        Ok(session)
    }

    fn owned_session(
        &self,
        identity: &UserIdentity,
        session_id: &str,
    ) -> Result<ChatSession, ChatError> {
        self.sessions
            .find_by_id(session_id)?
            .filter(|s| s.user_id == identity.user_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    fn begin_creation(&self, user_id: &str) -> Result<CreationGuard<'_>, ChatError> {
        let mut creating = self
            .creating
            .lock()
            .map_err(|e| ChatError::Storage(format!("creation flags poisoned: {}", e)))?;
        if !creating.insert(user_id.to_string()) {
            return Err(ChatError::CreationInProgress);
        }
        Ok(CreationGuard {
            creating: &self.creating,
            user_id: user_id.to_string(),
        })
    }

    /// Start of the empty-chat window.
    fn cutoff(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.empty_chat_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_core::types::{OrderDetail, Role, TurnMetadata};
    use salesdesk_storage::Database;

    fn manager() -> SessionManager {
        let db = Arc::new(Database::in_memory().unwrap());
        SessionManager::new(
            Arc::new(ChatSessionRepository::new(db)),
            PromptBuilder::new(10),
            Duration::from_secs(3600),
        )
    }

    fn rep() -> UserIdentity {
        UserIdentity::new("u-1", "rep@example.com")
    }

    fn with_history(mut session: ChatSession) -> ChatSession {
        session.chat_history.push(DisplayMessage::user("hello"));
        session.chat_history.push(DisplayMessage::assistant(
            "hi",
            Vec::new(),
            TurnMetadata::default(),
        ));
        session
    }

    fn rich_context() -> SalesContext {
        let mut ctx = SalesContext::for_email("rep@example.com");
        ctx.summary.total_orders = 1;
        ctx.summary.execution_status = vec!["Open".to_string()];
        ctx.summary.orders.push(OrderDetail::default());
        ctx
    }

    #[test]
    fn test_bootstrap_creates_then_reuses_session() {
        let mgr = manager();
        let ctx = SalesContext::for_email("rep@example.com");

        let first = mgr.bootstrap(&rep(), ctx.clone(), PromptProfile::Protective).unwrap();
        assert_eq!(first.conversations.len(), 1);
        assert!(first.conversations[0].active);
        assert_eq!(first.focus_area, "New Conversation");

        let second = mgr.bootstrap(&rep(), rich_context(), PromptProfile::Protective).unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.metadata.summary.total_orders, 1);
        assert_eq!(second.conversations.len(), 1);
    }

    #[test]
    fn test_bootstrap_ignores_foreign_active_session() {
        let mgr = manager();
        let other = ChatSession::new("u-2", "sys", SalesContext::default());
        mgr.save(&other).unwrap();
        mgr.repository().set_active("u-1", &other.id).unwrap();

        let data = mgr
            .bootstrap(&rep(), SalesContext::default(), PromptProfile::Food)
            .unwrap();
        assert_ne!(data.session_id, other.id);
    }

    #[test]
    fn test_new_session_prompt_includes_context() {
        let mgr = manager();
        mgr.bootstrap(&rep(), rich_context(), PromptProfile::Protective)
            .unwrap();
        let session = mgr.active_session(&rep()).unwrap().unwrap();
        assert_eq!(session.messages[0].role, Role::System);
        assert!(session.messages[0].text().contains("Sales Overview as of"));
    }

    #[test]
    fn test_new_chat_refuses_recent_empty_chat() {
        let mgr = manager();
        let ctx = SalesContext::for_email("rep@example.com");
        mgr.new_chat(&rep(), ctx.clone(), PromptProfile::Protective)
            .unwrap();

        let err = mgr
            .new_chat(&rep(), ctx.clone(), PromptProfile::Protective)
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyChatExists));

        // Once the chat has messages a new one may be started.
        let active = mgr.active_session(&rep()).unwrap().unwrap();
        mgr.save(&with_history(active)).unwrap();
        let created = mgr.new_chat(&rep(), ctx, PromptProfile::Protective).unwrap();
        assert_eq!(
            mgr.active_session(&rep()).unwrap().unwrap().id,
            created.id
        );
    }

    #[test]
    fn test_new_chat_in_progress_guard() {
        let mgr = manager();
        let guard = mgr.begin_creation("u-1").unwrap();
        let err = mgr
            .new_chat(&rep(), SalesContext::default(), PromptProfile::Protective)
            .unwrap_err();
        assert!(matches!(err, ChatError::CreationInProgress));

        drop(guard);
        assert!(mgr
            .new_chat(&rep(), SalesContext::default(), PromptProfile::Protective)
            .is_ok());
    }

    #[test]
    fn test_cleanup_removes_only_old_empty_chats() {
        let mgr = manager();
        let old = Utc::now() - chrono::Duration::hours(2);

        let mut old_empty = ChatSession::new("u-1", "sys", SalesContext::default());
        old_empty.created_at = old;
        let mut old_busy = with_history(ChatSession::new("u-1", "sys", SalesContext::default()));
        old_busy.created_at = old;
        let recent_empty = ChatSession::new("u-1", "sys", SalesContext::default());
        for s in [&old_empty, &old_busy, &recent_empty] {
            mgr.save(s).unwrap();
        }

        assert_eq!(mgr.cleanup_empty().unwrap(), 1);
        let repo = mgr.repository();
        assert!(repo.find_by_id(&old_empty.id).unwrap().is_none());
        assert!(repo.find_by_id(&old_busy.id).unwrap().is_some());
        assert!(repo.find_by_id(&recent_empty.id).unwrap().is_some());
    }

    #[test]
    fn test_switch_chat_checks_owner_and_context() {
        let mgr = manager();
        let plain = ChatSession::new("u-1", "sys", SalesContext::default());
        let rich = ChatSession::new("u-1", "sys", rich_context());
        let foreign = ChatSession::new("u-2", "sys", rich_context());
        for s in [&plain, &rich, &foreign] {
            mgr.save(s).unwrap();
        }

        let ctx = mgr.switch_chat(&rep(), &plain.id).unwrap();
        assert_eq!(ctx, SalesContext::for_email("rep@example.com"));
        assert_eq!(mgr.active_session(&rep()).unwrap().unwrap().id, plain.id);

        let ctx = mgr.switch_chat(&rep(), &rich.id).unwrap();
        assert_eq!(ctx.summary.total_orders, 1);

        assert!(matches!(
            mgr.switch_chat(&rep(), &foreign.id),
            Err(ChatError::SessionNotFound(_))
        ));
        assert!(matches!(
            mgr.switch_chat(&rep(), "missing"),
            Err(ChatError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_history_is_owner_only() {
        let mgr = manager();
        let mut session = with_history(ChatSession::new("u-1", "sys", SalesContext::default()));
        session.focus_area = "Stock".to_string();
        session.confidence_level = 7;
        mgr.save(&session).unwrap();

        let history = mgr.history(&rep(), &session.id).unwrap();
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.metadata.focus_area, "Stock");
        assert_eq!(history.metadata.confidence_level, 7);

        let stranger = UserIdentity::new("u-9", "x@example.com");
        assert!(mgr.history(&stranger, &session.id).is_err());
    }
}

//! One chat turn, from the user's question to the persisted reply.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use salesdesk_blob::{ChatLogEntry, TelemetryLogger};
use salesdesk_core::config::OpenAiConfig;
use salesdesk_core::types::{
    ChatSession, Citation, DisplayMessage, ModelMessage, Role, SalesContext, TurnMetadata,
    UserIdentity,
};

use crate::completion::{CompletionClient, CompletionRequest, GroundingSource};
use crate::email::{draft_notice, EmailDrafter, DRAFT_ERROR_NOTICE};
use crate::error::ChatError;
use crate::parser::{parse_response, ParsedResponse};
use crate::prompt::PromptProfile;
use crate::session::SessionManager;
use crate::upload::image_data_url;

/// Reply shown when the completion service fails.
pub const COMPLETION_FAILED_REPLY: &str =
    "Sorry, I encountered an error processing your request.";

/// A photo attached to a question.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MessageInput {
    pub question: String,
    pub image: Option<ImageUpload>,
    pub profile: PromptProfile,
}

/// Classification returned with each reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyMetadata {
    pub confidence_level: i64,
    pub product_category: String,
    pub focus_area: String,
    pub detected_language: String,
    pub metadata: SalesContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageReply {
    pub response: String,
    pub metadata: ReplyMetadata,
    pub citations: Vec<Citation>,
}

impl MessageReply {
    fn from_session(session: &ChatSession, response: String, citations: Vec<Citation>) -> Self {
        Self {
            response,
            metadata: ReplyMetadata {
                confidence_level: session.confidence_level,
                product_category: session.product_category.clone(),
                focus_area: session.focus_area.clone(),
                detected_language: session.detected_language.clone(),
                metadata: session.sales_metadata.clone(),
            },
            citations,
        }
    }
}

pub struct MessageOrchestrator {
    sessions: Arc<SessionManager>,
    completion: Arc<dyn CompletionClient>,
    drafter: Arc<EmailDrafter>,
    telemetry: Arc<TelemetryLogger>,
    grounding: Option<GroundingSource>,
    temperature: f32,
    max_tokens: u32,
    max_image_bytes: usize,
}

impl MessageOrchestrator {
    pub fn new(
        sessions: Arc<SessionManager>,
        completion: Arc<dyn CompletionClient>,
        drafter: Arc<EmailDrafter>,
        telemetry: Arc<TelemetryLogger>,
        openai: &OpenAiConfig,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            sessions,
            completion,
            drafter,
            telemetry,
            grounding: None,
            temperature: openai.temperature,
            max_tokens: openai.max_completion_tokens,
            max_image_bytes,
        }
    }

    /// Document index searched by the protective profile.
    pub fn with_grounding(mut self, grounding: Option<GroundingSource>) -> Self {
        self.grounding = grounding;
        self
    }

    /// Answer one question in the caller's active session.
    pub async fn handle_message(
        &self,
        identity: &UserIdentity,
        input: MessageInput,
    ) -> Result<MessageReply, ChatError> {
        let image_url = match &input.image {
            Some(upload) => Some(image_data_url(
                &upload.filename,
                &upload.bytes,
                self.max_image_bytes,
            )?),
            None => None,
        };

        let mut session = self
            .sessions
            .active_session(identity)?
            .ok_or(ChatError::NoActiveSession)?;

        self.log_chat(identity, &session.id, &input.question).await;

        let limit = self.sessions.prompts().history_limit;
        let user_message = match image_url {
            Some(url) => ModelMessage::user_with_image(input.question.as_str(), url),
            None => ModelMessage::user(input.question.as_str()),
        };
        let messages = self.request_messages(&session, input.profile, user_message);

        let skip = session.chat_history.len().saturating_sub(limit);
        session.chat_history.drain(..skip);
        session
            .chat_history
            .push(DisplayMessage::user(input.question.as_str()));

        let grounding = if input.profile.uses_grounding() {
            self.grounding.clone()
        } else {
            None
        };
        let request = CompletionRequest::new(messages.clone(), self.temperature, self.max_tokens)
            .with_grounding(grounding);

        let completion = match self.completion.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Completion failed");
                session.chat_history.push(DisplayMessage::assistant(
                    COMPLETION_FAILED_REPLY,
                    Vec::new(),
                    TurnMetadata::default(),
                ));
                session.last_activity = Utc::now();
                self.sessions.save(&session)?;
                return Ok(MessageReply::from_session(
                    &session,
                    COMPLETION_FAILED_REPLY.to_string(),
                    Vec::new(),
                ));
            }
        };

        let ParsedResponse {
            mut metadata,
            text,
            has_metadata,
        } = parse_response(&completion.content);
        if !has_metadata {
            debug!(session_id = %session.id, "Reply carried no metadata object");
        }

        let mut response = text;
        if metadata.wants_email() {
            match self
                .drafter
                .compose(&session.chat_history, &session.sales_metadata, &completion.citations)
                .await
            {
                Ok(package) => {
                    let result = self
                        .drafter
                        .save_draft(&package, &identity.email, identity.access_token.as_deref())
                        .await;
                    response.push_str(&draft_notice(&package, &result));
                }
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "Email drafting failed");
                    response.push_str(DRAFT_ERROR_NOTICE);
                    metadata.actions = None;
                }
            }
        }

        let citations = if metadata.actions.is_none() {
            completion.citations
        } else {
            Vec::new()
        };

        session.confidence_level = metadata.confidence_level;
        session.product_category = metadata.product_category;
        session.focus_area = metadata.focus_area;
        session.detected_language = metadata.detected_language;
        session.chat_history.push(DisplayMessage::assistant(
            response.as_str(),
            citations.clone(),
            TurnMetadata {
                key_takeaways: metadata.key_takeaways,
                actions: metadata.actions,
            },
        ));
        // Stored window matches what was sent, so the row stays bounded.
        session.messages = messages;
        session
            .messages
            .push(ModelMessage::assistant(response.as_str()));
        session.citations = citations.clone();
        session.last_activity = Utc::now();
        self.sessions.save(&session)?;

        info!(
            session_id = %session.id,
            citations = citations.len(),
            "Message answered"
        );
        Ok(MessageReply::from_session(&session, response, citations))
    }

    /// Fresh system prompt, the recent conversation and the new question.
    fn request_messages(
        &self,
        session: &ChatSession,
        profile: PromptProfile,
        user_message: ModelMessage,
    ) -> Vec<ModelMessage> {
        let system = ModelMessage::system(
            self.sessions
                .prompts()
                .system_prompt(profile, &session.sales_metadata),
        );
        let previous = self
            .sessions
            .prompts()
            .truncate_messages(&session.messages, profile);

        std::iter::once(system)
            .chain(previous.into_iter().filter(|m| m.role != Role::System))
            .chain(std::iter::once(user_message))
            .collect()
    }

    async fn log_chat(&self, identity: &UserIdentity, session_id: &str, message: &str) {
        let entry = ChatLogEntry::new(
            Utc::now(),
            &identity.user_id,
            &identity.email,
            session_id,
            message,
        );
        if let Err(e) = self.telemetry.log_chat(&entry).await {
            warn!(error = %e, "Failed to log chat telemetry");
        }
    }
}

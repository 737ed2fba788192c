//! Route handler functions for all API endpoints.
//!
//! Each handler extracts the caller's identity and request data via axum
//! extractors, calls into the chat services on AppState, and returns JSON.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, OriginalUri, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use salesdesk_chat::upload::TOO_LARGE;
use salesdesk_chat::{
    BootstrapData, ChatError, ImageUpload, MessageInput, MessageReply, PromptProfile,
    SessionHistory,
};
use salesdesk_core::types::{SalesContext, UserIdentity};

use crate::error::ApiError;
use crate::state::AppState;

const DOCUMENTS_ROUTE_PREFIX: &str = "/documents/";

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SwitchChatRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

/// Data the chat page renders on load.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub profile: &'static str,
    #[serde(flatten)]
    pub data: BootstrapData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SwitchChatResponse {
    pub success: bool,
    pub metadata: SalesContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub total_sessions: u64,
    pub cached_reps: usize,
}

// =============================================================================
// Page bootstrap
// =============================================================================

/// GET / - chat page with the profile chosen by the referring page.
pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    headers: HeaderMap,
) -> Result<Json<PageResponse>, ApiError> {
    page(&state, &identity, profile_from(&headers)).await
}

/// GET /food - chat page for the food packaging team.
pub async fn food(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<PageResponse>, ApiError> {
    page(&state, &identity, PromptProfile::Food).await
}

/// GET /protective - chat page for the protective packaging team.
pub async fn protective(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<PageResponse>, ApiError> {
    page(&state, &identity, PromptProfile::Protective).await
}

async fn page(
    state: &AppState,
    identity: &UserIdentity,
    profile: PromptProfile,
) -> Result<Json<PageResponse>, ApiError> {
    let ctx = state.sales.get_or_fetch(identity).await;
    let data = state.sessions.bootstrap(identity, ctx, profile)?;
    debug!(
        user_id = %identity.user_id,
        session_id = %data.session_id,
        profile = profile.as_str(),
        "Page bootstrapped"
    );
    Ok(Json(PageResponse {
        profile: profile.as_str(),
        data,
    }))
}

// =============================================================================
// Chat
// =============================================================================

/// POST /message - multipart `question` plus optional `photoupload`.
pub async fn message(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<MessageReply>, ApiError> {
    let mut question = String::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| form_error(e, "Invalid form data"))?
    {
        match field.name() {
            Some("question") => {
                question = field
                    .text()
                    .await
                    .map_err(|e| form_error(e, "Invalid question"))?
                    .trim()
                    .to_string();
            }
            Some("photoupload") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| form_error(e, "Invalid upload"))?;
                if !filename.is_empty() && !bytes.is_empty() {
                    image = Some(ImageUpload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    debug!(
        user_id = %identity.user_id,
        has_image = image.is_some(),
        "Message received"
    );
    let input = MessageInput {
        question,
        image,
        profile: profile_from(&headers),
    };
    let reply = state.orchestrator.handle_message(&identity, input).await?;
    Ok(Json(reply))
}

/// POST /new_chat - start a conversation.
///
/// Refusals the user can act on come back as `success: false` with a
/// message rather than as an HTTP error.
pub async fn new_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    headers: HeaderMap,
) -> Result<Json<NewChatResponse>, ApiError> {
    let ctx = state.sales.get_or_fetch(&identity).await;
    match state
        .sessions
        .new_chat(&identity, ctx, profile_from(&headers))
    {
        Ok(session) => Ok(Json(NewChatResponse {
            success: true,
            session_id: Some(session.id),
            error: None,
        })),
        Err(e @ (ChatError::CreationInProgress | ChatError::EmptyChatExists)) => {
            info!(user_id = %identity.user_id, reason = %e, "New chat refused");
            Ok(Json(NewChatResponse {
                success: false,
                session_id: None,
                error: Some(refusal_message(&e)),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// A form that outgrew the body limit is reported like an oversized photo.
fn form_error(err: MultipartError, context: &str) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %err, "Message form exceeded the body limit");
        ApiError::BadRequest(TOO_LARGE.to_string())
    } else {
        ApiError::BadRequest(format!("{}: {}", context, err))
    }
}

fn refusal_message(err: &ChatError) -> String {
    match err {
        ChatError::CreationInProgress => "Chat creation in progress".to_string(),
        other => other.to_string(),
    }
}

/// POST /switch_chat - make one of the caller's sessions active.
pub async fn switch_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<SwitchChatRequest>,
) -> Result<Json<SwitchChatResponse>, ApiError> {
    let metadata = state.sessions.switch_chat(&identity, &req.session_id)?;
    Ok(Json(SwitchChatResponse {
        success: true,
        metadata,
    }))
}

/// GET /get_chat_history/{id} - display history of one of the caller's
/// sessions.
pub async fn chat_history(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionHistory>, ApiError> {
    Ok(Json(state.sessions.history(&identity, &session_id)?))
}

// =============================================================================
// Documents and feedback
// =============================================================================

/// GET /documents/{*path} - stream a product document inline.
///
/// The raw request path is used so the document service sees the name still
/// percent-encoded, exactly once.
pub async fn document(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let raw = uri
        .path()
        .strip_prefix(DOCUMENTS_ROUTE_PREFIX)
        .unwrap_or_default();
    let doc = state.documents.serve(raw).await?;
    info!(name = %doc.name, bytes = doc.bytes.len(), "Serving document");

    let content_type = HeaderValue::from_str(&doc.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", doc.name))
        .unwrap_or_else(|_| {
            warn!(name = %doc.name, "Document name not valid in a header");
            HeaderValue::from_static("inline")
        });

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        doc.bytes,
    )
        .into_response())
}

/// POST /feedback - `{"type": "problem"|"idea", "content": "..."}`.
pub async fn feedback(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .feedback
        .submit(&identity, req.kind.as_deref(), req.content.as_deref())
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /health - liveness plus a few counters.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let total_sessions = state.sessions.repository().count()?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_sessions,
        cached_reps: state.sales.cache().len(),
    }))
}

fn profile_from(headers: &HeaderMap) -> PromptProfile {
    PromptProfile::from_referer(headers.get(header::REFERER).and_then(|v| v.to_str().ok()))
}

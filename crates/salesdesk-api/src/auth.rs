//! Caller identity from the upstream authentication proxy.
//!
//! The proxy in front of the service authenticates users and forwards who
//! they are as request headers. Headers are trusted as given: only their
//! presence is checked, and the ID token's signature is not verified.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;
use tracing::{debug, error, warn};

use salesdesk_core::config::GeneralConfig;
use salesdesk_core::types::UserIdentity;

use crate::error::ApiError;
use crate::state::AppState;

pub const PRINCIPAL_ID: &str = "x-ms-client-principal-id";
pub const PRINCIPAL_NAME: &str = "x-ms-client-principal-name";
pub const ID_TOKEN: &str = "x-ms-token-aad-id-token";
pub const CLIENT_GROUPS: &str = "x-ms-client-groups";
pub const ACCESS_TOKEN: &str = "x-ms-token-aad-access-token";

/// Middleware that resolves the caller and stores a [`UserIdentity`] in the
/// request extensions. Returns 401 when the identity headers are missing.
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match identity_from_headers(req.headers(), &state.config.general) {
        Some(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => {
            error!(path = %req.uri().path(), "Missing authentication headers");
            ApiError::Unauthorized("Authentication required".to_string()).into_response()
        }
    }
}

/// Build the caller's identity, filling gaps with the debug user in local
/// development.
pub fn identity_from_headers(
    headers: &HeaderMap,
    general: &GeneralConfig,
) -> Option<UserIdentity> {
    let mut user_id = header_str(headers, PRINCIPAL_ID);
    let mut email = header_str(headers, PRINCIPAL_NAME);
    if general.local_dev {
        user_id = user_id.or_else(|| Some(general.debug_user_id.clone()));
        email = email.or_else(|| Some(general.debug_user_email.clone()));
    }

    let mut groups = groups_from_headers(headers);
    if general.local_dev && groups.is_empty() {
        groups = general.debug_user_groups.clone();
    }
    debug!(groups = ?groups, "Resolved user groups");

    let mut identity = UserIdentity::new(user_id?, email?).with_groups(groups);
    identity.access_token = header_str(headers, ACCESS_TOKEN);
    Some(identity)
}

/// Groups from the ID token's `groups` claim and the comma-separated groups
/// header, deduplicated in first-seen order.
pub fn groups_from_headers(headers: &HeaderMap) -> Vec<String> {
    let mut groups = Vec::new();

    if let Some(token) = header_str(headers, ID_TOKEN) {
        match token_groups(&token) {
            Some(claimed) => groups.extend(claimed),
            None => warn!("Could not read groups from ID token"),
        }
    }

    if let Some(header) = header_str(headers, CLIENT_GROUPS) {
        groups.extend(
            header
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
        );
    }

    let mut unique: Vec<String> = Vec::with_capacity(groups.len());
    for group in groups {
        if !unique.contains(&group) {
            unique.push(group);
        }
    }
    unique
}

/// `groups` claim of an unverified JWT.
fn token_groups(token: &str) -> Option<Vec<String>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let groups = match claims.get("groups") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    Some(groups)
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

//! Mail provider client.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use salesdesk_core::config::MailConfig;

use crate::email::EmailPackage;
use crate::error::ChatError;

/// Saves drafts into a user's mailbox.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Create a draft for `user_email`; returns the provider's message id.
    async fn create_draft(
        &self,
        user_email: &str,
        access_token: &str,
        package: &EmailPackage,
    ) -> Result<Option<String>, ChatError>;
}

/// Microsoft Graph `messages` endpoint.
#[derive(Clone)]
pub struct GraphMailClient {
    client: Client,
    endpoint: String,
}

impl GraphMailClient {
    pub fn from_config(config: &MailConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChatError::Mail(format!("failed to build client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.graph_endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct CreatedMessage {
    #[serde(default)]
    id: Option<String>,
}

#[async_trait]
impl MailClient for GraphMailClient {
    async fn create_draft(
        &self,
        user_email: &str,
        access_token: &str,
        package: &EmailPackage,
    ) -> Result<Option<String>, ChatError> {
        let url = format!("{}/users/{}/messages", self.endpoint, user_email);
        debug!(
            attachments = package.prepared.len(),
            "Creating draft via mail provider"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&draft_payload(package, user_email))
            .send()
            .await
            .map_err(|e| ChatError::Mail(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read mail error body".to_string());
            error!(status = status.as_u16(), body = %body, "Draft creation failed");
            return Err(ChatError::Mail(format!("HTTP {}: {}", status, body)));
        }

        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|e| ChatError::Mail(format!("invalid response: {}", e)))?;
        Ok(created.id)
    }
}

fn address(addr: &str) -> Value {
    json!({ "emailAddress": { "address": addr } })
}

/// Message resource for a plain-text draft with inline file attachments.
pub fn draft_payload(package: &EmailPackage, user_email: &str) -> Value {
    let mut message = json!({
        "subject": package.subject,
        "importance": "normal",
        "isDraft": true,
        "body": {
            "contentType": "text",
            "content": package.body,
        },
        "toRecipients": package.to_recipients().into_iter().map(address).collect::<Vec<_>>(),
        "ccRecipients": package.cc_recipients().into_iter().map(address).collect::<Vec<_>>(),
        "from": address(user_email),
    });

    let attachments: Vec<Value> = package
        .prepared
        .iter()
        .filter(|a| !a.content.is_empty() && !a.filename.is_empty())
        .map(|a| {
            json!({
                "@odata.type": "#microsoft.graph.fileAttachment",
                "name": a.filename,
                "contentType": a.content_type,
                "contentBytes": BASE64_STANDARD.encode(&a.content),
            })
        })
        .collect();
    if !attachments.is_empty() {
        message["attachments"] = Value::Array(attachments);
    }
    message
}

//! Email drafting from a conversation.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use salesdesk_blob::documents::split_extension;
use salesdesk_blob::DocumentService;
use salesdesk_core::config::MailConfig;
use salesdesk_core::types::{Citation, DisplayMessage, ModelMessage, Role, SalesContext};

use crate::completion::{CompletionClient, CompletionRequest};
use crate::email::graph::MailClient;
use crate::email::{AttachmentSpec, DraftResult, EmailPackage, PreparedAttachment};
use crate::error::ChatError;

const DEFAULT_SUBJECT: &str = "Follow-up from our conversation";
const DEFAULT_ATTACHMENT_TITLE: &str = "Supporting Document";
const SALES_REPRESENTATIVE: &str = "Sales Representative";

const EMAIL_SYSTEM_PROMPT: &str = r#"You are preparing an email draft. Respond ONLY with a JSON object in this format:
{
    "subject": "Brief subject line",
    "body": "Main email content",
    "signature": "Professional signature block",
    "to": "customer@example.com",
    "cc": []
}

Guidelines:
- Write in first person from the sales rep's perspective
- Keep the subject line clear and concise
- Include all key points from the discussion
- Reference any attachments in the body
- Format the signature professionally with all contact details"#;

pub struct EmailDrafter {
    completion: Arc<dyn CompletionClient>,
    documents: Arc<DocumentService>,
    mail: Arc<dyn MailClient>,
    config: MailConfig,
}

impl EmailDrafter {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        documents: Arc<DocumentService>,
        mail: Arc<dyn MailClient>,
        config: MailConfig,
    ) -> Self {
        Self {
            completion,
            documents,
            mail,
            config,
        }
    }

    /// Write the email for the latest turns of a conversation and fetch the
    /// cited documents to attach.
    pub async fn compose(
        &self,
        history: &[DisplayMessage],
        rep: &SalesContext,
        citations: &[Citation],
    ) -> Result<EmailPackage, ChatError> {
        let prompt = self.user_prompt(history, rep, citations);
        let request = CompletionRequest::new(
            vec![
                ModelMessage::system(EMAIL_SYSTEM_PROMPT),
                ModelMessage::user(prompt),
            ],
            self.config.temperature,
            self.config.max_tokens,
        )
        .json_object();

        let completion = self.completion.complete(request).await?;
        let content: Value = serde_json::from_str(&completion.content)
            .map_err(|e| ChatError::Completion(format!("email draft is not valid JSON: {}", e)))?;

        let attachments = attachment_specs(citations);
        let prepared = self.prepare_attachments(&attachments).await;
        debug!(
            cited = attachments.len(),
            prepared = prepared.len(),
            "Email attachments prepared"
        );

        Ok(EmailPackage {
            subject: text_field(&content, "subject").unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            body: text_field(&content, "body").unwrap_or_default(),
            signature: text_field(&content, "signature").unwrap_or_default(),
            to: recipients_to(&content),
            cc: recipients_cc(&content),
            attachments,
            prepared,
        })
    }

    /// Save `package` as a draft in the rep's mailbox. Never fails; the
    /// outcome is in the result.
    pub async fn save_draft(
        &self,
        package: &EmailPackage,
        user_email: &str,
        access_token: Option<&str>,
    ) -> DraftResult {
        if user_email.trim().is_empty() {
            return DraftResult::failed(
                "Failed to create draft",
                "User email is required to create email drafts",
            );
        }
        let Some(token) = access_token.filter(|t| !t.trim().is_empty()) else {
            warn!("No mail access token on the request, draft not saved");
            return DraftResult::failed("Failed to create draft", "Mail access token missing");
        };

        match self.mail.create_draft(user_email, token, package).await {
            Ok(message_id) => {
                info!(user = %user_email, "Email draft created");
                DraftResult::created(message_id)
            }
            Err(e) => {
                error!(error = %e, "Mail provider rejected the draft");
                DraftResult::failed("Failed to create draft - API error", e.to_string())
            }
        }
    }

    fn user_prompt(
        &self,
        history: &[DisplayMessage],
        rep: &SalesContext,
        citations: &[Citation],
    ) -> String {
        let mut prompt = String::from(
            "Generate a JSON email draft using this conversation and information. \
             Remember to return ONLY the JSON object, no other text.\n\nConversation:\n",
        );

        let skip = history.len().saturating_sub(self.config.history_turns);
        for msg in &history[skip..] {
            let speaker = if msg.role == Role::User {
                "Customer"
            } else {
                "Sales Rep"
            };
            prompt.push_str(&format!("{}: {}\n\n", speaker, msg.content));
        }

        if !citations.is_empty() {
            prompt.push_str("\nReference these attachments:\n");
            for (i, citation) in citations.iter().enumerate() {
                let title = non_empty(&citation.title).unwrap_or("Untitled Document");
                prompt.push_str(&format!("{}. {}\n", i + 1, title));
            }
        }

        let signature = [
            ("name", rep.sales_rep_id.as_deref().unwrap_or(SALES_REPRESENTATIVE)),
            ("title", rep.title.as_deref().unwrap_or(SALES_REPRESENTATIVE)),
            ("territory", rep.territory.as_deref().unwrap_or("")),
            ("phone", rep.phone.as_str()),
            ("email", rep.email.as_str()),
            ("company", self.config.company.as_str()),
        ];
        prompt.push_str("\nUse this information for the signature:\n");
        for (key, value) in signature {
            prompt.push_str(&format!("{}: {}\n", key, value));
        }
        prompt
    }

    async fn prepare_attachments(&self, specs: &[AttachmentSpec]) -> Vec<PreparedAttachment> {
        let mut prepared = Vec::with_capacity(specs.len());
        for spec in specs {
            let source = match self.documents.fetch_attachment(&spec.filepath).await {
                Ok(Some(source)) => source,
                Ok(None) => continue,
                Err(e) => {
                    warn!(filepath = %spec.filepath, error = %e, "Failed to fetch attachment");
                    continue;
                }
            };
            if source.bytes.len() > self.config.max_attachment_bytes {
                info!(
                    filename = %spec.filename,
                    size = source.bytes.len(),
                    "Skipping attachment above the mail size limit"
                );
                continue;
            }
            prepared.push(PreparedAttachment {
                filename: spec.filename.clone(),
                content: source.bytes,
                content_type: source.content_type,
                title: spec.title.clone(),
            });
        }
        prepared
    }
}

/// One attachment per citation with a resolvable file, numbered by the
/// citation's position.
pub fn attachment_specs(citations: &[Citation]) -> Vec<AttachmentSpec> {
    citations
        .iter()
        .enumerate()
        .filter_map(|(i, citation)| {
            let filepath = match non_empty(&citation.filepath) {
                Some(path) => path.to_string(),
                None => non_empty(&citation.url)?.rsplit('/').next()?.to_string(),
            };
            if filepath.is_empty() {
                return None;
            }
            Some(AttachmentSpec {
                filename: attachment_filename(&filepath, i + 1),
                title: non_empty(&citation.title)
                    .unwrap_or(DEFAULT_ATTACHMENT_TITLE)
                    .to_string(),
                filepath,
            })
        })
        .collect()
}

/// `Document_<index><ext>`, `.txt` when the source has no extension.
pub fn attachment_filename(source: &str, index: usize) -> String {
    let (_, ext) = split_extension(source);
    let ext = if ext.is_empty() { ".txt" } else { ext };
    format!("Document_{}{}", index, ext)
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.trim().is_empty())
}

fn text_field(content: &Value, key: &str) -> Option<String> {
    content.get(key).and_then(Value::as_str).map(str::to_string)
}

/// `to` as a `;`-separated string; a list is joined.
fn recipients_to(content: &Value) -> String {
    match content.get("to") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(";"),
        _ => String::new(),
    }
}

/// `cc` as a list; a string is split on `;` or `,`.
fn recipients_cc(content: &Value) -> Vec<String> {
    match content.get("cc") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split([';', ','])
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

//! Follow-up email drafting.
//!
//! When the model asks for the `send_email` action, [`EmailDrafter`] writes
//! the email with a second completion call, collects the cited documents as
//! attachments and saves the result as a draft in the rep's mailbox.

pub mod drafter;
pub mod graph;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use drafter::EmailDrafter;
pub use graph::{GraphMailClient, MailClient};

/// A cited document to attach, before it is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSpec {
    /// Name shown in the email, `Document_<n><ext>`.
    pub filename: String,
    /// Blob path or `/documents/...` URL of the source.
    pub filepath: String,
    pub title: String,
}

/// A fetched attachment ready for the mail provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAttachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub title: String,
}

/// A drafted email with its attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailPackage {
    pub subject: String,
    pub body: String,
    pub signature: String,
    /// `;`-separated recipients.
    pub to: String,
    pub cc: Vec<String>,
    /// Every cited document, whether or not it could be fetched.
    pub attachments: Vec<AttachmentSpec>,
    /// The attachments actually fetched and within the size limit.
    pub prepared: Vec<PreparedAttachment>,
}

impl EmailPackage {
    pub fn to_recipients(&self) -> Vec<&str> {
        self.to
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect()
    }

    pub fn cc_recipients(&self) -> Vec<&str> {
        self.cc
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// Outcome of saving a draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DraftResult {
    pub fn created(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            status: "Draft created successfully".to_string(),
            timestamp: Utc::now(),
            location: Some("Drafts folder".to_string()),
            error: None,
        }
    }

    pub fn failed(status: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            status: status.to_string(),
            timestamp: Utc::now(),
            location: None,
            error: Some(error.into()),
        }
    }
}

/// Text appended to the chat reply after a draft attempt.
///
/// The drafted text is always shown, so the rep can still send it by hand
/// when the draft could not be saved.
pub fn draft_notice(package: &EmailPackage, result: &DraftResult) -> String {
    let heading = if result.success {
        "Email Draft Created:"
    } else {
        "Email Draft:"
    };
    let mut text = format!(
        "\n\n{}\n\nSubject: {}\n\n{}",
        heading, package.subject, package.body
    );
    if !package.attachments.is_empty() {
        text.push_str("\n\nAttachments:");
        for attachment in &package.attachments {
            text.push_str("\n- ");
            text.push_str(&attachment.title);
        }
    }
    if result.success {
        text.push_str(
            "\n\nThe email draft has been automatically created in your Outlook drafts folder.",
        );
        text.push_str("\nYou can review and send it from your email client.");
    } else {
        text.push_str("\n\nI created the email draft but couldn't save it to your drafts folder.");
        text.push_str("\nYou can copy the content above and create the email manually.");
    }
    text
}

/// Text appended when drafting failed before a draft could be attempted.
pub const DRAFT_ERROR_NOTICE: &str =
    "\n\nI encountered an error while creating the email draft. Please try again.";

//! Conversation engine for Salesdesk.
//!
//! Assembles prompts from the rep's sales context, calls the completion
//! service, parses the two-part model reply, drafts follow-up emails and
//! manages the lifecycle of each user's chat sessions.

pub mod completion;
pub mod email;
pub mod error;
pub mod feedback;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod session;
pub mod upload;

pub use completion::{
    AzureOpenAiClient, Completion, CompletionClient, CompletionRequest, GroundingSource,
};
pub use email::{DraftResult, EmailDrafter, EmailPackage, GraphMailClient, MailClient};
pub use error::ChatError;
pub use feedback::{FeedbackService, FeedbackType};
pub use orchestrator::{ImageUpload, MessageInput, MessageOrchestrator, MessageReply};
pub use parser::{parse_response, ParsedResponse, ResponseMetadata};
pub use prompt::{PromptBuilder, PromptProfile};
pub use session::{BootstrapData, ConversationSummary, SessionHistory, SessionManager};

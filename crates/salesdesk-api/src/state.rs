//! Application state shared across all route handlers.
//!
//! AppState is the composition root for the request-serving services. It is
//! passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use salesdesk_blob::{BlobStore, DocumentService, TelemetryLogger};
use salesdesk_chat::{
    CompletionClient, EmailDrafter, FeedbackService, GroundingSource, MailClient,
    MessageOrchestrator, PromptBuilder, SessionManager,
};
use salesdesk_core::config::SalesdeskConfig;
use salesdesk_search::{FederatedSearch, IndexSearcher, SalesContextProvider, SalesDataCache};
use salesdesk_storage::{ChatSessionRepository, Database};

/// Clients for the external services the API talks to.
///
/// The binary passes the HTTP clients; tests pass in-memory fakes.
pub struct Backends {
    pub searcher: Arc<dyn IndexSearcher>,
    pub completion: Arc<dyn CompletionClient>,
    pub blobs: Arc<dyn BlobStore>,
    pub mail: Arc<dyn MailClient>,
}

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SalesdeskConfig>,
    pub sessions: Arc<SessionManager>,
    pub sales: Arc<SalesContextProvider>,
    pub orchestrator: Arc<MessageOrchestrator>,
    pub documents: Arc<DocumentService>,
    pub feedback: Arc<FeedbackService>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire every service from the configuration and the given backends.
    pub fn new(config: SalesdeskConfig, database: Database, backends: Backends) -> Self {
        let repository = Arc::new(ChatSessionRepository::new(Arc::new(database)));
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&repository),
            PromptBuilder::new(config.openai.message_history_limit),
            Duration::from_secs(config.chat.empty_chat_timeout_secs),
        ));

        let cache = Arc::new(SalesDataCache::new(
            Duration::from_secs(config.chat.sales_data_refresh_secs),
            config.chat.cache_capacity,
        ));
        let search = Arc::new(FederatedSearch::from_config(backends.searcher, &config));
        let sales = Arc::new(SalesContextProvider::new(search, cache));

        let documents = Arc::new(DocumentService::new(
            Arc::clone(&backends.blobs),
            config.blob.documents_container.clone(),
        ));
        let telemetry = Arc::new(TelemetryLogger::new(
            backends.blobs,
            config.blob.telemetry_container.clone(),
            config.blob.feedback_container.clone(),
        ));

        let drafter = Arc::new(EmailDrafter::new(
            Arc::clone(&backends.completion),
            Arc::clone(&documents),
            backends.mail,
            config.mail.clone(),
        ));
        let grounding = (!config.search.grounding_index.is_empty())
            .then(|| GroundingSource::from_config(&config.search));
        let orchestrator = Arc::new(
            MessageOrchestrator::new(
                Arc::clone(&sessions),
                backends.completion,
                drafter,
                Arc::clone(&telemetry),
                &config.openai,
                config.chat.max_image_bytes,
            )
            .with_grounding(grounding),
        );
        let feedback = Arc::new(FeedbackService::new(repository, telemetry));

        Self {
            config: Arc::new(config),
            sessions,
            sales,
            orchestrator,
            documents,
            feedback,
            start_time: Instant::now(),
        }
    }
}

//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, the identity
//! middleware and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use salesdesk_core::config::SalesdeskConfig;
use salesdesk_core::error::SalesdeskError;

use crate::handlers;
use crate::state::AppState;

/// Headroom above the image limit for the rest of a multipart body.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let general = &state.config.general;
    let origins: Vec<HeaderValue> = [
        format!("http://{}:{}", general.host, general.port),
        format!("http://localhost:{}", general.port),
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Routes that do NOT require an identity.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route("/", get(handlers::index))
        .route("/food", get(handlers::food))
        .route("/protective", get(handlers::protective))
        .route("/message", post(handlers::message))
        .route("/new_chat", post(handlers::new_chat))
        .route("/switch_chat", post(handlers::switch_chat))
        .route("/get_chat_history/{id}", get(handlers::chat_history))
        .route("/documents/{*path}", get(handlers::document))
        .route("/feedback", post(handlers::feedback))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_identity,
        ));

    let body_limit = state.config.chat.max_image_bytes + FORM_OVERHEAD_BYTES;

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(config: &SalesdeskConfig, state: AppState) -> Result<(), SalesdeskError> {
    let addr = format!("{}:{}", config.general.host, config.general.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SalesdeskError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| SalesdeskError::Api(format!("Server error: {}", e)))?;

    Ok(())
}

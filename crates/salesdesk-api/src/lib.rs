//! Salesdesk API crate - axum HTTP server, identity middleware and route
//! handlers.
//!
//! Serves the chat page bootstrap data, the message endpoint, session
//! management, product documents, feedback and a health check.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, Backends};

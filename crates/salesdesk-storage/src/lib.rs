//! Salesdesk storage crate - SQLite persistence for chat sessions.
//!
//! Provides a WAL-mode SQLite database with migrations and the chat-session
//! repository, including the per-user active-session pointer.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::ChatSessionRepository;

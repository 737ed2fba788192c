//! Database schema migrations.
//!
//! Version 1 creates the chat_sessions and active_sessions tables.

use rusqlite::Connection;
use tracing::info;

use salesdesk_core::error::SalesdeskError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), SalesdeskError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SalesdeskError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SalesdeskError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: chat_sessions");
    }

    Ok(())
}

/// Version 1: chat sessions and the active-session pointer.
///
/// JSON-valued columns hold the message lists and the sales snapshot.
/// Timestamps are unix milliseconds.
fn apply_v1(conn: &Connection) -> Result<(), SalesdeskError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id                TEXT PRIMARY KEY NOT NULL,
            user_id           TEXT NOT NULL,
            messages          TEXT NOT NULL DEFAULT '[]',
            chat_history      TEXT NOT NULL DEFAULT '[]',
            citations         TEXT NOT NULL DEFAULT '[]',
            product_category  TEXT NOT NULL DEFAULT '',
            confidence_level  INTEGER NOT NULL DEFAULT 0,
            focus_area        TEXT NOT NULL DEFAULT '',
            detected_language TEXT NOT NULL DEFAULT '',
            sales_metadata    TEXT NOT NULL DEFAULT '{}',
            is_empty          INTEGER NOT NULL DEFAULT 1,
            created_at        INTEGER NOT NULL,
            last_activity     INTEGER NOT NULL,
            deleted_at        INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_user
            ON chat_sessions (user_id, created_at DESC)
            WHERE deleted_at IS NULL;

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_empty
            ON chat_sessions (is_empty, created_at)
            WHERE deleted_at IS NULL;

        CREATE TABLE IF NOT EXISTS active_sessions (
            user_id     TEXT PRIMARY KEY NOT NULL,
            session_id  TEXT NOT NULL,
            updated_at  INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'chat_sessions');
        ",
    )
    .map_err(|e| SalesdeskError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

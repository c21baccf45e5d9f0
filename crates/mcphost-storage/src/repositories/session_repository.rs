//! SQLite implementation of SessionRepository.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcphost_core::{AuthType, SessionRecord, SessionRepository};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use tracing::warn;

use super::parse_datetime;
use crate::Database;

struct RawSessionRow {
    user_id: String,
    server_id: String,
    session_id: String,
    server_url: String,
    auth_type: String,
    capabilities: String,
    created_at: String,
    last_used_at: String,
}

pub struct SqliteSessionRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteSessionRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    const SELECT_COLUMNS: &'static str =
        "user_id, server_id, session_id, server_url, auth_type, capabilities, created_at, last_used_at";

    fn extract_row(row: &rusqlite::Row) -> rusqlite::Result<RawSessionRow> {
        Ok(RawSessionRow {
            user_id: row.get(0)?,
            server_id: row.get(1)?,
            session_id: row.get(2)?,
            server_url: row.get(3)?,
            auth_type: row.get(4)?,
            capabilities: row.get(5)?,
            created_at: row.get(6)?,
            last_used_at: row.get(7)?,
        })
    }

    fn build_record(row: RawSessionRow) -> SessionRecord {
        let capabilities = serde_json::from_str(&row.capabilities).unwrap_or_else(|e| {
            warn!(
                server_id = %row.server_id,
                error = %e,
                "[SessionRepository] Unreadable capabilities, using empty object"
            );
            serde_json::json!({})
        });

        SessionRecord {
            auth_type: row.auth_type.parse().unwrap_or(AuthType::None),
            user_id: row.user_id,
            server_id: row.server_id,
            session_id: row.session_id,
            server_url: row.server_url,
            capabilities,
            created_at: parse_datetime(&row.created_at),
            last_used_at: parse_datetime(&row.last_used_at),
        }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn get(&self, user_id: &str, server_id: &str) -> Result<Option<SessionRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {} FROM protocol_sessions WHERE user_id = ?1 AND server_id = ?2",
            Self::SELECT_COLUMNS
        ))?;

        let row = stmt
            .query_row(params![user_id, server_id], Self::extract_row)
            .optional()?;

        Ok(row.map(Self::build_record))
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        let capabilities = serde_json::to_string(&record.capabilities)?;

        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO protocol_sessions (user_id, server_id, session_id, server_url, auth_type, capabilities, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id, server_id) DO UPDATE SET
                session_id = excluded.session_id,
                server_url = excluded.server_url,
                auth_type = excluded.auth_type,
                capabilities = excluded.capabilities,
                created_at = excluded.created_at,
                last_used_at = excluded.last_used_at",
            params![
                record.user_id,
                record.server_id,
                record.session_id,
                record.server_url,
                record.auth_type.as_str(),
                capabilities,
                record.created_at.to_rfc3339(),
                record.last_used_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn delete(&self, user_id: &str, server_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let deleted = db.connection().execute(
            "DELETE FROM protocol_sessions WHERE user_id = ?1 AND server_id = ?2",
            params![user_id, server_id],
        )?;
        Ok(deleted > 0)
    }

    async fn touch(&self, user_id: &str, server_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().await;
        let updated = db.connection().execute(
            "UPDATE protocol_sessions SET last_used_at = ?3 WHERE user_id = ?1 AND server_id = ?2",
            params![user_id, server_id, at.to_rfc3339()],
        )?;
        Ok(updated > 0)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        // Rows may mix RFC 3339 and SQLite datetime formats, so compare parsed values
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare("SELECT id, last_used_at FROM protocol_sessions")?;
        let stale: Vec<i64> = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|(_, last_used)| parse_datetime(last_used) < cutoff)
            .map(|(id, _)| id)
            .collect();

        let mut removed = 0;
        for id in stale {
            removed += conn.execute("DELETE FROM protocol_sessions WHERE id = ?1", params![id])?;
        }
        Ok(removed)
    }
}

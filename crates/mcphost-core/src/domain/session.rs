//! Protocol session record
//!
//! A session is a short-lived continuity token issued by a remote server.
//! It can be invalidated and rebuilt without touching stored credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::AuthType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: String,
    pub server_id: String,
    /// Opaque, server-assigned identifier
    pub session_id: String,
    pub server_url: String,
    pub auth_type: AuthType,
    /// Capabilities returned by the last `initialize`
    pub capabilities: Value,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        user_id: impl Into<String>,
        server_id: impl Into<String>,
        session_id: impl Into<String>,
        server_url: impl Into<String>,
        auth_type: AuthType,
        capabilities: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            server_id: server_id.into(),
            session_id: session_id.into(),
            server_url: server_url.into(),
            auth_type,
            capabilities,
            created_at: now,
            last_used_at: now,
        }
    }

    /// Whether the record has been idle longer than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.last_used_at > max_age
    }
}

/// Shorten a session id for logs
pub fn short_session_id(session_id: &str) -> &str {
    let end = session_id
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(session_id.len());
    &session_id[..end]
}

//! Repository implementations using SQLite.

mod credential_repository;
mod oauth_token_repository;
mod session_repository;

pub use credential_repository::SqliteCredentialRepository;
pub use oauth_token_repository::SqliteOAuthTokenRepository;
pub use session_repository::SqliteSessionRepository;

use chrono::{DateTime, Utc};

/// Parse a stored datetime (RFC 3339, or SQLite `datetime('now')` format).
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return dt.and_utc();
    }
    Utc::now()
}

pub(crate) fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|dt| parse_datetime(&dt))
}

/// Wrap an integrity failure so services can classify it.
pub(crate) fn decryption_error(context: &str, err: anyhow::Error) -> anyhow::Error {
    anyhow::Error::new(mcphost_core::HostError::Decryption(format!("{context}: {err}")))
}

pub(crate) fn encryption_error(context: &str, err: anyhow::Error) -> anyhow::Error {
    anyhow::Error::new(mcphost_core::HostError::Encryption(format!("{context}: {err}")))
}

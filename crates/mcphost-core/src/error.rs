//! Error taxonomy for the capability host
//!
//! Services and the runtime return [`HostResult`]. Repositories keep
//! returning `anyhow::Result` and are converted at the service boundary.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Why a remote server refused to start for lack of credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRequiredReason {
    /// Nothing was ever stored for this user and server
    NotConfigured,
    /// Credentials exist but are expired (or about to expire)
    Expired,
}

impl std::fmt::Display for AuthRequiredReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "not configured"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("server not found: {0}")]
    NotFound(String),

    #[error("authentication required for {server_id} ({reason})")]
    AuthRequired {
        server_id: String,
        reason: AuthRequiredReason,
    },

    #[error("server already running: {0}")]
    AlreadyRunning(String),

    #[error("server not connected: {0}")]
    ServerNotConnected(String),

    #[error("protocol error {code}: {message}")]
    Protocol {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("session invalid: {0}")]
    SessionInvalid(String),

    #[error("unsupported auth type: {0}")]
    UnsupportedAuthType(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("failed to launch server: {0}")]
    Launch(String),

    #[error("server is not available yet: {0}")]
    ComingSoon(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    pub fn auth_required(server_id: impl Into<String>, reason: AuthRequiredReason) -> Self {
        Self::AuthRequired {
            server_id: server_id.into(),
            reason,
        }
    }

    /// Short machine readable tag used in structured results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AuthRequired { .. } => "auth_required",
            Self::AlreadyRunning(_) => "already_running",
            Self::ServerNotConnected(_) => "server_not_connected",
            Self::Protocol { .. } => "protocol_error",
            Self::Transport(_) => "transport_error",
            Self::Encryption(_) => "encryption_error",
            Self::Decryption(_) => "decryption_error",
            Self::SessionInvalid(_) => "session_invalid",
            Self::UnsupportedAuthType(_) => "unsupported_auth_type",
            Self::InvalidCredentials(_) => "invalid_credentials",
            Self::Launch(_) => "launch_error",
            Self::ComingSoon(_) => "coming_soon",
            Self::Storage(_) => "storage_error",
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired { .. })
    }
}

impl From<anyhow::Error> for HostError {
    fn from(err: anyhow::Error) -> Self {
        // Storage wraps integrity failures in a HostError so they keep their class
        match err.downcast::<HostError>() {
            Ok(host) => host,
            Err(other) => HostError::Storage(format!("{other:#}")),
        }
    }
}

//! Domain Events
//!
//! Lifecycle notifications published by the server manager and the remote
//! protocol client. Consumers subscribe explicitly through the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::ServerKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ServerStarted {
        user_id: String,
        server_id: String,
        kind: ServerKind,
        tool_count: usize,
    },
    ServerStopped {
        user_id: String,
        server_id: String,
    },
    ServerError {
        user_id: String,
        server_id: String,
        error: String,
    },
    SessionRestored {
        user_id: String,
        server_id: String,
    },
    SessionInvalidated {
        user_id: String,
        server_id: String,
        reason: String,
    },
    HandshakeCompleted {
        user_id: String,
        server_id: String,
        session_id: Option<String>,
    },
    ClientDisconnected {
        user_id: String,
        server_id: String,
    },
    CredentialsStored {
        user_id: String,
        server_id: String,
    },
    CredentialsDeleted {
        user_id: String,
        server_id: String,
    },
    CapabilitiesRefreshed {
        user_id: String,
        server_id: String,
        tool_count: usize,
    },
}

impl DomainEvent {
    /// Stable name for logging and routing
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ServerStarted { .. } => "server_started",
            Self::ServerStopped { .. } => "server_stopped",
            Self::ServerError { .. } => "server_error",
            Self::SessionRestored { .. } => "session_restored",
            Self::SessionInvalidated { .. } => "session_invalidated",
            Self::HandshakeCompleted { .. } => "handshake_completed",
            Self::ClientDisconnected { .. } => "client_disconnected",
            Self::CredentialsStored { .. } => "credentials_stored",
            Self::CredentialsDeleted { .. } => "credentials_deleted",
            Self::CapabilitiesRefreshed { .. } => "capabilities_refreshed",
        }
    }

    pub fn server_id(&self) -> &str {
        match self {
            Self::ServerStarted { server_id, .. }
            | Self::ServerStopped { server_id, .. }
            | Self::ServerError { server_id, .. }
            | Self::SessionRestored { server_id, .. }
            | Self::SessionInvalidated { server_id, .. }
            | Self::HandshakeCompleted { server_id, .. }
            | Self::ClientDisconnected { server_id, .. }
            | Self::CredentialsStored { server_id, .. }
            | Self::CredentialsDeleted { server_id, .. }
            | Self::CapabilitiesRefreshed { server_id, .. } => server_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::ServerStarted { user_id, .. }
            | Self::ServerStopped { user_id, .. }
            | Self::ServerError { user_id, .. }
            | Self::SessionRestored { user_id, .. }
            | Self::SessionInvalidated { user_id, .. }
            | Self::HandshakeCompleted { user_id, .. }
            | Self::ClientDisconnected { user_id, .. }
            | Self::CredentialsStored { user_id, .. }
            | Self::CredentialsDeleted { user_id, .. }
            | Self::CapabilitiesRefreshed { user_id, .. } => user_id,
        }
    }

    pub fn is_lifecycle_event(&self) -> bool {
        matches!(
            self,
            Self::ServerStarted { .. } | Self::ServerStopped { .. } | Self::ServerError { .. }
        )
    }
}

/// Event with timestamp, for consumers that persist or forward events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEventEnvelope {
    pub event: DomainEvent,
    pub timestamp: DateTime<Utc>,
}

impl From<DomainEvent> for DomainEventEnvelope {
    fn from(event: DomainEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

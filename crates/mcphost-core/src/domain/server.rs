//! Runtime view of servers: connection keys, computed status and listings

use serde::{Deserialize, Serialize};

use crate::registry::{AuthType, RegistryEntry, ServerKind};

/// Key for a running connection (one per user per server)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerKey {
    pub user_id: String,
    pub server_id: String,
}

impl ServerKey {
    pub fn new(user_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            server_id: server_id.into(),
        }
    }
}

impl std::fmt::Display for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user_id, self.server_id)
    }
}

/// Runtime status, computed from catalog availability, connection map and last error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Available,
    Running,
    Error,
    ComingSoon,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Running => "running",
            Self::Error => "error",
            Self::ComingSoon => "coming_soon",
        }
    }
}

/// Registry entry annotated for one user, as returned by `listAvailable`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerListing {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: ServerKind,
    pub category: String,
    pub auth_type: AuthType,
    pub declared_tools: Vec<String>,
    pub status: ServerStatus,
    pub is_running: bool,
}

impl ServerListing {
    pub fn from_entry(entry: &RegistryEntry, status: ServerStatus) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            kind: entry.kind,
            category: entry.category.clone(),
            auth_type: entry.auth_type,
            declared_tools: entry.declared_tools.clone(),
            status,
            is_running: status == ServerStatus::Running,
        }
    }
}

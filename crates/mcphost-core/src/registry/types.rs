//! Core types for the capability server catalog

use serde::{Deserialize, Serialize};

/// How a server is reached
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ServerKind {
    /// Spawned locally as an isolated container speaking stdio
    LocalProcess,
    /// Remote endpoint speaking JSON-RPC over HTTP (+ SSE responses)
    RemoteHttp,
}

impl ServerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalProcess => "local-process",
            Self::RemoteHttp => "remote-http",
        }
    }
}

/// Authentication scheme a server expects
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    ApiKey,
    #[serde(rename = "oauth")]
    OAuth,
    Basic,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer => "bearer",
            Self::ApiKey => "api_key",
            Self::OAuth => "oauth",
            Self::Basic => "basic",
        }
    }

    /// Credential fields a user must supply for this scheme
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::Bearer => &["token"],
            Self::ApiKey => &["api_key"],
            Self::OAuth => &["access_token"],
            Self::Basic => &["username", "password"],
        }
    }
}

impl std::str::FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "bearer" => Ok(Self::Bearer),
            "api_key" => Ok(Self::ApiKey),
            "oauth" => Ok(Self::OAuth),
            "basic" => Ok(Self::Basic),
            other => Err(other.to_string()),
        }
    }
}

/// Catalog availability; runtime status is computed by the manager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Available,
    ComingSoon,
}

/// Static description of a capability server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ServerKind,
    /// Container image for local servers, URL for remote ones
    pub endpoint: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub declared_tools: Vec<String>,
    /// Extra arguments appended after the image for local servers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, rename = "status")]
    pub availability: Availability,
}

impl RegistryEntry {
    pub fn is_remote(&self) -> bool {
        self.kind == ServerKind::RemoteHttp
    }

    pub fn is_coming_soon(&self) -> bool {
        self.availability == Availability::ComingSoon
    }

    /// Local servers never need stored credentials, nor do `none` remotes
    pub fn requires_credentials(&self) -> bool {
        self.is_remote() && self.auth_type != AuthType::None
    }

    pub fn credential_requirements(&self) -> CredentialRequirements {
        if self.requires_credentials() {
            CredentialRequirements {
                required: true,
                auth_type: self.auth_type,
                fields: self
                    .auth_type
                    .required_fields()
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            }
        } else {
            CredentialRequirements {
                required: false,
                auth_type: AuthType::None,
                fields: Vec::new(),
            }
        }
    }
}

/// What a caller must provide before starting a server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequirements {
    pub required: bool,
    pub auth_type: AuthType,
    pub fields: Vec<String>,
}

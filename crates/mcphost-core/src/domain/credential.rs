//! Credential entities
//!
//! Two shapes share the same custody rules: generic credentials owned by the
//! credential store, and OAuth token pairs owned by the credential service.
//! Secrets are only ever in clear inside these structs while a request is
//! being built; repositories persist them encrypted.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HostError, HostResult};
use crate::registry::AuthType;

/// Authentication material for one server
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthCredentials {
    Bearer {
        token: String,
    },
    ApiKey {
        api_key: String,
    },
    #[serde(rename = "oauth")]
    OAuth {
        access_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        /// Tenant id for multi-tenant servers (Atlassian cloud id)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cloud_id: Option<String>,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl AuthCredentials {
    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::Bearer { .. } => AuthType::Bearer,
            Self::ApiKey { .. } => AuthType::ApiKey,
            Self::OAuth { .. } => AuthType::OAuth,
            Self::Basic { .. } => AuthType::Basic,
        }
    }

    /// Convert untyped input (`{"type": "...", ...}`) into a typed credential
    pub fn from_json(value: &Value) -> HostResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| HostError::InvalidCredentials("expected a JSON object".into()))?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| HostError::InvalidCredentials("missing 'type'".into()))?;

        let required = |field: &str| -> HostResult<String> {
            match obj.get(field).and_then(Value::as_str) {
                Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
                _ => Err(HostError::InvalidCredentials(format!(
                    "{kind} credentials require '{field}'"
                ))),
            }
        };
        let optional = |field: &str| -> Option<String> {
            obj.get(field)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match kind {
            "bearer" => Ok(Self::Bearer {
                token: required("token")?,
            }),
            "api_key" => Ok(Self::ApiKey {
                api_key: required("api_key")?,
            }),
            "oauth" => Ok(Self::OAuth {
                access_token: required("access_token")?,
                refresh_token: optional("refresh_token"),
                cloud_id: optional("cloud_id"),
            }),
            "basic" => Ok(Self::Basic {
                username: required("username")?,
                password: required("password")?,
            }),
            other => Err(HostError::UnsupportedAuthType(other.to_string())),
        }
    }
}

impl std::fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            Self::ApiKey { .. } => f.debug_struct("ApiKey").field("api_key", &"***").finish(),
            Self::OAuth {
                refresh_token,
                cloud_id,
                ..
            } => f
                .debug_struct("OAuth")
                .field("access_token", &"***")
                .field("has_refresh_token", &refresh_token.is_some())
                .field("cloud_id", cloud_id)
                .finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Credentials plus optional expiry, as accepted from callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialInput {
    pub credentials: AuthCredentials,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialInput {
    pub fn new(credentials: AuthCredentials) -> Self {
        Self {
            credentials,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Parse `{"type": ..., "expires_at": <rfc3339 | unix seconds>}`
    pub fn from_json(value: &Value) -> HostResult<Self> {
        let credentials = AuthCredentials::from_json(value)?;
        let raw_expiry = value.get("expires_at").or_else(|| value.get("expiresAt"));

        let expires_at = match raw_expiry {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| HostError::InvalidCredentials(format!("bad expires_at: {e}")))?,
            ),
            Some(Value::Number(n)) => {
                let secs = n
                    .as_i64()
                    .ok_or_else(|| HostError::InvalidCredentials("bad expires_at".into()))?;
                Some(
                    Utc.timestamp_opt(secs, 0)
                        .single()
                        .ok_or_else(|| HostError::InvalidCredentials("bad expires_at".into()))?,
                )
            }
            Some(_) => {
                return Err(HostError::InvalidCredentials(
                    "expires_at must be a string or number".into(),
                ))
            }
        };

        Ok(Self {
            credentials,
            expires_at,
        })
    }
}

/// A decrypted credential store record
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRecord {
    pub user_id: String,
    pub server_id: String,
    pub credentials: AuthCredentials,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn new(
        user_id: impl Into<String>,
        server_id: impl Into<String>,
        input: CredentialInput,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            server_id: server_id.into(),
            credentials: input.credentials,
            created_at: Utc::now(),
            expires_at: input.expires_at,
        }
    }

    pub fn auth_type(&self) -> AuthType {
        self.credentials.auth_type()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Credential metadata, safe to return to UI layers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub server_id: String,
    pub auth_type: AuthType,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a credential store read
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialLookup {
    Found(CredentialRecord),
    /// A record existed but had expired; it has been removed
    Expired,
    Missing,
}

impl CredentialLookup {
    pub fn into_record(self) -> Option<CredentialRecord> {
        match self {
            Self::Found(record) => Some(record),
            _ => None,
        }
    }
}

/// OAuth access/refresh pair held by the credential service
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub cloud_id: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthTokens {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            scope: None,
            cloud_id: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_cloud_id(mut self, cloud_id: impl Into<String>) -> Self {
        self.cloud_id = Some(cloud_id.into());
        self
    }

    pub fn to_credentials(&self) -> AuthCredentials {
        AuthCredentials::OAuth {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            cloud_id: self.cloud_id.clone(),
        }
    }
}

impl std::fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"***")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("cloud_id", &self.cloud_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Persisted OAuth token record for a (user, server) pair
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub user_id: String,
    pub server_id: String,
    pub tokens: OAuthTokens,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authentication state reported to UI layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthStatus {
    /// Never configured: direct the user to the initial authorization
    NotConfigured,
    /// Stored but expired (or within the refresh buffer)
    Expired { can_refresh: bool },
    Valid { expires_at: Option<DateTime<Utc>> },
}

impl AuthStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

//! Repository traits for data access
//!
//! These traits define the interface for durable state without specifying
//! the implementation (SQLite, in-memory, etc.). Every record is keyed by
//! `(user_id, server_id)`; saving replaces rather than appends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CredentialRecord, CredentialSummary, SessionRecord, TokenRecord};

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Encrypted credential store records
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Get and decrypt a credential
    async fn get(&self, user_id: &str, server_id: &str) -> RepoResult<Option<CredentialRecord>>;

    /// Encrypt and upsert a credential
    async fn save(&self, record: &CredentialRecord) -> RepoResult<()>;

    /// Delete a credential, returning whether one existed
    async fn delete(&self, user_id: &str, server_id: &str) -> RepoResult<bool>;

    /// Metadata for all of a user's credentials (no secrets)
    async fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<CredentialSummary>>;
}

/// Encrypted OAuth token pairs
#[async_trait]
pub trait OAuthTokenRepository: Send + Sync {
    async fn get(&self, user_id: &str, server_id: &str) -> RepoResult<Option<TokenRecord>>;

    /// Upsert; `created_at` of an existing record is preserved
    async fn save(&self, record: &TokenRecord) -> RepoResult<()>;

    async fn delete(&self, user_id: &str, server_id: &str) -> RepoResult<bool>;
}

/// Protocol session records
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, user_id: &str, server_id: &str) -> RepoResult<Option<SessionRecord>>;

    async fn save(&self, record: &SessionRecord) -> RepoResult<()>;

    async fn delete(&self, user_id: &str, server_id: &str) -> RepoResult<bool>;

    /// Set `last_used_at`; returns false if no record exists
    async fn touch(&self, user_id: &str, server_id: &str, at: DateTime<Utc>) -> RepoResult<bool>;

    /// Delete sessions last used before `cutoff`, returning the count
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> RepoResult<usize>;
}

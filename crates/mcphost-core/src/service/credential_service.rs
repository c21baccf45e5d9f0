//! Credential service - OAuth token view over encrypted storage
//!
//! Access and refresh tokens are encrypted independently under key material
//! separate from the credential store. Tokens that expire within
//! [`EXPIRY_BUFFER_SECS`] are already treated as invalid.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{AuthStatus, OAuthTokens, TokenRecord};
use crate::error::HostResult;
use crate::repository::OAuthTokenRepository;

/// Tokens expiring within this window count as expired (5 minutes)
pub const EXPIRY_BUFFER_SECS: i64 = 5 * 60;

fn expiry_buffer() -> chrono::Duration {
    chrono::Duration::seconds(EXPIRY_BUFFER_SECS)
}

/// Valid means no expiry, or expiry further away than the buffer
pub fn tokens_valid_at(tokens: &OAuthTokens, now: DateTime<Utc>) -> bool {
    match tokens.expires_at {
        None => true,
        Some(exp) => exp - expiry_buffer() > now,
    }
}

pub struct CredentialService {
    repository: Arc<dyn OAuthTokenRepository>,
}

impl CredentialService {
    pub fn new(repository: Arc<dyn OAuthTokenRepository>) -> Self {
        Self { repository }
    }

    /// Store or refresh a token pair (updates in place)
    pub async fn store_tokens(
        &self,
        user_id: &str,
        server_id: &str,
        tokens: OAuthTokens,
    ) -> HostResult<()> {
        let now = Utc::now();
        let created_at = self
            .repository
            .get(user_id, server_id)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let record = TokenRecord {
            user_id: user_id.to_string(),
            server_id: server_id.to_string(),
            tokens,
            created_at,
            updated_at: now,
        };
        self.repository.save(&record).await?;

        info!(
            user_id = %user_id,
            server_id = %server_id,
            expires_at = ?record.tokens.expires_at,
            has_refresh_token = record.tokens.refresh_token.is_some(),
            "[CredentialService] Stored tokens"
        );
        Ok(())
    }

    /// Stored tokens, even if inside the refresh buffer
    ///
    /// Tokens already past expiry with no refresh token are deleted and
    /// reported as absent.
    pub async fn get_tokens(&self, user_id: &str, server_id: &str) -> HostResult<Option<OAuthTokens>> {
        let Some(record) = self.repository.get(user_id, server_id).await? else {
            return Ok(None);
        };

        let expired = record.tokens.expires_at.is_some_and(|exp| exp <= Utc::now());
        if expired && record.tokens.refresh_token.is_none() {
            info!(
                user_id = %user_id,
                server_id = %server_id,
                "[CredentialService] Tokens expired without refresh token, removing"
            );
            self.repository.delete(user_id, server_id).await?;
            return Ok(None);
        }

        Ok(Some(record.tokens))
    }

    /// Tokens that are safe to use right now
    pub async fn get_valid_tokens(
        &self,
        user_id: &str,
        server_id: &str,
    ) -> HostResult<Option<OAuthTokens>> {
        Ok(self
            .get_tokens(user_id, server_id)
            .await?
            .filter(|t| tokens_valid_at(t, Utc::now())))
    }

    /// Never fails; errors and near-expiry both count as invalid
    pub async fn has_valid_credentials(&self, user_id: &str, server_id: &str) -> bool {
        match self.get_valid_tokens(user_id, server_id).await {
            Ok(tokens) => tokens.is_some(),
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    server_id = %server_id,
                    error = %e,
                    "[CredentialService] Token check failed"
                );
                false
            }
        }
    }

    /// True when tokens exist, are inside the buffer, and can be refreshed
    pub async fn needs_refresh(&self, user_id: &str, server_id: &str) -> bool {
        match self.get_tokens(user_id, server_id).await {
            Ok(Some(tokens)) => {
                tokens.refresh_token.is_some() && !tokens_valid_at(&tokens, Utc::now())
            }
            Ok(None) => false,
            Err(e) => {
                debug!(server_id = %server_id, error = %e, "[CredentialService] needs_refresh check failed");
                false
            }
        }
    }

    pub async fn auth_status(&self, user_id: &str, server_id: &str) -> HostResult<AuthStatus> {
        let Some(record) = self.repository.get(user_id, server_id).await? else {
            return Ok(AuthStatus::NotConfigured);
        };

        if tokens_valid_at(&record.tokens, Utc::now()) {
            return Ok(AuthStatus::Valid {
                expires_at: record.tokens.expires_at,
            });
        }

        Ok(AuthStatus::Expired {
            can_refresh: record.tokens.refresh_token.is_some(),
        })
    }

    pub async fn delete_tokens(&self, user_id: &str, server_id: &str) -> HostResult<bool> {
        let deleted = self.repository.delete(user_id, server_id).await?;
        if deleted {
            info!(
                user_id = %user_id,
                server_id = %server_id,
                "[CredentialService] Deleted tokens"
            );
        }
        Ok(deleted)
    }
}

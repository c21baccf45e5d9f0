//! Credential resolution for remote servers
//!
//! OAuth tokens live in the credential service; bearer, api key and basic
//! credentials live in the credential store. Reads try the token view first.

use std::sync::Arc;

use mcphost_core::{
    AuthCredentials, AuthRequiredReason, AuthStatus, CredentialInput,
    CredentialLookup, CredentialService, CredentialStore, HostError, HostResult, OAuthTokens,
    RegistryEntry,
};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<CredentialStore>,
    service: Arc<CredentialService>,
}

impl CredentialResolver {
    pub fn new(store: Arc<CredentialStore>, service: Arc<CredentialService>) -> Self {
        Self { store, service }
    }

    /// Credentials to use for `entry`, `None` when it needs none.
    ///
    /// Fails with `AuthRequired` distinguishing "never configured" from
    /// "expired".
    pub async fn resolve(
        &self,
        user_id: &str,
        entry: &RegistryEntry,
    ) -> HostResult<Option<AuthCredentials>> {
        if !entry.requires_credentials() {
            return Ok(None);
        }
        let server_id = entry.id.as_str();

        let mut saw_expired = false;
        match self.service.auth_status(user_id, server_id).await? {
            AuthStatus::Valid { .. } => {
                if let Some(tokens) = self.service.get_valid_tokens(user_id, server_id).await? {
                    debug!(server_id = %server_id, "[CredentialResolver] Using OAuth tokens");
                    return Ok(Some(tokens.to_credentials()));
                }
            }
            AuthStatus::Expired { .. } => saw_expired = true,
            AuthStatus::NotConfigured => {}
        }

        match self.store.lookup(user_id, server_id).await? {
            CredentialLookup::Found(record) => {
                if record.auth_type() != entry.auth_type {
                    warn!(
                        server_id = %server_id,
                        stored = record.auth_type().as_str(),
                        expected = entry.auth_type.as_str(),
                        "[CredentialResolver] Stored auth type differs from catalog"
                    );
                }
                Ok(Some(record.credentials))
            }
            CredentialLookup::Expired => Err(HostError::auth_required(
                server_id,
                AuthRequiredReason::Expired,
            )),
            CredentialLookup::Missing => Err(HostError::auth_required(
                server_id,
                if saw_expired {
                    AuthRequiredReason::Expired
                } else {
                    AuthRequiredReason::NotConfigured
                },
            )),
        }
    }

    /// OAuth input goes to the token view, everything else to the store.
    /// The other view's record is removed so only one source remains.
    pub async fn store(&self, user_id: &str, server_id: &str, input: CredentialInput) -> HostResult<()> {
        match &input.credentials {
            AuthCredentials::OAuth {
                access_token,
                refresh_token,
                cloud_id,
            } => {
                let mut tokens = OAuthTokens::new(access_token.clone());
                tokens.refresh_token = refresh_token.clone();
                tokens.cloud_id = cloud_id.clone();
                tokens.expires_at = input.expires_at;
                self.service.store_tokens(user_id, server_id, tokens).await?;
                self.store.delete(user_id, server_id).await?;
            }
            _ => {
                self.store.store(user_id, server_id, input).await?;
                self.service.delete_tokens(user_id, server_id).await?;
            }
        }
        Ok(())
    }

    /// Never fails; any error counts as "not valid"
    pub async fn has_valid(&self, user_id: &str, server_id: &str) -> bool {
        self.service.has_valid_credentials(user_id, server_id).await
            || self.store.has_valid(user_id, server_id).await
    }

    pub async fn delete(&self, user_id: &str, server_id: &str) -> HostResult<bool> {
        let tokens = self.service.delete_tokens(user_id, server_id).await?;
        let stored = self.store.delete(user_id, server_id).await?;
        Ok(tokens || stored)
    }

    pub async fn auth_status(&self, user_id: &str, server_id: &str) -> HostResult<AuthStatus> {
        let status = self.service.auth_status(user_id, server_id).await?;
        if status != AuthStatus::NotConfigured {
            return Ok(status);
        }

        Ok(match self.store.lookup(user_id, server_id).await? {
            // Expired records were already removed by the lookup
            CredentialLookup::Found(record) => AuthStatus::Valid {
                expires_at: record.expires_at,
            },
            CredentialLookup::Expired => AuthStatus::Expired { can_refresh: false },
            CredentialLookup::Missing => AuthStatus::NotConfigured,
        })
    }
}

//! Credential store - encrypted per-user, per-server secrets
//!
//! Records are encrypted by the repository. Expired records are treated as
//! absent and physically removed on the read that notices them.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{
    CredentialInput, CredentialLookup, CredentialRecord, CredentialSummary,
};
use crate::error::HostResult;
use crate::repository::CredentialRepository;

pub struct CredentialStore {
    repository: Arc<dyn CredentialRepository>,
}

impl CredentialStore {
    pub fn new(repository: Arc<dyn CredentialRepository>) -> Self {
        Self { repository }
    }

    /// Store (or replace) credentials for a user and server
    pub async fn store(
        &self,
        user_id: &str,
        server_id: &str,
        input: CredentialInput,
    ) -> HostResult<CredentialSummary> {
        let record = CredentialRecord::new(user_id, server_id, input);
        self.repository.save(&record).await?;

        info!(
            user_id = %user_id,
            server_id = %server_id,
            auth_type = record.auth_type().as_str(),
            "[CredentialStore] Stored credentials"
        );

        Ok(CredentialSummary {
            server_id: record.server_id,
            auth_type: record.credentials.auth_type(),
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
    }

    /// Validate untyped input and store it
    pub async fn store_json(
        &self,
        user_id: &str,
        server_id: &str,
        payload: &Value,
    ) -> HostResult<CredentialSummary> {
        let input = CredentialInput::from_json(payload)?;
        self.store(user_id, server_id, input).await
    }

    /// Read credentials, distinguishing "expired" from "never stored"
    pub async fn lookup(&self, user_id: &str, server_id: &str) -> HostResult<CredentialLookup> {
        let Some(record) = self.repository.get(user_id, server_id).await? else {
            return Ok(CredentialLookup::Missing);
        };

        if record.is_expired_at(Utc::now()) {
            info!(
                user_id = %user_id,
                server_id = %server_id,
                "[CredentialStore] Credentials expired, removing"
            );
            self.repository.delete(user_id, server_id).await?;
            return Ok(CredentialLookup::Expired);
        }

        Ok(CredentialLookup::Found(record))
    }

    /// Decrypted credentials, or `None` when absent or expired
    pub async fn get(&self, user_id: &str, server_id: &str) -> HostResult<Option<CredentialRecord>> {
        Ok(self.lookup(user_id, server_id).await?.into_record())
    }

    pub async fn delete(&self, user_id: &str, server_id: &str) -> HostResult<bool> {
        let deleted = self.repository.delete(user_id, server_id).await?;
        if deleted {
            info!(
                user_id = %user_id,
                server_id = %server_id,
                "[CredentialStore] Deleted credentials"
            );
        }
        Ok(deleted)
    }

    pub async fn list(&self, user_id: &str) -> HostResult<Vec<CredentialSummary>> {
        Ok(self.repository.list_for_user(user_id).await?)
    }

    /// Never fails; any internal error counts as "not valid"
    pub async fn has_valid(&self, user_id: &str, server_id: &str) -> bool {
        match self.lookup(user_id, server_id).await {
            Ok(CredentialLookup::Found(_)) => true,
            Ok(_) => false,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    server_id = %server_id,
                    error = %e,
                    "[CredentialStore] Credential check failed"
                );
                false
            }
        }
    }

    /// Remove every expired record for a user; returns how many were removed
    pub async fn purge_expired(&self, user_id: &str) -> HostResult<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for summary in self.repository.list_for_user(user_id).await? {
            if summary.expires_at.is_some_and(|exp| exp <= now)
                && self.repository.delete(user_id, &summary.server_id).await?
            {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(user_id = %user_id, removed, "[CredentialStore] Purged expired credentials");
        }
        Ok(removed)
    }
}

//! Session manager - persisted protocol session ids
//!
//! A returned record is only a candidate: the remote client verifies it with
//! the server before trusting it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::{short_session_id, SessionRecord};
use crate::error::HostResult;
use crate::repository::SessionRepository;

pub struct SessionManager {
    repository: Arc<dyn SessionRepository>,
    max_age: chrono::Duration,
}

impl SessionManager {
    pub fn new(repository: Arc<dyn SessionRepository>, max_age: Duration) -> Self {
        Self {
            repository,
            max_age: to_chrono(max_age),
        }
    }

    pub async fn store_session(&self, record: &SessionRecord) -> HostResult<()> {
        self.repository.save(record).await?;
        debug!(
            user_id = %record.user_id,
            server_id = %record.server_id,
            session_id = short_session_id(&record.session_id),
            "[SessionManager] Stored session"
        );
        Ok(())
    }

    /// Stored session, or `None` if absent or idle past the max age
    pub async fn get_session(
        &self,
        user_id: &str,
        server_id: &str,
    ) -> HostResult<Option<SessionRecord>> {
        let Some(record) = self.repository.get(user_id, server_id).await? else {
            return Ok(None);
        };

        if record.is_stale(Utc::now(), self.max_age) {
            info!(
                user_id = %user_id,
                server_id = %server_id,
                "[SessionManager] Session exceeded max age, discarding"
            );
            self.repository.delete(user_id, server_id).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    pub async fn invalidate_session(&self, user_id: &str, server_id: &str) -> HostResult<bool> {
        let deleted = self.repository.delete(user_id, server_id).await?;
        if deleted {
            info!(
                user_id = %user_id,
                server_id = %server_id,
                "[SessionManager] Session invalidated"
            );
        }
        Ok(deleted)
    }

    pub async fn update_last_used(&self, user_id: &str, server_id: &str) -> HostResult<bool> {
        Ok(self.repository.touch(user_id, server_id, Utc::now()).await?)
    }

    /// Delete sessions idle for longer than `max_age`
    pub async fn cleanup_expired(&self, max_age: Duration) -> HostResult<usize> {
        let cutoff = Utc::now() - to_chrono(max_age);
        let removed = self.repository.delete_older_than(cutoff).await?;
        if removed > 0 {
            info!(removed, "[SessionManager] Cleaned up expired sessions");
        }
        Ok(removed)
    }

    pub fn max_age(&self) -> chrono::Duration {
        self.max_age
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

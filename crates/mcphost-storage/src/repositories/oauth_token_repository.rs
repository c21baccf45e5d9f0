//! SQLite implementation of OAuthTokenRepository.
//!
//! Access and refresh tokens are encrypted independently, each bound to its
//! row and role through the associated data.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcphost_core::{OAuthTokenRepository, OAuthTokens, TokenRecord};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;

use super::{decryption_error, encryption_error, parse_datetime, parse_optional_datetime};
use crate::crypto::{row_aad, FieldEncryptor};
use crate::Database;

struct RawTokenRow {
    user_id: String,
    server_id: String,
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    scope: Option<String>,
    cloud_id: Option<String>,
    expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

pub struct SqliteOAuthTokenRepository {
    db: Arc<Mutex<Database>>,
    encryptor: Arc<FieldEncryptor>,
}

impl SqliteOAuthTokenRepository {
    pub fn new(db: Arc<Mutex<Database>>, encryptor: Arc<FieldEncryptor>) -> Self {
        Self { db, encryptor }
    }

    const SELECT_COLUMNS: &'static str = "user_id, server_id, access_token, refresh_token, token_type, scope, cloud_id, expires_at, created_at, updated_at";

    fn extract_row(row: &rusqlite::Row) -> rusqlite::Result<RawTokenRow> {
        Ok(RawTokenRow {
            user_id: row.get(0)?,
            server_id: row.get(1)?,
            access_token: row.get(2)?,
            refresh_token: row.get(3)?,
            token_type: row.get(4)?,
            scope: row.get(5)?,
            cloud_id: row.get(6)?,
            expires_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn aad(user_id: &str, server_id: &str, role: &str) -> String {
        format!("{}:{}", row_aad(user_id, server_id), role)
    }

    fn build_record(&self, row: RawTokenRow) -> Result<TokenRecord> {
        let access = self
            .encryptor
            .decrypt(&row.access_token, &Self::aad(&row.user_id, &row.server_id, "access"))
            .map_err(|e| decryption_error("access token", e))?;
        let refresh = row
            .refresh_token
            .as_deref()
            .map(|enc| {
                self.encryptor
                    .decrypt(enc, &Self::aad(&row.user_id, &row.server_id, "refresh"))
                    .map_err(|e| decryption_error("refresh token", e))
            })
            .transpose()?;

        Ok(TokenRecord {
            tokens: OAuthTokens {
                access_token: access.to_string(),
                refresh_token: refresh.map(|r| r.to_string()),
                token_type: row.token_type,
                scope: row.scope,
                cloud_id: row.cloud_id,
                expires_at: parse_optional_datetime(row.expires_at),
            },
            user_id: row.user_id,
            server_id: row.server_id,
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
        })
    }
}

#[async_trait]
impl OAuthTokenRepository for SqliteOAuthTokenRepository {
    async fn get(&self, user_id: &str, server_id: &str) -> Result<Option<TokenRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {} FROM oauth_tokens WHERE user_id = ?1 AND server_id = ?2",
            Self::SELECT_COLUMNS
        ))?;

        let row = stmt
            .query_row(params![user_id, server_id], Self::extract_row)
            .optional()?;

        match row {
            Some(raw) => Ok(Some(self.build_record(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        let tokens = &record.tokens;
        let access = self
            .encryptor
            .encrypt(
                &tokens.access_token,
                &Self::aad(&record.user_id, &record.server_id, "access"),
            )
            .map_err(|e| encryption_error("access token", e))?;
        let refresh = tokens
            .refresh_token
            .as_deref()
            .map(|token| {
                self.encryptor
                    .encrypt(token, &Self::aad(&record.user_id, &record.server_id, "refresh"))
                    .map_err(|e| encryption_error("refresh token", e))
            })
            .transpose()?;

        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO oauth_tokens (user_id, server_id, access_token, refresh_token, token_type, scope, cloud_id, expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(user_id, server_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_type = excluded.token_type,
                scope = excluded.scope,
                cloud_id = excluded.cloud_id,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            params![
                record.user_id,
                record.server_id,
                access,
                refresh,
                tokens.token_type,
                tokens.scope,
                tokens.cloud_id,
                tokens.expires_at.map(|dt| dt.to_rfc3339()),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn delete(&self, user_id: &str, server_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let deleted = db.connection().execute(
            "DELETE FROM oauth_tokens WHERE user_id = ?1 AND server_id = ?2",
            params![user_id, server_id],
        )?;
        Ok(deleted > 0)
    }
}

//! SQLite implementation of CredentialRepository.
//!
//! One row per (user, server). The whole credential object is serialized and
//! sealed with AES-256-GCM; ciphertext, IV and tag live in separate columns.
//! Metadata (auth type, timestamps) is plaintext for queryability.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcphost_core::{
    AuthCredentials, AuthType, CredentialRecord, CredentialRepository, CredentialSummary,
};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use super::{decryption_error, encryption_error, parse_datetime, parse_optional_datetime};
use crate::crypto::{row_aad, FieldEncryptor, SealedField};
use crate::Database;

/// Raw row data extracted from SQLite before decryption.
struct RawCredentialRow {
    user_id: String,
    server_id: String,
    auth_type: String,
    encrypted_payload: String,
    iv: String,
    auth_tag: String,
    created_at: String,
    expires_at: Option<String>,
}

/// SQLite-backed credential repository with field-level encryption.
pub struct SqliteCredentialRepository {
    db: Arc<Mutex<Database>>,
    encryptor: Arc<FieldEncryptor>,
}

impl SqliteCredentialRepository {
    pub fn new(db: Arc<Mutex<Database>>, encryptor: Arc<FieldEncryptor>) -> Self {
        Self { db, encryptor }
    }

    const SELECT_COLUMNS: &'static str =
        "user_id, server_id, auth_type, encrypted_payload, iv, auth_tag, created_at, expires_at";

    fn extract_row(row: &rusqlite::Row) -> rusqlite::Result<RawCredentialRow> {
        Ok(RawCredentialRow {
            user_id: row.get(0)?,
            server_id: row.get(1)?,
            auth_type: row.get(2)?,
            encrypted_payload: row.get(3)?,
            iv: row.get(4)?,
            auth_tag: row.get(5)?,
            created_at: row.get(6)?,
            expires_at: row.get(7)?,
        })
    }

    fn seal_credentials(&self, record: &CredentialRecord) -> Result<SealedField> {
        let plaintext = Zeroizing::new(serde_json::to_vec(&record.credentials)?);
        self.encryptor
            .seal(&plaintext, &row_aad(&record.user_id, &record.server_id))
            .map_err(|e| encryption_error("credential payload", e))
    }

    fn build_record(&self, row: RawCredentialRow) -> Result<CredentialRecord> {
        let sealed = SealedField {
            ciphertext: row.encrypted_payload,
            nonce: row.iv,
            tag: row.auth_tag,
        };
        let plaintext = self
            .encryptor
            .open(&sealed, &row_aad(&row.user_id, &row.server_id))
            .map_err(|e| decryption_error("credential payload", e))?;
        let credentials: AuthCredentials = serde_json::from_slice(&plaintext)
            .map_err(|e| decryption_error("credential payload", e.into()))?;

        Ok(CredentialRecord {
            user_id: row.user_id,
            server_id: row.server_id,
            credentials,
            created_at: parse_datetime(&row.created_at),
            expires_at: parse_optional_datetime(row.expires_at),
        })
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn get(&self, user_id: &str, server_id: &str) -> Result<Option<CredentialRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM credentials WHERE user_id = ?1 AND server_id = ?2",
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

    async fn save(&self, record: &CredentialRecord) -> Result<()> {
        let sealed = self.seal_credentials(record)?;
        let now = chrono::Utc::now().to_rfc3339();

        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO credentials (user_id, server_id, auth_type, encrypted_payload, iv, auth_tag, created_at, updated_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id, server_id) DO UPDATE SET
                auth_type = excluded.auth_type,
                encrypted_payload = excluded.encrypted_payload,
                iv = excluded.iv,
                auth_tag = excluded.auth_tag,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at",
            params![
                record.user_id,
                record.server_id,
                record.auth_type().as_str(),
                sealed.ciphertext,
                sealed.nonce,
                sealed.tag,
                record.created_at.to_rfc3339(),
                now,
                record.expires_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;

        Ok(())
    }

    async fn delete(&self, user_id: &str, server_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let deleted = db.connection().execute(
            "DELETE FROM credentials WHERE user_id = ?1 AND server_id = ?2",
            params![user_id, server_id],
        )?;
        Ok(deleted > 0)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<CredentialSummary>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT server_id, auth_type, created_at, expires_at FROM credentials
             WHERE user_id = ?1 ORDER BY server_id",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(server_id, auth_type, created_at, expires_at)| {
                Ok(CredentialSummary {
                    server_id,
                    auth_type: auth_type
                        .parse::<AuthType>()
                        .map_err(|t| anyhow::anyhow!("Unknown auth type in storage: {t}"))?,
                    created_at: parse_datetime(&created_at),
                    expires_at: parse_optional_datetime(expires_at),
                })
            })
            .collect()
    }
}

//! McpHost Storage Layer
//!
//! SQLite database with field-level encryption for credentials and tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │   CredentialStore / CredentialService / Sessions     │
//! ├──────────────────────────────────────────────────────┤
//! │               Repository Traits                      │
//! ├──────────────────────────────────────────────────────┤
//! │            SQLite Implementations                    │
//! ├──────────────────────────────────────────────────────┤
//! │   FieldEncryptor (AES-256-GCM, HKDF-derived keys)    │
//! ├──────────────────────────────────────────────────────┤
//! │   MasterKeyProvider (keychain / env / memory)        │
//! ├──────────────────────────────────────────────────────┤
//! │                 Database (SQLite)                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let master = KeychainKeyProvider::new()?.get_or_create_key()?;
//! let storage = Storage::open(&config.database_path(), &master)?;
//! let store = CredentialStore::new(storage.credentials.clone());
//! ```

pub mod crypto;
mod database;
pub mod keychain;
mod repositories;

pub use crypto::{generate_master_key, FieldEncryptor, KeyMaterial, SealedField, KEY_SIZE};
pub use database::Database;
pub use keychain::{EnvKeyProvider, KeychainKeyProvider, MasterKeyProvider, MemoryKeyProvider};
pub use repositories::*;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

/// The three repositories sharing one database and derived key set.
pub struct Storage {
    pub database: Arc<Mutex<Database>>,
    pub credentials: Arc<SqliteCredentialRepository>,
    pub tokens: Arc<SqliteOAuthTokenRepository>,
    pub sessions: Arc<SqliteSessionRepository>,
}

impl Storage {
    pub fn open(path: &Path, master_key: &[u8; KEY_SIZE]) -> Result<Self> {
        Self::from_database(Database::open(path)?, master_key)
    }

    pub fn open_in_memory(master_key: &[u8; KEY_SIZE]) -> Result<Self> {
        Self::from_database(Database::open_in_memory()?, master_key)
    }

    fn from_database(database: Database, master_key: &[u8; KEY_SIZE]) -> Result<Self> {
        let keys = KeyMaterial::derive(master_key)?;
        let database = Arc::new(Mutex::new(database));

        Ok(Self {
            credentials: Arc::new(SqliteCredentialRepository::new(
                database.clone(),
                Arc::new(keys.store_encryptor()?),
            )),
            tokens: Arc::new(SqliteOAuthTokenRepository::new(
                database.clone(),
                Arc::new(keys.service_encryptor()?),
            )),
            sessions: Arc::new(SqliteSessionRepository::new(database.clone())),
            database,
        })
    }
}

/// Resolve the master key provider for a configuration.
pub fn key_provider_for(master_secret: Option<&str>) -> Result<Box<dyn MasterKeyProvider>> {
    match master_secret {
        Some(secret) => Ok(Box::new(EnvKeyProvider::new(secret)?)),
        None => Ok(Box::new(KeychainKeyProvider::new()?)),
    }
}

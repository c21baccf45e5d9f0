//! Master secret providers.
//!
//! The master secret never encrypts data directly; per-view keys are derived
//! from it (see [`crate::crypto::KeyMaterial`]).
//!
//! - [`KeychainKeyProvider`]: platform-native secure storage (Windows Credential
//!   Manager, macOS Keychain, Linux Secret Service)
//! - [`EnvKeyProvider`]: secret supplied through configuration
//! - [`MemoryKeyProvider`]: process-local, for tests

use anyhow::{Context, Result};
use keyring::Entry;
use mcphost_core::branding;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{generate_master_key, KEY_SIZE};

/// Key name for the master encryption key.
const MASTER_KEY_NAME: &str = "master-encryption-key";

/// Trait for providing the master secret.
pub trait MasterKeyProvider: Send + Sync {
    /// Get the master key, creating one if it doesn't exist.
    fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>>;

    /// Check if a master key exists.
    fn key_exists(&self) -> bool;

    /// Delete the master key (for testing or reset).
    fn delete_key(&self) -> Result<()>;
}

/// OS Keychain-based master key provider.
pub struct KeychainKeyProvider {
    entry: Entry,
}

impl KeychainKeyProvider {
    pub fn new() -> Result<Self> {
        Self::with_names(branding::KEYCHAIN_SERVICE, MASTER_KEY_NAME)
    }

    /// Create with a custom service and key name.
    pub fn with_names(service: &str, key_name: &str) -> Result<Self> {
        let entry = Entry::new(service, key_name).context("Failed to create keychain entry")?;
        Ok(Self { entry })
    }
}

impl MasterKeyProvider for KeychainKeyProvider {
    fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        match self.entry.get_password() {
            Ok(hex_key) => {
                let hex_key = Zeroizing::new(hex_key);
                debug!("[Keychain] Retrieved existing master key");
                let key_bytes =
                    Zeroizing::new(hex::decode(hex_key.as_str()).context("Invalid key format in keychain")?);

                if key_bytes.len() != KEY_SIZE {
                    anyhow::bail!(
                        "Invalid key size in keychain: expected {}, got {}",
                        KEY_SIZE,
                        key_bytes.len()
                    );
                }

                let mut key = Zeroizing::new([0u8; KEY_SIZE]);
                key.copy_from_slice(&key_bytes);
                Ok(key)
            }
            Err(keyring::Error::NoEntry) => {
                info!("[Keychain] No master key found, generating new key");
                let key = Zeroizing::new(generate_master_key()?);
                let hex_key = Zeroizing::new(hex::encode(*key));

                self.entry
                    .set_password(&hex_key)
                    .context("Failed to store master key in keychain")?;

                info!("[Keychain] Master key generated and stored");
                Ok(key)
            }
            Err(e) => {
                warn!(error = ?e, "[Keychain] Keychain access failed");
                Err(anyhow::anyhow!("Failed to access keychain: {}", e))
            }
        }
    }

    fn key_exists(&self) -> bool {
        self.entry.get_password().is_ok()
    }

    fn delete_key(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) => {
                info!("[Keychain] Master key deleted");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Failed to delete key from keychain: {}", e)),
        }
    }
}

/// Master key from a configured secret (`MCPHOST_MASTER_SECRET`).
///
/// The secret may be any string; it is hashed to 256 bits.
pub struct EnvKeyProvider {
    secret: Zeroizing<String>,
}

impl EnvKeyProvider {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.trim().is_empty() {
            anyhow::bail!("Master secret must not be empty");
        }
        Ok(Self { secret })
    }
}

impl MasterKeyProvider for EnvKeyProvider {
    fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let digest = Sha256::digest(self.secret.as_bytes());
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&digest);
        Ok(key)
    }

    fn key_exists(&self) -> bool {
        true
    }

    fn delete_key(&self) -> Result<()> {
        anyhow::bail!("A configured master secret cannot be deleted")
    }
}

/// In-memory key provider.
#[derive(Default)]
pub struct MemoryKeyProvider {
    key: Mutex<Option<[u8; KEY_SIZE]>>,
}

impl MemoryKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Mutex::new(Some(key)),
        }
    }
}

impl MasterKeyProvider for MemoryKeyProvider {
    fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let mut guard = self.key.lock();
        match *guard {
            Some(key) => Ok(Zeroizing::new(key)),
            None => {
                let key = generate_master_key()?;
                *guard = Some(key);
                Ok(Zeroizing::new(key))
            }
        }
    }

    fn key_exists(&self) -> bool {
        self.key.lock().is_some()
    }

    fn delete_key(&self) -> Result<()> {
        *self.key.lock() = None;
        Ok(())
    }
}

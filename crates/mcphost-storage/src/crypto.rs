//! Field-level encryption for sensitive data.
//!
//! AES-256-GCM with a random 96-bit nonce per value. The `(user, server)`
//! pair is bound as associated data so a ciphertext cannot be replayed into
//! another row. Two independent keys are derived from the master secret with
//! HKDF-SHA256, one per credential view.

use anyhow::{Context, Result};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Size of the encryption key (32 bytes = 256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the nonce (12 bytes for AES-GCM).
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag.
pub const TAG_SIZE: usize = 16;

const HKDF_SALT: &[u8] = b"mcphost/field-encryption/v1";

/// HKDF label for the credential store key.
pub const CREDENTIAL_STORE_LABEL: &str = "credential-store";

/// HKDF label for the credential service (OAuth tokens) key.
pub const CREDENTIAL_SERVICE_LABEL: &str = "credential-service";

/// A sealed value with its parts hex-encoded for separate columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedField {
    pub ciphertext: String,
    pub nonce: String,
    pub tag: String,
}

/// Encryptor for sensitive field data.
pub struct FieldEncryptor {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl FieldEncryptor {
    /// Create a new encryptor with the given key.
    pub fn new(key: &[u8; KEY_SIZE]) -> Result<Self> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| anyhow::anyhow!("Failed to create encryption key"))?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    fn fresh_nonce(&self) -> Result<[u8; NONCE_SIZE]> {
        let mut nonce = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| anyhow::anyhow!("Failed to generate nonce"))?;
        Ok(nonce)
    }

    /// Encrypt into separate ciphertext / nonce / tag parts.
    pub fn seal(&self, plaintext: &[u8], aad: &str) -> Result<SealedField> {
        let nonce_bytes = self.fresh_nonce()?;
        let mut in_out = plaintext.to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(aad.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| anyhow::anyhow!("Encryption failed"))?;

        Ok(SealedField {
            ciphertext: hex::encode(&in_out),
            nonce: hex::encode(nonce_bytes),
            tag: hex::encode(tag.as_ref()),
        })
    }

    /// Decrypt a sealed field. Fails if the key, AAD or any part is wrong.
    pub fn open(&self, sealed: &SealedField, aad: &str) -> Result<Zeroizing<Vec<u8>>> {
        let nonce: [u8; NONCE_SIZE] = hex::decode(&sealed.nonce)
            .context("Invalid nonce encoding")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid nonce length"))?;
        let tag: [u8; TAG_SIZE] = hex::decode(&sealed.tag)
            .context("Invalid tag encoding")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid tag length"))?;

        let mut in_out = Zeroizing::new(
            hex::decode(&sealed.ciphertext).context("Invalid ciphertext encoding")?,
        );
        in_out.extend_from_slice(&tag);

        let len = self
            .key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| anyhow::anyhow!("Decryption failed - wrong key or corrupted data"))?
            .len();
        in_out.truncate(len);
        Ok(in_out)
    }

    /// Encrypt a string into a single hex value (nonce + ciphertext + tag).
    pub fn encrypt(&self, plaintext: &str, aad: &str) -> Result<String> {
        let nonce_bytes = self.fresh_nonce()?;
        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(aad.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| anyhow::anyhow!("Encryption failed"))?;

        let mut result = nonce_bytes.to_vec();
        result.extend_from_slice(&in_out);
        Ok(hex::encode(result))
    }

    /// Decrypt a value produced by [`FieldEncryptor::encrypt`].
    pub fn decrypt(&self, ciphertext_hex: &str, aad: &str) -> Result<Zeroizing<String>> {
        let data = hex::decode(ciphertext_hex).context("Invalid hex encoding")?;
        if data.len() < NONCE_SIZE + TAG_SIZE {
            anyhow::bail!("Ciphertext too short");
        }

        let (nonce_bytes, encrypted) = data.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid nonce"))?;

        let mut in_out = Zeroizing::new(encrypted.to_vec());
        let plaintext = self
            .key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| anyhow::anyhow!("Decryption failed - wrong key or corrupted data"))?;

        let text = std::str::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

/// Associated data binding a ciphertext to its row.
pub fn row_aad(user_id: &str, server_id: &str) -> String {
    format!("{user_id}:{server_id}")
}

/// Per-view keys derived from the master secret.
pub struct KeyMaterial {
    pub credential_store: Zeroizing<[u8; KEY_SIZE]>,
    pub credential_service: Zeroizing<[u8; KEY_SIZE]>,
}

impl KeyMaterial {
    pub fn derive(master: &[u8; KEY_SIZE]) -> Result<Self> {
        Ok(Self {
            credential_store: derive_key(master, CREDENTIAL_STORE_LABEL)?,
            credential_service: derive_key(master, CREDENTIAL_SERVICE_LABEL)?,
        })
    }

    pub fn store_encryptor(&self) -> Result<FieldEncryptor> {
        FieldEncryptor::new(&self.credential_store)
    }

    pub fn service_encryptor(&self) -> Result<FieldEncryptor> {
        FieldEncryptor::new(&self.credential_service)
    }
}

/// HKDF-SHA256 expand of the master secret under `label`.
pub fn derive_key(master: &[u8; KEY_SIZE], label: &str) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT).extract(master);
    let info = [label.as_bytes()];
    let okm = prk
        .expand(&info, hkdf::HKDF_SHA256)
        .map_err(|_| anyhow::anyhow!("Key derivation failed"))?;

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    okm.fill(&mut key[..])
        .map_err(|_| anyhow::anyhow!("Key derivation failed"))?;
    Ok(key)
}

/// Generate a random master key.
pub fn generate_master_key() -> Result<[u8; KEY_SIZE]> {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_SIZE];
    rng.fill(&mut key)
        .map_err(|_| anyhow::anyhow!("Failed to generate random key"))?;
    Ok(key)
}

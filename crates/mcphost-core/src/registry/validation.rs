//! Catalog validation
//!
//! Structural checks that serde alone cannot express.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use super::types::{RegistryEntry, ServerKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid catalog JSON: {0}")]
    InvalidJson(String),

    #[error("duplicate server id: {0}")]
    DuplicateId(String),

    #[error("server {id}: endpoint must be an http(s) URL ({endpoint})")]
    InvalidUrl { id: String, endpoint: String },

    #[error("server {0}: missing container image")]
    MissingImage(String),

    #[error("server entry with empty id")]
    EmptyId,
}

/// Validate a list of entries before they are indexed
pub fn validate_entries(entries: &[RegistryEntry]) -> Result<(), RegistryError> {
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(RegistryError::DuplicateId(entry.id.clone()));
        }

        match entry.kind {
            ServerKind::RemoteHttp => {
                let valid = Url::parse(&entry.endpoint)
                    .map(|u| matches!(u.scheme(), "http" | "https"))
                    .unwrap_or(false);
                if !valid {
                    return Err(RegistryError::InvalidUrl {
                        id: entry.id.clone(),
                        endpoint: entry.endpoint.clone(),
                    });
                }
            }
            ServerKind::LocalProcess => {
                if entry.endpoint.trim().is_empty() {
                    return Err(RegistryError::MissingImage(entry.id.clone()));
                }
            }
        }
    }

    Ok(())
}

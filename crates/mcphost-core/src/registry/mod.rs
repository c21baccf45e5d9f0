//! Capability server registry
//!
//! The catalog is bundled as JSON and parsed once at start-up. Entries are
//! immutable; runtime status lives in the lifecycle manager.

mod types;
mod validation;

pub use types::*;
pub use validation::*;

use serde::Deserialize;

const BUNDLED_CATALOG: &str = include_str!("catalog.json");

#[derive(Deserialize)]
struct CatalogFile {
    servers: Vec<RegistryEntry>,
}

/// Read-only index of known servers, in catalog order
#[derive(Debug, Clone)]
pub struct ServerRegistry {
    entries: Vec<RegistryEntry>,
}

impl ServerRegistry {
    /// Registry built from the catalog compiled into the binary
    pub fn bundled() -> Result<Self, RegistryError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    /// Parse a catalog document (`{"servers": [...]}`)
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| RegistryError::InvalidJson(e.to_string()))?;
        Self::from_entries(file.servers)
    }

    /// Registry from caller-supplied entries
    pub fn from_entries(entries: Vec<RegistryEntry>) -> Result<Self, RegistryError> {
        Self::validate(&entries)?;
        Ok(Self { entries })
    }

    pub fn validate(entries: &[RegistryEntry]) -> Result<(), RegistryError> {
        validate_entries(entries)
    }

    pub fn get(&self, server_id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.id == server_id)
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Entries that can be started (excludes `coming_soon`)
    pub fn available(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|e| !e.is_coming_soon())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

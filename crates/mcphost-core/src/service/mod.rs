//! Domain services
//!
//! Credential custody and session continuity over the repository traits.

mod credential_service;
mod credential_store;
mod session_manager;

pub use credential_service::{tokens_valid_at, CredentialService, EXPIRY_BUFFER_SECS};
pub use credential_store::CredentialStore;
pub use session_manager::SessionManager;

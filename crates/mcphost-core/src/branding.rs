//! Centralized branding constants
//!
//! All product naming comes from this module so the keychain entry, the
//! data directory, log file names and the client identity sent during the
//! protocol handshake stay consistent.

/// Human readable product name
pub const DISPLAY_NAME: &str = "McpHost";

/// Machine identifier (lowercase, used for directories and file names)
pub const IDENTIFIER: &str = "mcphost";

/// Keychain service name for the master secret
pub const KEYCHAIN_SERVICE: &str = "com.mcphost.desktop";

/// Prefix for rolling log files
pub const LOG_PREFIX: &str = "mcphost";

/// SQLite database file name inside the data directory
pub const DATABASE_FILE: &str = "mcphost.db";

/// Environment variable prefix for configuration
pub const ENV_PREFIX: &str = "MCPHOST_";

/// Client name announced in `initialize`
pub fn client_name() -> String {
    format!("{}-client", IDENTIFIER)
}

/// Name of an environment variable with the product prefix
///
/// # Example
/// ```ignore
/// assert_eq!(branding::env_var("DATA_DIR"), "MCPHOST_DATA_DIR");
/// ```
pub fn env_var(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}

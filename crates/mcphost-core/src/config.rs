//! Host configuration
//!
//! Defaults cover a desktop install. `HostConfig::from_env` layers a `.env`
//! file and `MCPHOST_*` variables on top.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::branding;

/// Protocol version announced in `initialize`
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Settings consumed by the remote protocol client
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Timeout for regular JSON-RPC requests
    pub request_timeout: Duration,
    /// Timeout for the `initialize` call that verifies a restored session
    pub verify_timeout: Duration,
    /// Post-handshake settle duration after `notifications/initialized`
    pub settle_duration: Duration,
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            verify_timeout: Duration::from_secs(10),
            settle_duration: Duration::from_millis(3000),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: branding::client_name(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Settings for local-process servers
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Container runtime binary (`docker`, `podman`, ...)
    pub container_runtime: String,
    /// Timeout for spawning the container and completing the handshake
    pub startup_timeout: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            container_runtime: "docker".to_string(),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; `None` disables file logging
    pub log_dir: Option<PathBuf>,
    /// Default filter when `RUST_LOG` is unset
    pub default_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            default_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub data_dir: PathBuf,
    /// Master secret override; when `None` the OS keychain is used
    pub master_secret: Option<String>,
    pub session_max_age: Duration,
    pub protocol: ProtocolConfig,
    pub launcher: LauncherConfig,
    pub logging: LoggingConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            logging: LoggingConfig {
                log_dir: Some(data_dir.join("logs")),
                ..LoggingConfig::default()
            },
            data_dir,
            master_secret: None,
            session_max_age: Duration::from_secs(24 * 60 * 60),
            protocol: ProtocolConfig::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl HostConfig {
    /// Load `.env` (if any) then read `MCPHOST_*` variables
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| {
            lookup(&branding::env_var(name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.logging.log_dir = Some(config.data_dir.join("logs"));
        }
        if let Some(dir) = var("LOG_DIR") {
            config.logging.log_dir = Some(PathBuf::from(dir));
        }
        config.master_secret = var("MASTER_SECRET");

        if let Some(secs) = parse_number(&var, "REQUEST_TIMEOUT_SECS") {
            config.protocol.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_number(&var, "VERIFY_TIMEOUT_SECS") {
            config.protocol.verify_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_number(&var, "SETTLE_MS") {
            config.protocol.settle_duration = Duration::from_millis(ms);
        }
        if let Some(hours) = parse_number(&var, "SESSION_MAX_AGE_HOURS") {
            config.session_max_age = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(runtime) = var("CONTAINER_RUNTIME") {
            config.launcher.container_runtime = runtime;
        }

        config
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(branding::DATABASE_FILE)
    }
}

fn parse_number<F>(var: &F, name: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = var(name)?;
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(
                variable = %branding::env_var(name),
                value = %raw,
                "[Config] Invalid number, using default"
            );
            None
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(branding::IDENTIFIER)
}

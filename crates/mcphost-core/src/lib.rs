//! # McpHost Core Library
//!
//! Domain logic for hosting capability servers.
//!
//! ## Modules
//!
//! - `branding` - Product naming constants
//! - `config` - Host configuration (`.env` + `MCPHOST_*`)
//! - `domain` - Credentials, sessions, capabilities, status and events
//! - `error` - `HostError` taxonomy
//! - `registry` - Bundled server catalog
//! - `repository` - Data access traits
//! - `service` - Credential store, credential service, session manager
//! - `event_bus` - Lifecycle event distribution

pub mod branding;
pub mod config;
pub mod domain;
pub mod error;
pub mod event_bus;
pub mod registry;
pub mod repository;
pub mod service;

pub use config::{HostConfig, LauncherConfig, LoggingConfig, ProtocolConfig};
pub use domain::*;
pub use error::{AuthRequiredReason, HostError, HostResult};
pub use registry::{
    AuthType, Availability, CredentialRequirements, RegistryEntry, RegistryError, ServerKind,
    ServerRegistry,
};
pub use repository::*;
pub use service::*;

pub use event_bus::{EventBus, EventReceiver, EventSender};

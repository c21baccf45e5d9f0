//! Server lifecycle: credential resolution, client construction, discovery
//! and the connection map

mod credentials;
mod discovery;
mod factory;
mod server_manager;

pub use credentials::CredentialResolver;
pub use discovery::discover;
pub use factory::{ClientFactory, ConnectRequest, DefaultClientFactory, ServerConfig};
pub use server_manager::{
    CapabilityCounts, HealthReport, HealthStatus, RunningServer, ServerHealth, ServerManager,
    StartOutcome, StopOutcome, StopReport,
};

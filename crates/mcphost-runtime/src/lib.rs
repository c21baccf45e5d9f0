//! McpHost Runtime
//!
//! Connects to capability servers and manages their lifecycle:
//! - `protocol` - JSON-RPC over HTTP with SSE replies, session capture and restore
//! - `launcher` - local servers in containers over stdio (rmcp)
//! - `manager` - `ServerManager`, credential resolution and discovery
//! - `logging` - tracing subscriber setup

pub mod client;
pub mod launcher;
pub mod logging;
pub mod manager;
pub mod protocol;

pub use client::CapabilityClient;
pub use launcher::{ContainerLauncher, LaunchSpec, ProcessLauncher};
pub use logging::init_tracing;
pub use manager::{
    discover, CapabilityCounts, ClientFactory, ConnectRequest, CredentialResolver,
    DefaultClientFactory, HealthReport, HealthStatus, RunningServer, ServerConfig, ServerHealth,
    ServerManager, StartOutcome, StopOutcome, StopReport,
};
pub use protocol::{ClientContext, ClientState, RemoteClient, RemoteTarget};

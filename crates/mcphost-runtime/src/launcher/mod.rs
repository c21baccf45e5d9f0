//! Local-process servers
//!
//! A launcher turns a catalog image reference into a running child process
//! speaking the protocol over stdio, exposed through [`CapabilityClient`].

mod container;
mod handler;
mod local_client;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcphost_core::{HostResult, ServerKey};

use crate::client::CapabilityClient;

pub use container::ContainerLauncher;
pub use handler::HostClientHandler;
pub use local_client::{LocalProcessClient, LocalService};

/// Everything needed to spawn one local server
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub key: ServerKey,
    /// Container image reference from the catalog
    pub image: String,
    pub args: Vec<String>,
    /// Environment passed to the server (tokens for local servers go here)
    pub env: BTreeMap<String, String>,
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the server and complete the protocol handshake.
    ///
    /// Fails with `HostError::Launch` when the process cannot be started or
    /// does not answer in time.
    async fn launch(&self, spec: LaunchSpec) -> HostResult<Arc<dyn CapabilityClient>>;
}

//! Client construction per server kind
//!
//! The manager asks a [`ClientFactory`] for a connected client and never
//! builds transports itself, so tests can substitute in-memory clients.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcphost_core::{AuthCredentials, HostError, HostResult, RegistryEntry, ServerKey, ServerKind};
use tracing::debug;

use crate::client::CapabilityClient;
use crate::launcher::{LaunchSpec, ProcessLauncher};
use crate::protocol::{ClientContext, RemoteClient, RemoteTarget};

/// Per-start user configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Environment for local servers
    pub env: BTreeMap<String, String>,
}

impl ServerConfig {
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }
}

pub struct ConnectRequest {
    pub key: ServerKey,
    pub entry: RegistryEntry,
    pub credentials: Option<AuthCredentials>,
    pub config: ServerConfig,
}

#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Return a client that is ready for traffic.
    ///
    /// On error nothing is left running.
    async fn connect(&self, request: ConnectRequest) -> HostResult<Arc<dyn CapabilityClient>>;
}

pub struct DefaultClientFactory {
    ctx: ClientContext,
    launcher: Option<Arc<dyn ProcessLauncher>>,
}

impl DefaultClientFactory {
    pub fn new(ctx: ClientContext) -> Self {
        Self {
            ctx,
            launcher: None,
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }
}

#[async_trait]
impl ClientFactory for DefaultClientFactory {
    async fn connect(&self, request: ConnectRequest) -> HostResult<Arc<dyn CapabilityClient>> {
        let ConnectRequest {
            key,
            entry,
            credentials,
            config,
        } = request;

        match entry.kind {
            ServerKind::RemoteHttp => {
                debug!(server_id = %key.server_id, url = %entry.endpoint, "[ClientFactory] Connecting remote server");
                let client = RemoteClient::new(
                    RemoteTarget {
                        key,
                        url: entry.endpoint,
                        auth_type: entry.auth_type,
                        credentials,
                    },
                    self.ctx.clone(),
                );
                client.connect().await?;
                Ok(Arc::new(client))
            }
            ServerKind::LocalProcess => {
                let Some(launcher) = &self.launcher else {
                    return Err(HostError::Launch(format!(
                        "no local launcher configured for {}",
                        key.server_id
                    )));
                };
                launcher
                    .launch(LaunchSpec {
                        key,
                        image: entry.endpoint,
                        args: entry.args,
                        env: config.env,
                    })
                    .await
            }
        }
    }
}

//! ServerManager - lifecycle of capability server connections
//!
//! Owns the map of running connections keyed by (user, server). Status is
//! never stored: it is computed from catalog availability, map membership
//! and the last start error.
//!
//! Concurrency:
//! - a per-key start lock serializes `start` for the same key; a second
//!   caller waits, then sees the connection and reports `already_running`
//! - map shards are never held across an await; clients are cloned out first

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use mcphost_core::{
    AuthStatus, CapabilitySnapshot, CredentialInput, CredentialRequirements, DomainEvent,
    EventSender, HostError, HostResult, RegistryEntry, ServerCapabilities, ServerKey, ServerKind,
    ServerListing, ServerRegistry, ServerStatus, ToolCallOutcome,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::credentials::CredentialResolver;
use super::discovery::discover;
use super::factory::{ClientFactory, ConnectRequest, ServerConfig};
use crate::client::CapabilityClient;

struct RunningConnection {
    client: Arc<dyn CapabilityClient>,
    kind: ServerKind,
    started_at: DateTime<Utc>,
    started: Instant,
    capabilities: ServerCapabilities,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub capabilities: ServerCapabilities,
    #[serde(rename = "type")]
    pub kind: ServerKind,
    pub already_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    /// `false` only when closing the client failed; the connection is gone either way
    pub success: bool,
    pub was_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
    pub user_id: String,
    pub server_id: String,
    #[serde(flatten)]
    pub outcome: StopOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningServer {
    pub user_id: String,
    pub server_id: String,
    #[serde(rename = "type")]
    pub kind: ServerKind,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub tool_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityCounts {
    pub tools: usize,
    pub resources: usize,
    pub prompts: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub status: HealthStatus,
    pub uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub total_servers: usize,
    pub running_servers: usize,
    /// Keyed by `user/server`
    pub servers: BTreeMap<String, ServerHealth>,
}

pub struct ServerManager {
    registry: Arc<ServerRegistry>,
    connections: DashMap<ServerKey, RunningConnection>,
    start_locks: DashMap<ServerKey, Arc<Mutex<()>>>,
    last_errors: DashMap<ServerKey, String>,
    credentials: CredentialResolver,
    factory: Arc<dyn ClientFactory>,
    events: EventSender,
}

impl ServerManager {
    pub fn new(
        registry: Arc<ServerRegistry>,
        credentials: CredentialResolver,
        factory: Arc<dyn ClientFactory>,
        events: EventSender,
    ) -> Self {
        Self {
            registry,
            connections: DashMap::new(),
            start_locks: DashMap::new(),
            last_errors: DashMap::new(),
            credentials,
            factory,
            events,
        }
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    fn entry(&self, server_id: &str) -> HostResult<&RegistryEntry> {
        self.registry
            .get(server_id)
            .ok_or_else(|| HostError::NotFound(server_id.to_string()))
    }

    fn client_for(&self, key: &ServerKey) -> Option<Arc<dyn CapabilityClient>> {
        self.connections.get(key).map(|c| c.client.clone())
    }

    fn connected_client(&self, key: &ServerKey) -> HostResult<Arc<dyn CapabilityClient>> {
        self.client_for(key)
            .ok_or_else(|| HostError::ServerNotConnected(key.to_string()))
    }

    fn already_running(&self, key: &ServerKey) -> Option<StartOutcome> {
        self.connections.get(key).map(|c| StartOutcome {
            capabilities: c.capabilities.clone(),
            kind: c.kind,
            already_running: true,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start a server for a user.
    ///
    /// Returns the cached capabilities with `already_running` when a
    /// connection exists. On failure nothing stays registered.
    pub async fn start(
        &self,
        server_id: &str,
        user_id: &str,
        config: ServerConfig,
    ) -> HostResult<StartOutcome> {
        let entry = self.entry(server_id)?;
        if entry.is_coming_soon() {
            return Err(HostError::ComingSoon(server_id.to_string()));
        }

        let key = ServerKey::new(user_id, server_id);
        if let Some(outcome) = self.already_running(&key) {
            debug!(key = %key, "[ServerManager] Already running");
            return Ok(outcome);
        }

        let lock = self.start_locks.entry(key.clone()).or_default().value().clone();
        let _guard = lock.lock().await;

        // A concurrent start may have finished while we waited
        if let Some(outcome) = self.already_running(&key) {
            debug!(key = %key, "[ServerManager] Started concurrently, reusing connection");
            return Ok(outcome);
        }

        info!(
            user_id = %user_id,
            server_id = %server_id,
            kind = entry.kind.as_str(),
            "[ServerManager] Starting server"
        );

        let credentials = match self.credentials.resolve(user_id, entry).await {
            Ok(credentials) => credentials,
            Err(e) => return Err(self.start_failed(&key, e)),
        };

        let client = match self
            .factory
            .connect(ConnectRequest {
                key: key.clone(),
                entry: entry.clone(),
                credentials,
                config,
            })
            .await
        {
            Ok(client) => client,
            Err(e) => return Err(self.start_failed(&key, e)),
        };

        let capabilities = discover(client.as_ref(), &key).await;
        let tool_count = capabilities.tools.len();

        self.connections.insert(
            key.clone(),
            RunningConnection {
                client,
                kind: entry.kind,
                started_at: Utc::now(),
                started: Instant::now(),
                capabilities: capabilities.clone(),
            },
        );
        self.last_errors.remove(&key);

        info!(
            user_id = %user_id,
            server_id = %server_id,
            tool_count,
            "[ServerManager] Server started"
        );
        self.events.emit(DomainEvent::ServerStarted {
            user_id: user_id.to_string(),
            server_id: server_id.to_string(),
            kind: entry.kind,
            tool_count,
        });

        Ok(StartOutcome {
            capabilities,
            kind: entry.kind,
            already_running: false,
        })
    }

    /// Record a start failure. Missing credentials leave the status untouched.
    fn start_failed(&self, key: &ServerKey, err: HostError) -> HostError {
        if err.is_auth_required() {
            info!(key = %key, error = %err, "[ServerManager] Credentials required");
            return err;
        }

        error!(key = %key, error = %err, "[ServerManager] Failed to start server");
        self.last_errors.insert(key.clone(), err.to_string());
        self.events.emit(DomainEvent::ServerError {
            user_id: key.user_id.clone(),
            server_id: key.server_id.clone(),
            error: err.to_string(),
        });
        err
    }

    /// Stop a server. Stopping something that is not running succeeds.
    pub async fn stop(&self, server_id: &str, user_id: &str) -> StopOutcome {
        let key = ServerKey::new(user_id, server_id);
        let lock = self.start_locks.entry(key.clone()).or_default().value().clone();
        let outcome = {
            let _guard = lock.lock().await;
            self.stop_locked(&key).await
        };

        // Map entry plus our clone: nobody else is starting or stopping this key
        self.start_locks
            .remove_if(&key, |_, held| Arc::strong_count(held) <= 2);
        outcome
    }

    /// Keys with a start lock allocated
    pub fn start_lock_count(&self) -> usize {
        self.start_locks.len()
    }

    async fn stop_locked(&self, key: &ServerKey) -> StopOutcome {
        let (user_id, server_id) = (key.user_id.as_str(), key.server_id.as_str());
        self.last_errors.remove(key);
        let Some((_, connection)) = self.connections.remove(key) else {
            debug!(key = %key, "[ServerManager] Stop requested for a server that is not running");
            return StopOutcome {
                success: true,
                was_running: false,
                error: None,
            };
        };

        let closed = connection.client.close().await;
        if let Err(e) = &closed {
            warn!(key = %key, error = %e, "[ServerManager] Client did not close cleanly");
        }

        info!(
            key = %key,
            uptime_secs = connection.started.elapsed().as_secs(),
            "[ServerManager] Server stopped"
        );
        self.events.emit(DomainEvent::ServerStopped {
            user_id: user_id.to_string(),
            server_id: server_id.to_string(),
        });

        StopOutcome {
            success: closed.is_ok(),
            was_running: true,
            error: closed.err().map(|e| e.to_string()),
        }
    }

    /// Stop every running connection concurrently
    pub async fn stop_all(&self) -> Vec<StopReport> {
        let keys: Vec<ServerKey> = self.connections.iter().map(|c| c.key().clone()).collect();
        info!(count = keys.len(), "[ServerManager] Stopping all servers");

        join_all(keys.into_iter().map(|key| async move {
            let outcome = self.stop(&key.server_id, &key.user_id).await;
            StopReport {
                user_id: key.user_id,
                server_id: key.server_id,
                outcome,
            }
        }))
        .await
    }

    // ========================================================================
    // Capability calls
    // ========================================================================

    /// Call a tool. Failures are reported in the outcome, never as `Err`.
    pub async fn execute_tool(
        &self,
        server_id: &str,
        user_id: &str,
        tool_name: &str,
        parameters: Value,
    ) -> ToolCallOutcome {
        let key = ServerKey::new(user_id, server_id);
        let client = match self.connected_client(&key) {
            Ok(client) => client,
            Err(e) => return ToolCallOutcome::failure(e.to_string()),
        };

        debug!(key = %key, tool = %tool_name, "[ServerManager] Executing tool");
        match client.call_tool(tool_name, parameters).await {
            Ok(result) => ToolCallOutcome::from_result(result),
            Err(e) => {
                warn!(key = %key, tool = %tool_name, error = %e, "[ServerManager] Tool call failed");
                ToolCallOutcome::failure(e.to_string())
            }
        }
    }

    pub async fn read_resource(&self, server_id: &str, user_id: &str, uri: &str) -> HostResult<Value> {
        let client = self.connected_client(&ServerKey::new(user_id, server_id))?;
        client.read_resource(uri).await
    }

    pub async fn get_prompt(
        &self,
        server_id: &str,
        user_id: &str,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> HostResult<Value> {
        let client = self.connected_client(&ServerKey::new(user_id, server_id))?;
        client.get_prompt(name, arguments).await
    }

    /// Live capabilities for a connected server; empty with `connected: false`
    /// otherwise.
    pub async fn get_server_capabilities(
        &self,
        server_id: &str,
        user_id: &str,
    ) -> HostResult<CapabilitySnapshot> {
        self.entry(server_id)?;
        let key = ServerKey::new(user_id, server_id);
        let Some(client) = self.client_for(&key) else {
            return Ok(CapabilitySnapshot {
                capabilities: ServerCapabilities::default(),
                connected: false,
            });
        };

        let capabilities = discover(client.as_ref(), &key).await;
        if let Some(mut connection) = self.connections.get_mut(&key) {
            connection.capabilities = capabilities.clone();
        }
        Ok(CapabilitySnapshot {
            capabilities,
            connected: true,
        })
    }

    /// Re-run discovery and replace the cached capabilities
    pub async fn refresh_capabilities(
        &self,
        server_id: &str,
        user_id: &str,
    ) -> HostResult<ServerCapabilities> {
        let key = ServerKey::new(user_id, server_id);
        let client = self.connected_client(&key)?;
        let capabilities = discover(client.as_ref(), &key).await;

        match self.connections.get_mut(&key) {
            Some(mut connection) => connection.capabilities = capabilities.clone(),
            // Stopped while discovering
            None => return Err(HostError::ServerNotConnected(key.to_string())),
        }

        self.events.emit(DomainEvent::CapabilitiesRefreshed {
            user_id: user_id.to_string(),
            server_id: server_id.to_string(),
            tool_count: capabilities.tools.len(),
        });
        Ok(capabilities)
    }

    /// Probe every running connection. One failing server never aborts the scan.
    pub async fn health_check(&self) -> HealthReport {
        let targets: Vec<(ServerKey, Arc<dyn CapabilityClient>, Instant)> = self
            .connections
            .iter()
            .map(|c| (c.key().clone(), c.client.clone(), c.started))
            .collect();

        let probes = targets.into_iter().map(|(key, client, started)| async move {
            let uptime_secs = started.elapsed().as_secs();
            let health = match probe(client.as_ref()).await {
                Ok(counts) => ServerHealth {
                    status: HealthStatus::Healthy,
                    uptime_secs,
                    capabilities: Some(counts),
                    error: None,
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "[ServerManager] Health check failed");
                    ServerHealth {
                        status: HealthStatus::Unhealthy,
                        uptime_secs,
                        capabilities: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            (key.to_string(), health)
        });
        let servers: BTreeMap<String, ServerHealth> = join_all(probes).await.into_iter().collect();

        HealthReport {
            total_servers: self.registry.len(),
            running_servers: servers.len(),
            servers,
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn get_status(&self, server_id: &str, user_id: &str) -> HostResult<ServerStatus> {
        let entry = self.entry(server_id)?;
        Ok(self.status_of(entry, &ServerKey::new(user_id, server_id)))
    }

    fn status_of(&self, entry: &RegistryEntry, key: &ServerKey) -> ServerStatus {
        if entry.is_coming_soon() {
            ServerStatus::ComingSoon
        } else if self.connections.contains_key(key) {
            ServerStatus::Running
        } else if self.last_errors.contains_key(key) {
            ServerStatus::Error
        } else {
            ServerStatus::Available
        }
    }

    /// Startable catalog entries with this user's status
    pub fn list_available(&self, user_id: &str) -> Vec<ServerListing> {
        self.registry
            .available()
            .map(|entry| {
                let status = self.status_of(entry, &ServerKey::new(user_id, &entry.id));
                ServerListing::from_entry(entry, status)
            })
            .collect()
    }

    pub fn list_running(&self) -> Vec<RunningServer> {
        let mut running: Vec<RunningServer> = self
            .connections
            .iter()
            .map(|c| RunningServer {
                user_id: c.key().user_id.clone(),
                server_id: c.key().server_id.clone(),
                kind: c.kind,
                started_at: c.started_at,
                uptime_secs: c.started.elapsed().as_secs(),
                tool_count: c.capabilities.tools.len(),
            })
            .collect();
        running.sort_by(|a, b| (&a.user_id, &a.server_id).cmp(&(&b.user_id, &b.server_id)));
        running
    }

    pub fn is_running(&self, server_id: &str, user_id: &str) -> bool {
        self.connections
            .contains_key(&ServerKey::new(user_id, server_id))
    }

    pub fn last_error(&self, server_id: &str, user_id: &str) -> Option<String> {
        self.last_errors
            .get(&ServerKey::new(user_id, server_id))
            .map(|e| e.value().clone())
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    pub async fn store_credentials(
        &self,
        server_id: &str,
        user_id: &str,
        input: CredentialInput,
    ) -> HostResult<()> {
        let entry = self.entry(server_id)?;
        let provided = input.credentials.auth_type();
        if !entry.requires_credentials() || provided != entry.auth_type {
            return Err(HostError::InvalidCredentials(format!(
                "{} expects {} credentials, got {}",
                server_id,
                entry.credential_requirements().auth_type.as_str(),
                provided.as_str()
            )));
        }

        self.credentials.store(user_id, server_id, input).await?;
        self.events.emit(DomainEvent::CredentialsStored {
            user_id: user_id.to_string(),
            server_id: server_id.to_string(),
        });
        Ok(())
    }

    /// Never fails. Servers that need no credentials always have valid ones.
    pub async fn has_valid_credentials(&self, server_id: &str, user_id: &str) -> bool {
        match self.registry.get(server_id) {
            Some(entry) if !entry.requires_credentials() => true,
            Some(_) => self.credentials.has_valid(user_id, server_id).await,
            None => false,
        }
    }

    pub fn get_credential_requirements(&self, server_id: &str) -> HostResult<CredentialRequirements> {
        Ok(self.entry(server_id)?.credential_requirements())
    }

    pub async fn delete_credentials(&self, server_id: &str, user_id: &str) -> HostResult<bool> {
        let deleted = self.credentials.delete(user_id, server_id).await?;
        if deleted {
            self.events.emit(DomainEvent::CredentialsDeleted {
                user_id: user_id.to_string(),
                server_id: server_id.to_string(),
            });
        }
        Ok(deleted)
    }

    pub async fn get_auth_status(&self, server_id: &str, user_id: &str) -> HostResult<AuthStatus> {
        self.entry(server_id)?;
        self.credentials.auth_status(user_id, server_id).await
    }
}

/// Ping, then list everything strictly; any failure marks the server unhealthy
async fn probe(client: &dyn CapabilityClient) -> HostResult<CapabilityCounts> {
    client.ping().await?;
    let (tools, resources, prompts) = tokio::try_join!(
        client.list_tools(),
        client.list_resources(),
        client.list_prompts()
    )?;
    Ok(CapabilityCounts {
        tools: tools.len(),
        resources: resources.len(),
        prompts: prompts.len(),
    })
}

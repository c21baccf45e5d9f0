//! Mock implementations for testing
//!
//! In-memory repositories plus a scriptable capability client and client
//! factory, so the server manager can be driven without real servers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use mcphost_core::{
    repository::{CredentialRepository, OAuthTokenRepository, RepoResult, SessionRepository},
    AuthCredentials, CredentialRecord, CredentialSummary, HostError, HostResult,
    PromptDescriptor, ResourceDescriptor, SessionRecord, TokenRecord, ToolDescriptor,
};
use mcphost_runtime::{CapabilityClient, ClientFactory, ConnectRequest, ServerConfig};
use serde_json::{json, Map, Value};

type Key = (String, String);

fn key(user_id: &str, server_id: &str) -> Key {
    (user_id.to_string(), server_id.to_string())
}

// ============================================================================
// MockCredentialRepository
// ============================================================================

#[derive(Default)]
pub struct MockCredentialRepository {
    records: RwLock<HashMap<Key, CredentialRecord>>,
    fail_reads: AtomicBool,
}

impl MockCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get` fail, as a corrupted row would
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialRepository for MockCredentialRepository {
    async fn get(&self, user_id: &str, server_id: &str) -> RepoResult<Option<CredentialRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("Decryption failed - wrong key or corrupted data");
        }
        Ok(self
            .records
            .read()
            .unwrap()
            .get(&key(user_id, server_id))
            .cloned())
    }

    async fn save(&self, record: &CredentialRecord) -> RepoResult<()> {
        self.records
            .write()
            .unwrap()
            .insert(key(&record.user_id, &record.server_id), record.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str, server_id: &str) -> RepoResult<bool> {
        Ok(self
            .records
            .write()
            .unwrap()
            .remove(&key(user_id, server_id))
            .is_some())
    }

    async fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<CredentialSummary>> {
        let mut summaries: Vec<CredentialSummary> = self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| CredentialSummary {
                server_id: r.server_id.clone(),
                auth_type: r.auth_type(),
                created_at: r.created_at,
                expires_at: r.expires_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        Ok(summaries)
    }
}

// ============================================================================
// MockOAuthTokenRepository
// ============================================================================

#[derive(Default)]
pub struct MockOAuthTokenRepository {
    records: RwLock<HashMap<Key, TokenRecord>>,
}

impl MockOAuthTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuthTokenRepository for MockOAuthTokenRepository {
    async fn get(&self, user_id: &str, server_id: &str) -> RepoResult<Option<TokenRecord>> {
        Ok(self
            .records
            .read()
            .unwrap()
            .get(&key(user_id, server_id))
            .cloned())
    }

    async fn save(&self, record: &TokenRecord) -> RepoResult<()> {
        self.records
            .write()
            .unwrap()
            .insert(key(&record.user_id, &record.server_id), record.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str, server_id: &str) -> RepoResult<bool> {
        Ok(self
            .records
            .write()
            .unwrap()
            .remove(&key(user_id, server_id))
            .is_some())
    }
}

// ============================================================================
// MockSessionRepository
// ============================================================================

#[derive(Default)]
pub struct MockSessionRepository {
    records: RwLock<HashMap<Key, SessionRecord>>,
}

impl MockSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, record: SessionRecord) -> Self {
        self.records
            .write()
            .unwrap()
            .insert(key(&record.user_id, &record.server_id), record);
        self
    }

    /// Raw stored record, bypassing the session manager's age check
    pub fn stored(&self, user_id: &str, server_id: &str) -> Option<SessionRecord> {
        self.records
            .read()
            .unwrap()
            .get(&key(user_id, server_id))
            .cloned()
    }
}

#[async_trait]
impl SessionRepository for MockSessionRepository {
    async fn get(&self, user_id: &str, server_id: &str) -> RepoResult<Option<SessionRecord>> {
        Ok(self.stored(user_id, server_id))
    }

    async fn save(&self, record: &SessionRecord) -> RepoResult<()> {
        self.records
            .write()
            .unwrap()
            .insert(key(&record.user_id, &record.server_id), record.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str, server_id: &str) -> RepoResult<bool> {
        Ok(self
            .records
            .write()
            .unwrap()
            .remove(&key(user_id, server_id))
            .is_some())
    }

    async fn touch(&self, user_id: &str, server_id: &str, at: DateTime<Utc>) -> RepoResult<bool> {
        match self.records.write().unwrap().get_mut(&key(user_id, server_id)) {
            Some(record) => {
                record.last_used_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> RepoResult<usize> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|_, r| r.last_used_at >= cutoff);
        Ok(before - records.len())
    }
}

// ============================================================================
// MockCapabilityClient
// ============================================================================

/// Capability client with scripted listings and per-kind failures
#[derive(Default)]
pub struct MockCapabilityClient {
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
    prompts: Vec<PromptDescriptor>,
    tool_results: HashMap<String, Value>,
    fail_tools: bool,
    fail_resources: bool,
    fail_prompts: bool,
    fail_ping: bool,
    fail_close: bool,
    tool_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MockCapabilityClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, name: &str) -> Self {
        self.tools.push(ToolDescriptor {
            name: name.to_string(),
            description: Some(format!("Test tool: {name}")),
            input_schema: json!({"type": "object"}),
        });
        self
    }

    pub fn with_resource(mut self, uri: &str) -> Self {
        self.resources.push(ResourceDescriptor {
            uri: uri.to_string(),
            name: uri.to_string(),
            description: None,
            mime_type: Some("text/plain".to_string()),
        });
        self
    }

    pub fn with_prompt(mut self, name: &str) -> Self {
        self.prompts.push(PromptDescriptor {
            name: name.to_string(),
            description: None,
            arguments: Vec::new(),
        });
        self
    }

    /// Result returned by `tools/call` for `name`; unknown tools fail
    pub fn with_tool_result(mut self, name: &str, result: Value) -> Self {
        self.tool_results.insert(name.to_string(), result);
        self
    }

    pub fn failing_tools(mut self) -> Self {
        self.fail_tools = true;
        self
    }

    pub fn failing_resources(mut self) -> Self {
        self.fail_resources = true;
        self
    }

    pub fn failing_prompts(mut self) -> Self {
        self.fail_prompts = true;
        self
    }

    pub fn failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn tool_calls(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn method_failure(method: &str) -> HostError {
        HostError::Protocol {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }
}

#[async_trait]
impl CapabilityClient for MockCapabilityClient {
    async fn list_tools(&self) -> HostResult<Vec<ToolDescriptor>> {
        if self.fail_tools {
            return Err(Self::method_failure("tools/list"));
        }
        Ok(self.tools.clone())
    }

    async fn list_resources(&self) -> HostResult<Vec<ResourceDescriptor>> {
        if self.fail_resources {
            return Err(Self::method_failure("resources/list"));
        }
        Ok(self.resources.clone())
    }

    async fn list_prompts(&self) -> HostResult<Vec<PromptDescriptor>> {
        if self.fail_prompts {
            return Err(Self::method_failure("prompts/list"));
        }
        Ok(self.prompts.clone())
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> HostResult<Value> {
        self.tool_calls.fetch_add(1, Ordering::SeqCst);
        self.tool_results
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::Protocol {
                code: -32602,
                message: format!("Unknown tool: {name}"),
                data: None,
            })
    }

    async fn read_resource(&self, uri: &str) -> HostResult<Value> {
        if self.resources.iter().any(|r| r.uri == uri) {
            Ok(json!({"contents": [{"uri": uri, "text": "hello"}]}))
        } else {
            Err(HostError::Protocol {
                code: -32002,
                message: format!("Resource not found: {uri}"),
                data: None,
            })
        }
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> HostResult<Value> {
        Ok(json!({
            "description": name,
            "messages": [{"role": "user", "content": {"type": "text", "text": format!("{:?}", arguments)}}]
        }))
    }

    async fn ping(&self) -> HostResult<()> {
        if self.fail_ping {
            return Err(HostError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> HostResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(HostError::Transport("close failed".to_string()));
        }
        Ok(())
    }

    fn description(&self) -> String {
        "mock".to_string()
    }
}

// ============================================================================
// MockClientFactory
// ============================================================================

/// Hands out pre-registered clients per server id
#[derive(Default)]
pub struct MockClientFactory {
    clients: parking_lot::Mutex<HashMap<String, Arc<MockCapabilityClient>>>,
    failures: parking_lot::Mutex<HashMap<String, String>>,
    connects: AtomicUsize,
    delay: parking_lot::Mutex<Duration>,
    last_credentials: parking_lot::Mutex<Option<AuthCredentials>>,
    last_config: parking_lot::Mutex<Option<ServerConfig>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, server_id: &str, client: MockCapabilityClient) -> Arc<MockCapabilityClient> {
        let client = Arc::new(client);
        self.clients
            .lock()
            .insert(server_id.to_string(), client.clone());
        client
    }

    /// Make `connect` fail for a server with a transport error
    pub fn fail(&self, server_id: &str, message: &str) {
        self.failures
            .lock()
            .insert(server_id.to_string(), message.to_string());
    }

    /// Undo `fail` for a server
    pub fn recover(&self, server_id: &str) {
        self.failures.lock().remove(server_id);
    }

    /// Delay every connect, to widen race windows
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_credentials(&self) -> Option<AuthCredentials> {
        self.last_credentials.lock().clone()
    }

    pub fn last_config(&self) -> Option<ServerConfig> {
        self.last_config.lock().clone()
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn connect(&self, request: ConnectRequest) -> HostResult<Arc<dyn CapabilityClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_credentials.lock() = request.credentials.clone();
        *self.last_config.lock() = Some(request.config.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let server_id = &request.key.server_id;
        if let Some(message) = self.failures.lock().get(server_id).cloned() {
            return Err(HostError::Transport(message));
        }

        let client: Arc<dyn CapabilityClient> = match self.clients.lock().get(server_id) {
            Some(client) => client.clone(),
            None => Arc::new(MockCapabilityClient::new()),
        };
        Ok(client)
    }
}

// ============================================================================
// Test Helper: Create all mock repos as Arc
// ============================================================================

/// Collection of all mock repositories for test setup
pub struct MockRepositories {
    pub credentials: Arc<MockCredentialRepository>,
    pub tokens: Arc<MockOAuthTokenRepository>,
    pub sessions: Arc<MockSessionRepository>,
}

impl MockRepositories {
    /// Create a fresh set of empty mock repositories
    pub fn new() -> Self {
        Self {
            credentials: Arc::new(MockCredentialRepository::new()),
            tokens: Arc::new(MockOAuthTokenRepository::new()),
            sessions: Arc::new(MockSessionRepository::new()),
        }
    }
}

impl Default for MockRepositories {
    fn default() -> Self {
        Self::new()
    }
}

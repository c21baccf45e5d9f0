//! Remote protocol client tests against a mock HTTP server


use std::sync::Arc;
use std::time::Duration;

use mcphost_core::{
    AuthCredentials, AuthType, EventBus, EventReceiver, ProtocolConfig, ServerKey,
    SessionManager,
};
use mcphost_runtime::protocol::SESSION_HEADER;
use mcphost_runtime::{ClientContext, RemoteClient, RemoteTarget};
use serde_json::{json, Value};
use tests::fixtures::USER;
use tests::mocks::MockSessionRepository;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const ENDPOINT: &str = "/mcp";

/// A mock server plus everything a RemoteClient needs around it
pub struct ProtocolHarness {
    pub server: MockServer,
    pub repo: Arc<MockSessionRepository>,
    pub sessions: Arc<SessionManager>,
    pub events: EventReceiver,
    bus: EventBus,
}

impl ProtocolHarness {
    pub async fn start() -> Self {
        Self::with_repo(MockSessionRepository::new()).await
    }

    pub async fn with_repo(repo: MockSessionRepository) -> Self {
        let repo = Arc::new(repo);
        let sessions = Arc::new(SessionManager::new(
            repo.clone(),
            Duration::from_secs(24 * 60 * 60),
        ));
        let bus = EventBus::new();
        let events = bus.subscribe();

        Self {
            server: MockServer::start().await,
            repo,
            sessions,
            events,
            bus,
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), ENDPOINT)
    }

    pub fn client(
        &self,
        server_id: &str,
        auth_type: AuthType,
        credentials: Option<AuthCredentials>,
    ) -> RemoteClient {
        self.client_settling(server_id, auth_type, credentials, Duration::ZERO)
    }

    pub fn client_settling(
        &self,
        server_id: &str,
        auth_type: AuthType,
        credentials: Option<AuthCredentials>,
        settle: Duration,
    ) -> RemoteClient {
        let ctx = ClientContext {
            http: reqwest::Client::new(),
            protocol: ProtocolConfig {
                settle_duration: settle,
                verify_timeout: Duration::from_secs(2),
                request_timeout: Duration::from_secs(5),
                ..ProtocolConfig::default()
            },
            sessions: self.sessions.clone(),
            events: self.bus.sender(),
        };

        RemoteClient::new(
            RemoteTarget {
                key: ServerKey::new(USER, server_id),
                url: self.url(),
                auth_type,
                credentials,
            },
            ctx,
        )
    }

    /// Client without credentials, as for an open server
    pub fn open_client(&self, server_id: &str) -> RemoteClient {
        self.client(server_id, AuthType::None, None)
    }
}

// ============================================================================
// Response helpers
// ============================================================================

pub fn rpc_method(name: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_partial_json(json!({ "method": name })))
}

pub fn envelope(result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": "1", "result": result })
}

pub fn json_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(envelope(result))
}

pub fn sse_result(result: Value) -> ResponseTemplate {
    let frame = format!("event: message\ndata: {}\n\n", envelope(result));
    ResponseTemplate::new(200).set_body_raw(frame, "text/event-stream")
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2025-03-26",
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": "mock", "version": "1.0.0" }
    })
}

/// `initialize` (optionally assigning a session) and the `initialized` notification
pub async fn mount_handshake(server: &MockServer, session_id: Option<&str>) {
    let mut response = json_result(initialize_result());
    if let Some(id) = session_id {
        response = response.insert_header(SESSION_HEADER, id);
    }
    rpc_method("initialize").respond_with(response).mount(server).await;

    rpc_method("notifications/initialized")
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

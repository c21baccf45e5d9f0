//! Remote protocol client
//!
//! One instance per (user, server) connection. Every call is an HTTP POST of
//! a JSON-RPC message to the server's single endpoint; the response is either
//! a JSON body or a single SSE `message` frame.
//!
//! State machine:
//!
//! ```text
//! Disconnected -> Verifying -> Connected                  (stored session accepted)
//! Disconnected -> Verifying -> Invalidated -> Handshaking -> Connected
//! Disconnected -> Handshaking -> Connected                (no stored session)
//! Connected -> Invalidated -> Handshaking -> Connected    (session expired mid-life)
//! ```
//!
//! The server-assigned session id is captured from any response carrying
//! the session header (including error responses) and persisted at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcphost_core::{
    short_session_id, AuthCredentials, AuthRequiredReason, AuthType, DomainEvent, EventSender,
    HostError, HostResult, PromptDescriptor, ProtocolConfig, ResourceDescriptor, ServerKey,
    SessionManager, SessionRecord, ToolDescriptor,
};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::auth::auth_headers;
use super::jsonrpc::{
    extract_result, find_error, JsonRpcNotification, JsonRpcRequest, RequestIdGenerator,
    METHOD_NOT_FOUND,
};
use super::sse;
use crate::client::CapabilityClient;

/// Session header assigned by streamable HTTP servers
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Upper bound on `nextCursor` pages followed by list calls
const MAX_PAGES: usize = 100;

/// Longest body excerpt carried into a transport error
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    Disconnected,
    /// Re-sending `initialize` to check a stored session
    Verifying,
    Handshaking,
    Connected,
    /// Stored session rejected; a fresh handshake follows
    Invalidated,
}

/// Shared dependencies for every remote client
#[derive(Clone)]
pub struct ClientContext {
    pub http: reqwest::Client,
    pub protocol: ProtocolConfig,
    pub sessions: Arc<SessionManager>,
    pub events: EventSender,
}

/// Where to connect and with which credentials
#[derive(Clone)]
pub struct RemoteTarget {
    pub key: ServerKey,
    pub url: String,
    pub auth_type: AuthType,
    pub credentials: Option<AuthCredentials>,
}

struct ConnectionState {
    state: ClientState,
    session_id: Option<String>,
    /// `capabilities` object from the last `initialize` result
    server_capabilities: Value,
}

pub struct RemoteClient {
    target: RemoteTarget,
    ctx: ClientContext,
    ids: RequestIdGenerator,
    inner: Mutex<ConnectionState>,
}

impl RemoteClient {
    pub fn new(target: RemoteTarget, ctx: ClientContext) -> Self {
        Self {
            ids: RequestIdGenerator::new(&target.key.server_id),
            target,
            ctx,
            inner: Mutex::new(ConnectionState {
                state: ClientState::Disconnected,
                session_id: None,
                server_capabilities: json!({}),
            }),
        }
    }

    pub fn key(&self) -> &ServerKey {
        &self.target.key
    }

    pub fn state(&self) -> ClientState {
        self.inner.lock().state
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().session_id.clone()
    }

    pub fn server_capabilities(&self) -> Value {
        self.inner.lock().server_capabilities.clone()
    }

    fn set_state(&self, state: ClientState) {
        self.inner.lock().state = state;
    }

    /// Restore a stored session if the server still accepts it, otherwise
    /// perform a full handshake.
    pub async fn connect(&self) -> HostResult<()> {
        if self.try_restore().await {
            return Ok(());
        }
        self.perform_handshake().await
    }

    /// Verify a stored session with a lightweight `initialize`.
    ///
    /// Returns `true` when the session was accepted. No `initialized`
    /// notification is sent and there is no settle delay on this path.
    async fn try_restore(&self) -> bool {
        let key = &self.target.key;
        let record = match self
            .ctx
            .sessions
            .get_session(&key.user_id, &key.server_id)
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                warn!(
                    server_id = %key.server_id,
                    error = %e,
                    "[RemoteClient] Could not load stored session"
                );
                return false;
            }
        };

        {
            let mut inner = self.inner.lock();
            inner.state = ClientState::Verifying;
            inner.session_id = Some(record.session_id.clone());
            inner.server_capabilities = record.capabilities.clone();
        }
        info!(
            server_id = %key.server_id,
            user_id = %key.user_id,
            session_id = short_session_id(&record.session_id),
            "[RemoteClient] Verifying stored session"
        );

        let verify_timeout = self.ctx.protocol.verify_timeout;
        let verified = match tokio::time::timeout(
            verify_timeout,
            self.send_request("initialize", self.initialize_params(), verify_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(HostError::Transport(format!(
                "verification timed out after {}s",
                verify_timeout.as_secs()
            ))),
        };

        match verified {
            Ok(result) => {
                {
                    let mut inner = self.inner.lock();
                    if let Some(caps) = result.get("capabilities") {
                        inner.server_capabilities = caps.clone();
                    }
                    inner.state = ClientState::Connected;
                }
                self.touch_session().await;
                info!(
                    server_id = %key.server_id,
                    session_id = short_session_id(&record.session_id),
                    "[RemoteClient] Session restored"
                );
                self.ctx.events.emit(DomainEvent::SessionRestored {
                    user_id: key.user_id.clone(),
                    server_id: key.server_id.clone(),
                });
                true
            }
            Err(e) => {
                self.drop_session(&record.session_id, &e).await;
                false
            }
        }
    }

    /// Mark the connection invalidated after the server rejected `stale`.
    ///
    /// A different id captured from the rejecting response is kept (and is
    /// already persisted) so the following handshake carries it.
    async fn drop_session(&self, stale: &str, cause: &HostError) {
        let key = &self.target.key;
        let invalid = match cause {
            HostError::SessionInvalid(reason) => HostError::SessionInvalid(reason.clone()),
            other => HostError::SessionInvalid(other.to_string()),
        };
        let replaced = {
            let mut inner = self.inner.lock();
            inner.state = ClientState::Invalidated;
            match inner.session_id.as_deref() {
                Some(current) if current != stale => true,
                _ => {
                    inner.session_id = None;
                    false
                }
            }
        };
        warn!(
            server_id = %key.server_id,
            session_id = short_session_id(stale),
            replaced,
            error = %invalid,
            "[RemoteClient] Session rejected, re-handshaking"
        );
        if !replaced {
            self.forget_stored_session().await;
        }
        self.ctx.events.emit(DomainEvent::SessionInvalidated {
            user_id: key.user_id.clone(),
            server_id: key.server_id.clone(),
            reason: invalid.to_string(),
        });
    }

    async fn forget_stored_session(&self) {
        let key = &self.target.key;
        if let Err(e) = self
            .ctx
            .sessions
            .invalidate_session(&key.user_id, &key.server_id)
            .await
        {
            warn!(server_id = %key.server_id, error = %e, "[RemoteClient] Failed to invalidate session");
        }
    }

    /// `initialize`, persist the session, best-effort `initialized`, settle.
    pub async fn perform_handshake(&self) -> HostResult<()> {
        let key = &self.target.key;
        self.set_state(ClientState::Handshaking);
        info!(
            server_id = %key.server_id,
            url = %self.target.url,
            "[RemoteClient] Performing handshake"
        );

        let timeout = self.ctx.protocol.request_timeout;
        let attempt = match self
            .send_request("initialize", self.initialize_params(), timeout)
            .await
        {
            Err(HostError::SessionInvalid(reason)) => {
                // The carried session was unknown to the server; start clean
                debug!(server_id = %key.server_id, reason = %reason, "[RemoteClient] Retrying initialize without session");
                self.inner.lock().session_id = None;
                self.forget_stored_session().await;
                self.send_request("initialize", self.initialize_params(), timeout)
                    .await
            }
            other => other,
        };
        let result = match attempt {
            Ok(result) => result,
            Err(e) => {
                self.set_state(ClientState::Disconnected);
                return Err(e);
            }
        };

        let session_id = {
            let mut inner = self.inner.lock();
            inner.server_capabilities = result
                .get("capabilities")
                .cloned()
                .unwrap_or_else(|| json!({}));
            inner.session_id.clone()
        };
        if session_id.is_some() {
            self.persist_session().await;
        }

        // Some servers do not require this notification
        let initialized = JsonRpcNotification::new("notifications/initialized");
        if let Err(e) = self
            .post(&initialized, timeout, "notifications/initialized")
            .await
        {
            warn!(
                server_id = %key.server_id,
                error = %e,
                "[RemoteClient] initialized notification failed, continuing"
            );
        }

        let settle = self.ctx.protocol.settle_duration;
        if !settle.is_zero() {
            debug!(
                server_id = %key.server_id,
                ?settle,
                "[RemoteClient] Waiting for server to settle"
            );
            tokio::time::sleep(settle).await;
        }

        self.set_state(ClientState::Connected);
        info!(
            server_id = %key.server_id,
            session_id = session_id.as_deref().map(short_session_id).unwrap_or("none"),
            "[RemoteClient] Handshake completed"
        );
        self.ctx.events.emit(DomainEvent::HandshakeCompleted {
            user_id: key.user_id.clone(),
            server_id: key.server_id.clone(),
            session_id,
        });
        Ok(())
    }

    fn initialize_params(&self) -> Value {
        let protocol = &self.ctx.protocol;
        json!({
            "protocolVersion": protocol.protocol_version,
            "capabilities": {},
            "clientInfo": {
                "name": protocol.client_name,
                "version": protocol.client_version,
            }
        })
    }

    fn ensure_connected(&self) -> HostResult<()> {
        if self.state() == ClientState::Connected {
            Ok(())
        } else {
            Err(HostError::ServerNotConnected(self.target.key.to_string()))
        }
    }

    /// A request on an established connection
    ///
    /// A session the server has expired is dropped, the handshake is
    /// repeated, and the request is retried once.
    async fn request(&self, method: &str, params: Value) -> HostResult<Value> {
        self.ensure_connected()?;
        let timeout = self.ctx.protocol.request_timeout;
        let sent_session = self.session_id();

        let result = match self.send_request(method, params.clone(), timeout).await {
            Err(e) if sent_session.is_some() && is_session_expired(&e) => {
                if let Some(stale) = sent_session.as_deref() {
                    self.drop_session(stale, &e).await;
                }
                self.perform_handshake().await?;
                self.send_request(method, params, timeout).await
            }
            other => other,
        };
        if result.is_ok() {
            self.touch_session().await;
        }
        result
    }

    async fn send_request(&self, method: &str, params: Value, timeout: Duration) -> HostResult<Value> {
        let request = JsonRpcRequest::new(self.ids.next_id(), method, params);
        debug!(
            server_id = %self.target.key.server_id,
            method = %method,
            request_id = %request.id,
            "[RemoteClient] Sending request"
        );

        match self.post(&request, timeout, method).await? {
            Some(payload) => extract_result(payload),
            None => Ok(Value::Null),
        }
    }

    /// POST one message and decode the reply.
    ///
    /// `None` means the server answered with an empty body (typical for
    /// notifications).
    async fn post<T: Serialize + ?Sized>(
        &self,
        body: &T,
        timeout: Duration,
        method: &str,
    ) -> HostResult<Option<Value>> {
        let mut request = self
            .ctx
            .http
            .post(&self.target.url)
            .timeout(timeout)
            .header(ACCEPT, ACCEPT_VALUE)
            .json(body);

        if let Some(credentials) = &self.target.credentials {
            for (name, value) in auth_headers(credentials) {
                request = request.header(name, value.as_str());
            }
        }
        let sent_session = match self.session_id() {
            Some(session_id) => {
                request = request.header(SESSION_HEADER, session_id);
                true
            }
            None => false,
        };

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if let Some(session_id) = session_header(response.headers()) {
            self.capture_session(session_id).await;
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| HostError::Transport(format!("failed to read response body: {e}")))?;
        let payload = decode_body(content_type.as_deref(), &text);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(
                server_id = %self.target.key.server_id,
                method = %method,
                status = status.as_u16(),
                "[RemoteClient] Server rejected credentials"
            );
            return Err(HostError::auth_required(
                &self.target.key.server_id,
                AuthRequiredReason::Expired,
            ));
        }

        if status == StatusCode::NOT_FOUND && sent_session {
            let detail = payload
                .as_ref()
                .and_then(find_error)
                .map(|e| e.to_string())
                .unwrap_or_else(|| excerpt(&text));
            return Err(HostError::SessionInvalid(format!("HTTP 404 for {method}: {detail}")));
        }

        if !status.is_success() {
            if let Some(err) = payload.as_ref().and_then(find_error) {
                return Err(err);
            }
            return Err(HostError::Transport(format!(
                "HTTP {} for {}: {}",
                status.as_u16(),
                method,
                excerpt(&text)
            )));
        }

        if payload.is_none() && !text.trim().is_empty() {
            return Err(HostError::Transport(format!(
                "unreadable response for {method}: {}",
                excerpt(&text)
            )));
        }
        Ok(payload)
    }

    async fn capture_session(&self, session_id: String) {
        let changed = {
            let mut inner = self.inner.lock();
            if inner.session_id.as_deref() == Some(session_id.as_str()) {
                false
            } else {
                inner.session_id = Some(session_id.clone());
                true
            }
        };
        if changed {
            debug!(
                server_id = %self.target.key.server_id,
                session_id = short_session_id(&session_id),
                "[RemoteClient] Captured session id"
            );
            self.persist_session().await;
        }
    }

    async fn persist_session(&self) {
        let key = &self.target.key;
        let record = {
            let inner = self.inner.lock();
            let Some(session_id) = inner.session_id.as_deref() else {
                return;
            };
            SessionRecord::new(
                key.user_id.as_str(),
                key.server_id.as_str(),
                session_id,
                self.target.url.as_str(),
                self.target.auth_type,
                inner.server_capabilities.clone(),
            )
        };
        if let Err(e) = self.ctx.sessions.store_session(&record).await {
            warn!(
                server_id = %key.server_id,
                error = %e,
                "[RemoteClient] Failed to persist session"
            );
        }
    }

    async fn touch_session(&self) {
        if self.inner.lock().session_id.is_none() {
            return;
        }
        let key = &self.target.key;
        if let Err(e) = self
            .ctx
            .sessions
            .update_last_used(&key.user_id, &key.server_id)
            .await
        {
            debug!(server_id = %key.server_id, error = %e, "[RemoteClient] last-used update failed");
        }
    }

    async fn list_paginated<T: DeserializeOwned>(&self, method: &str, field: &str) -> HostResult<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.request(method, params).await?;

            for item in result.get(field).and_then(Value::as_array).into_iter().flatten() {
                match serde_json::from_value::<T>(item.clone()) {
                    Ok(parsed) => items.push(parsed),
                    Err(e) => warn!(
                        server_id = %self.target.key.server_id,
                        method = %method,
                        error = %e,
                        "[RemoteClient] Skipping malformed entry"
                    ),
                }
            }

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl CapabilityClient for RemoteClient {
    async fn list_tools(&self) -> HostResult<Vec<ToolDescriptor>> {
        self.list_paginated("tools/list", "tools").await
    }

    async fn list_resources(&self) -> HostResult<Vec<ResourceDescriptor>> {
        self.list_paginated("resources/list", "resources").await
    }

    async fn list_prompts(&self) -> HostResult<Vec<PromptDescriptor>> {
        self.list_paginated("prompts/list", "prompts").await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> HostResult<Value> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        self.request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }

    async fn read_resource(&self, uri: &str) -> HostResult<Value> {
        self.request("resources/read", json!({ "uri": uri })).await
    }

    async fn get_prompt(&self, name: &str, arguments: Option<Map<String, Value>>) -> HostResult<Value> {
        self.request(
            "prompts/get",
            json!({ "name": name, "arguments": arguments.unwrap_or_default() }),
        )
        .await
    }

    async fn ping(&self) -> HostResult<()> {
        match self.request("ping", json!({})).await {
            Ok(_) => Ok(()),
            Err(HostError::Protocol { code, .. }) if code == METHOD_NOT_FOUND => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn close(&self) -> HostResult<()> {
        let was_connected = {
            let mut inner = self.inner.lock();
            let was = inner.state != ClientState::Disconnected;
            inner.state = ClientState::Disconnected;
            was
        };
        if was_connected {
            let key = &self.target.key;
            info!(server_id = %key.server_id, "[RemoteClient] Disconnected");
            self.ctx.events.emit(DomainEvent::ClientDisconnected {
                user_id: key.user_id.clone(),
                server_id: key.server_id.clone(),
            });
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("remote:{}", self.target.url)
    }
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| name.as_str().eq_ignore_ascii_case(SESSION_HEADER))
        .and_then(|(_, value)| value.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// JSON body, SSE body, or SSE framing sent without the right content type
fn decode_body(content_type: Option<&str>, text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    if sse::is_event_stream(content_type) {
        return sse::response_payload(text);
    }
    serde_json::from_str(text).ok().or_else(|| {
        let start = text.trim_start();
        if start.starts_with("event:") || start.starts_with("data:") {
            sse::response_payload(text)
        } else {
            None
        }
    })
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> HostError {
    if err.is_timeout() {
        HostError::Transport(format!("request timed out after {}s", timeout.as_secs()))
    } else if err.is_connect() {
        HostError::Transport(format!("connection failed: {err}"))
    } else {
        HostError::Transport(err.to_string())
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// The server no longer knows the session the request carried
fn is_session_expired(err: &HostError) -> bool {
    match err {
        HostError::SessionInvalid(_) => true,
        HostError::Protocol { message, .. } => {
            let message = message.to_ascii_lowercase();
            message.contains("session")
                && (message.contains("not found")
                    || message.contains("expired")
                    || message.contains("invalid"))
        }
        _ => false,
    }
}

//! JSON-RPC 2.0 framing
//!
//! Requests carry ids of the form `<prefix>_<counter>_<unix-millis>`, unique
//! per client and monotonically increasing.

use std::sync::atomic::{AtomicU64, Ordering};

use mcphost_core::HostError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Internal error code used when a server sends an error object without one
const INTERNAL_ERROR: i64 = -32603;

/// Returned by servers that do not implement a method (e.g. `ping`)
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: String, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// A request without an id; the server sends no response body
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<JsonRpcError> for HostError {
    fn from(err: JsonRpcError) -> Self {
        HostError::Protocol {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

pub struct RequestIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new(server_id: &str) -> Self {
        let prefix: String = server_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        Self {
            prefix: if prefix.is_empty() { "req".into() } else { prefix },
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "{}_{}_{}",
            self.prefix,
            n,
            chrono::Utc::now().timestamp_millis()
        )
    }
}

/// Error object carried by a decoded payload, if any.
///
/// Batched (array) payloads are searched element by element.
pub fn find_error(payload: &Value) -> Option<HostError> {
    match payload {
        Value::Array(items) => items.iter().find_map(find_error),
        Value::Object(obj) => obj.get("error").filter(|e| !e.is_null()).map(to_protocol_error),
        _ => None,
    }
}

/// Unwrap `.result` from a response payload.
///
/// An `error` member becomes [`HostError::Protocol`]. A missing `result` is
/// returned as `Value::Null`; callers that expect a list treat it as empty.
pub fn extract_result(payload: Value) -> Result<Value, HostError> {
    if let Some(err) = find_error(&payload) {
        return Err(err);
    }

    match payload {
        Value::Array(items) => Ok(items
            .into_iter()
            .find_map(|mut item| item.get_mut("result").map(Value::take))
            .unwrap_or(Value::Null)),
        Value::Object(mut obj) => Ok(obj.remove("result").unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn to_protocol_error(err: &Value) -> HostError {
    match serde_json::from_value::<JsonRpcError>(err.clone()) {
        Ok(parsed) => parsed.into(),
        Err(_) => HostError::Protocol {
            code: err.get("code").and_then(Value::as_i64).unwrap_or(INTERNAL_ERROR),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
            data: err.get("data").cloned(),
        },
    }
}

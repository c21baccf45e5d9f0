//! [`CapabilityClient`] over an rmcp child-process service

use async_trait::async_trait;
use mcphost_core::{
    HostError, HostResult, PromptDescriptor, ResourceDescriptor, ServerKey, ToolDescriptor,
};
use rmcp::model::{CallToolRequestParams, GetPromptRequestParams, ReadResourceRequestParams};
use rmcp::service::{Peer, RunningService};
use rmcp::RoleClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::HostClientHandler;
use crate::client::CapabilityClient;

pub type LocalService = RunningService<RoleClient, HostClientHandler>;

pub struct LocalProcessClient {
    key: ServerKey,
    image: String,
    peer: Peer<RoleClient>,
    /// Taken on close; dropping the service kills the child process
    service: Mutex<Option<LocalService>>,
}

impl LocalProcessClient {
    pub fn new(key: ServerKey, image: impl Into<String>, service: LocalService) -> Self {
        Self {
            key,
            image: image.into(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        }
    }
}

#[async_trait]
impl CapabilityClient for LocalProcessClient {
    async fn list_tools(&self) -> HostResult<Vec<ToolDescriptor>> {
        let tools = self.peer.list_all_tools().await.map_err(service_error)?;
        convert_all(&tools, "tool")
    }

    async fn list_resources(&self) -> HostResult<Vec<ResourceDescriptor>> {
        let resources = self
            .peer
            .list_all_resources()
            .await
            .map_err(service_error)?;
        convert_all(&resources, "resource")
    }

    async fn list_prompts(&self) -> HostResult<Vec<PromptDescriptor>> {
        let prompts = self.peer.list_all_prompts().await.map_err(service_error)?;
        convert_all(&prompts, "prompt")
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> HostResult<Value> {
        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
            meta: None,
        };
        let result = self.peer.call_tool(params).await.map_err(service_error)?;
        to_json(&result)
    }

    async fn read_resource(&self, uri: &str) -> HostResult<Value> {
        let params = ReadResourceRequestParams {
            uri: uri.into(),
            meta: None,
        };
        let result = self.peer.read_resource(params).await.map_err(service_error)?;
        to_json(&result)
    }

    async fn get_prompt(&self, name: &str, arguments: Option<Map<String, Value>>) -> HostResult<Value> {
        let params = GetPromptRequestParams {
            name: name.into(),
            arguments,
            meta: None,
        };
        let result = self.peer.get_prompt(params).await.map_err(service_error)?;
        to_json(&result)
    }

    async fn ping(&self) -> HostResult<()> {
        if self.service.lock().await.is_none() {
            return Err(HostError::ServerNotConnected(self.key.to_string()));
        }
        self.peer.list_all_tools().await.map_err(service_error)?;
        Ok(())
    }

    async fn close(&self) -> HostResult<()> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        match service.cancel().await {
            Ok(reason) => {
                info!(server_id = %self.key.server_id, reason = ?reason, "[LocalProcessClient] Process stopped");
            }
            Err(e) => {
                warn!(server_id = %self.key.server_id, error = %e, "[LocalProcessClient] Process did not stop cleanly");
            }
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("container:{}", self.image)
    }
}

fn service_error(err: rmcp::ServiceError) -> HostError {
    match err {
        rmcp::ServiceError::McpError(data) => HostError::Protocol {
            code: i64::from(data.code.0),
            message: data.message.to_string(),
            data: data.data,
        },
        other => HostError::Transport(other.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> HostResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| HostError::Transport(format!("unserializable server response: {e}")))
}

/// rmcp model -> domain descriptor, dropping entries that do not fit
fn convert_all<S: Serialize, T: DeserializeOwned>(items: &[S], what: &str) -> HostResult<Vec<T>> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let mut value = to_json(item)?;
        // Optional fields may serialize as null
        if let Value::Object(obj) = &mut value {
            obj.retain(|_, v| !v.is_null());
        }
        match serde_json::from_value(value) {
            Ok(parsed) => out.push(parsed),
            Err(e) => warn!(error = %e, "[LocalProcessClient] Skipping malformed {}", what),
        }
    }
    Ok(out)
}

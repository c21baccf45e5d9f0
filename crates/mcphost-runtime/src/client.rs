//! Capability client abstraction
//!
//! Both the remote protocol client and the local-process client expose the
//! same operations, so the server manager never needs to know which kind of
//! server it is talking to.

use async_trait::async_trait;
use mcphost_core::{HostResult, PromptDescriptor, ResourceDescriptor, ToolDescriptor};
use serde_json::{Map, Value};

#[async_trait]
pub trait CapabilityClient: Send + Sync {
    /// `tools/list`; a missing result is an empty list
    async fn list_tools(&self) -> HostResult<Vec<ToolDescriptor>>;

    /// `resources/list`
    async fn list_resources(&self) -> HostResult<Vec<ResourceDescriptor>>;

    /// `prompts/list`
    async fn list_prompts(&self) -> HostResult<Vec<PromptDescriptor>>;

    /// `tools/call`, returning the raw result object (`content`, `isError`)
    async fn call_tool(&self, name: &str, arguments: Value) -> HostResult<Value>;

    /// `resources/read`
    async fn read_resource(&self, uri: &str) -> HostResult<Value>;

    /// `prompts/get`
    async fn get_prompt(&self, name: &str, arguments: Option<Map<String, Value>>)
        -> HostResult<Value>;

    /// Liveness probe used by health checks
    async fn ping(&self) -> HostResult<()>;

    /// Release the connection. Persisted session state is kept.
    async fn close(&self) -> HostResult<()>;

    /// Short human readable description for logs (`remote:<url>`, `container:<image>`)
    fn description(&self) -> String;
}

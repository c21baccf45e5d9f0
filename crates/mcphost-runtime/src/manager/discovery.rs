//! Capability discovery
//!
//! Tools, resources and prompts are listed concurrently. A failing kind
//! degrades to an empty list and never aborts the others.

use mcphost_core::{ServerCapabilities, ServerKey};
use tracing::{debug, info, warn};

use crate::client::CapabilityClient;

pub async fn discover(client: &dyn CapabilityClient, key: &ServerKey) -> ServerCapabilities {
    debug!(
        user_id = %key.user_id,
        server_id = %key.server_id,
        "[Discovery] Discovering capabilities"
    );

    let (tools, resources, prompts) = tokio::join!(
        client.list_tools(),
        client.list_resources(),
        client.list_prompts()
    );

    let mut capabilities = ServerCapabilities::default();

    match tools {
        Ok(tools) => capabilities.tools = tools,
        Err(e) => warn!(server_id = %key.server_id, error = %e, "[Discovery] Failed to list tools"),
    }
    match resources {
        Ok(resources) => capabilities.resources = resources,
        Err(e) => {
            warn!(server_id = %key.server_id, error = %e, "[Discovery] Failed to list resources")
        }
    }
    match prompts {
        Ok(prompts) => capabilities.prompts = prompts,
        Err(e) => {
            warn!(server_id = %key.server_id, error = %e, "[Discovery] Failed to list prompts")
        }
    }

    info!(
        server_id = %key.server_id,
        tools = capabilities.tools.len(),
        resources = capabilities.resources.len(),
        prompts = capabilities.prompts.len(),
        "[Discovery] Discovered capabilities"
    );
    capabilities
}

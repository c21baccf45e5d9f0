//! rmcp client handler for local servers

use mcphost_core::branding;
use rmcp::model::{ClientCapabilities, ClientInfo, Implementation, LoggingLevel};
use rmcp::service::NotificationContext;
use rmcp::RoleClient;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct HostClientHandler {
    info: ClientInfo,
    server_id: String,
}

impl std::fmt::Debug for HostClientHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostClientHandler")
            .field("server_id", &self.server_id)
            .finish()
    }
}

impl HostClientHandler {
    pub fn new(server_id: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: format!("{}-{}", branding::IDENTIFIER, server_id),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some(branding::DISPLAY_NAME.to_string()),
                    icons: None,
                    website_url: None,
                    ..Default::default()
                },
                meta: None,
            },
            server_id: server_id.to_string(),
        }
    }
}

impl rmcp::ClientHandler for HostClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn on_tool_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let server_id = self.server_id.clone();
        async move {
            info!(
                server_id = %server_id,
                "[HostClientHandler] Server reported tools/list_changed; refresh capabilities to pick it up"
            );
        }
    }

    /// Server-side log lines are re-emitted through tracing
    fn on_logging_message(
        &self,
        params: rmcp::model::LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let server_id = self.server_id.clone();
        async move {
            let message = match &params.data {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match params.level {
                LoggingLevel::Debug => debug!(server_id = %server_id, "[Server] {}", message),
                LoggingLevel::Info | LoggingLevel::Notice => {
                    info!(server_id = %server_id, "[Server] {}", message)
                }
                LoggingLevel::Warning => warn!(server_id = %server_id, "[Server] {}", message),
                LoggingLevel::Error
                | LoggingLevel::Critical
                | LoggingLevel::Alert
                | LoggingLevel::Emergency => error!(server_id = %server_id, "[Server] {}", message),
            }
        }
    }
}

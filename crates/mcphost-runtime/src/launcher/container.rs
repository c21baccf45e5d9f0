//! Container launcher
//!
//! Spawns `<runtime> run -i --rm -e NAME... <image> [args...]` and speaks the
//! protocol over the container's stdio. Environment values are handed to the
//! runtime process and forwarded by name, so secrets never appear on the
//! command line.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use mcphost_core::{HostError, HostResult, LauncherConfig};
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::ServiceExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{HostClientHandler, LaunchSpec, LocalProcessClient, ProcessLauncher};
use crate::client::CapabilityClient;

pub struct ContainerLauncher {
    config: LauncherConfig,
}

impl ContainerLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    /// Arguments passed to the container runtime binary
    pub fn command_args(spec: &LaunchSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-i".to_string(), "--rm".to_string()];
        for name in spec.env.keys() {
            args.push("-e".to_string());
            args.push(name.clone());
        }
        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());
        args
    }

    fn launch_error(&self, spec: &LaunchSpec, message: String) -> HostError {
        error!(server_id = %spec.key.server_id, image = %spec.image, "[ContainerLauncher] {}", message);
        HostError::Launch(message)
    }
}

#[async_trait]
impl ProcessLauncher for ContainerLauncher {
    async fn launch(&self, spec: LaunchSpec) -> HostResult<Arc<dyn CapabilityClient>> {
        let runtime = &self.config.container_runtime;
        info!(
            server_id = %spec.key.server_id,
            image = %spec.image,
            runtime = %runtime,
            "[ContainerLauncher] Starting container"
        );

        let runtime_path = which::which(runtime).map_err(|_| {
            self.launch_error(
                &spec,
                format!("container runtime '{runtime}' not found. Ensure it's installed and in PATH."),
            )
        })?;
        debug!(path = ?runtime_path, "[ContainerLauncher] Found container runtime");

        let args = Self::command_args(&spec);
        let env = spec.env.clone();
        let transport = TokioChildProcess::new(Command::new(&runtime_path).configure(move |cmd| {
            cmd.args(&args)
                .envs(&env)
                .stderr(Stdio::null())
                .kill_on_drop(true);
        }))
        .map_err(|e| self.launch_error(&spec, format!("failed to spawn process: {e}")))?;

        let handler = HostClientHandler::new(&spec.key.server_id);
        let timeout = self.config.startup_timeout;
        let service = match tokio::time::timeout(timeout, handler.serve(transport)).await {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => {
                return Err(self.launch_error(&spec, format!("protocol handshake failed: {e}")))
            }
            Err(_) => {
                return Err(self.launch_error(
                    &spec,
                    format!("server did not start within {}s", timeout.as_secs()),
                ))
            }
        };

        info!(server_id = %spec.key.server_id, "[ContainerLauncher] Container connected");
        Ok(Arc::new(LocalProcessClient::new(spec.key, spec.image, service)))
    }
}

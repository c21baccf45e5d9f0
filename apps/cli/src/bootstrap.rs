//! Wiring: configuration, logging, storage, services and the server manager

use std::sync::Arc;

use anyhow::{Context, Result};
use mcphost_core::{
    EventBus, HostConfig, CredentialService, CredentialStore, ServerRegistry, SessionManager,
};
use mcphost_runtime::{
    init_tracing, ClientContext, ContainerLauncher, CredentialResolver, DefaultClientFactory,
    ServerManager,
};
use mcphost_storage::{key_provider_for, Storage};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

pub struct App {
    pub manager: Arc<ServerManager>,
    pub events: EventBus,
    _log_guard: Option<WorkerGuard>,
}

pub async fn bootstrap() -> Result<App> {
    let config = HostConfig::from_env();
    let log_guard = init_tracing(&config.logging);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

    let master_key = key_provider_for(config.master_secret.as_deref())?
        .get_or_create_key()
        .context("failed to load master secret")?;
    let storage = Storage::open(&config.database_path(), &master_key)?;
    info!(path = %config.database_path().display(), "[Bootstrap] Database opened");

    let store = Arc::new(CredentialStore::new(storage.credentials.clone()));
    let service = Arc::new(CredentialService::new(storage.tokens.clone()));
    let sessions = Arc::new(SessionManager::new(
        storage.sessions.clone(),
        config.session_max_age,
    ));
    if let Err(e) = sessions.cleanup_expired(config.session_max_age).await {
        warn!(error = %e, "[Bootstrap] Session cleanup failed");
    }

    let events = EventBus::new();
    let http = reqwest::Client::builder()
        .timeout(config.protocol.request_timeout)
        .build()
        .context("failed to build HTTP client")?;
    let ctx = ClientContext {
        http,
        protocol: config.protocol.clone(),
        sessions,
        events: events.sender(),
    };
    let factory = DefaultClientFactory::new(ctx)
        .with_launcher(Arc::new(ContainerLauncher::new(config.launcher.clone())));

    let registry = Arc::new(ServerRegistry::bundled()?);
    info!(servers = registry.len(), "[Bootstrap] Registry loaded");

    let manager = Arc::new(ServerManager::new(
        registry,
        CredentialResolver::new(store, service),
        Arc::new(factory),
        events.sender(),
    ));

    Ok(App {
        manager,
        events,
        _log_guard: log_guard,
    })
}

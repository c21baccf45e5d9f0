//! Shared test utilities and fixtures for McpHost integration tests.

pub use mcphost_core::{DomainEvent, ServerRegistry};

/// Mock repository and client implementations
pub mod mocks;
pub use mocks::{MockCapabilityClient, MockClientFactory, MockRepositories};

/// Event testing utilities
pub mod events {
    use mcphost_core::{DomainEvent, EventReceiver};
    use std::time::Duration;

    /// Drain everything already published, without waiting
    pub fn drain(rx: &mut EventReceiver) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for a specific event
    pub async fn wait_for_event<F>(
        rx: &mut EventReceiver,
        timeout: Duration,
        predicate: F,
    ) -> Option<DomainEvent>
    where
        F: Fn(&DomainEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(event)) if predicate(&event) => return Some(event),
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(_) => return None,
            }
        }
    }

    pub fn type_names(events: &[DomainEvent]) -> Vec<&'static str> {
        events.iter().map(DomainEvent::type_name).collect()
    }
}

/// Test fixture utilities
pub mod fixtures {
    use chrono::{Duration, Utc};
    use mcphost_core::{AuthCredentials, CredentialInput, OAuthTokens};

    pub const USER: &str = "user-1";

    pub fn bearer(token: &str) -> CredentialInput {
        CredentialInput::new(AuthCredentials::Bearer {
            token: token.to_string(),
        })
    }

    pub fn api_key(key: &str) -> CredentialInput {
        CredentialInput::new(AuthCredentials::ApiKey {
            api_key: key.to_string(),
        })
    }

    pub fn basic(username: &str, password: &str) -> CredentialInput {
        CredentialInput::new(AuthCredentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Atlassian-style tokens: refreshable, with a cloud id, valid for an hour
    pub fn atlassian_tokens() -> OAuthTokens {
        OAuthTokens::new("atl-access-token")
            .with_refresh_token("atl-refresh-token")
            .with_cloud_id("cloud-123")
            .with_expiry(Utc::now() + Duration::hours(1))
    }
}

/// Database test helpers
pub mod db {
    use mcphost_storage::Database;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Database file name
    const DB_FILE: &str = "mcphost.db";

    /// Create a temporary database for testing
    pub struct TestDatabase {
        pub db: Database,
        _temp_dir: TempDir,
        db_path: PathBuf,
    }

    impl TestDatabase {
        /// Create a new test database in a temporary directory
        pub fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let db_path = temp_dir.path().join(DB_FILE);
            let db = Database::open(&db_path).expect("Failed to open test database");
            Self {
                db,
                db_path,
                _temp_dir: temp_dir,
            }
        }

        /// Get the database directory path
        pub fn path(&self) -> &Path {
            self._temp_dir.path()
        }

        /// Get the full database file path
        pub fn db_path(&self) -> &Path {
            &self.db_path
        }
    }

    impl Default for TestDatabase {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Service test helpers
pub mod services {
    use std::sync::Arc;
    use std::time::Duration;

    use mcphost_core::{
        CredentialService, CredentialStore, EventBus, EventReceiver, ServerRegistry,
        SessionManager,
    };
    use mcphost_runtime::{CredentialResolver, ServerManager};

    use crate::mocks::{MockClientFactory, MockRepositories};

    /// Test harness for ServerManager
    ///
    /// Real credential services over mock repositories, and a mock client
    /// factory in place of real transports.
    pub struct ServerManagerTestHarness {
        /// The ServerManager under test
        pub manager: Arc<ServerManager>,

        /// Factory handing out mock clients
        pub factory: Arc<MockClientFactory>,

        pub store: Arc<CredentialStore>,
        pub service: Arc<CredentialService>,
        pub sessions: Arc<SessionManager>,

        /// Event receiver for asserting emitted events
        pub events: EventReceiver,

        /// Mock repositories
        pub repos: MockRepositories,
    }

    impl ServerManagerTestHarness {
        /// Harness over the bundled catalog
        pub fn new() -> Self {
            Self::with_registry(ServerRegistry::bundled().expect("bundled catalog"))
        }

        pub fn with_registry(registry: ServerRegistry) -> Self {
            let repos = MockRepositories::new();
            let store = Arc::new(CredentialStore::new(repos.credentials.clone()));
            let service = Arc::new(CredentialService::new(repos.tokens.clone()));
            let sessions = Arc::new(SessionManager::new(
                repos.sessions.clone(),
                Duration::from_secs(24 * 60 * 60),
            ));

            let bus = EventBus::new();
            let events = bus.subscribe();
            let factory = Arc::new(MockClientFactory::new());

            let manager = Arc::new(ServerManager::new(
                Arc::new(registry),
                CredentialResolver::new(store.clone(), service.clone()),
                factory.clone(),
                bus.sender(),
            ));

            Self {
                manager,
                factory,
                store,
                service,
                sessions,
                events,
                repos,
            }
        }
    }

    impl Default for ServerManagerTestHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub use services::ServerManagerTestHarness;

/// Async test helpers
pub mod async_helpers {
    use std::time::Duration;
    use tokio::time::timeout;

    /// Run an async operation with a timeout
    pub async fn with_timeout<F, T>(duration: Duration, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        timeout(duration, f).await.expect("Operation timed out")
    }

    /// Default test timeout (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}

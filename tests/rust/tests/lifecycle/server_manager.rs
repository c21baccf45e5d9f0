//! Start, stop, status and concurrency

use std::time::Duration;

use mcphost_core::{DomainEvent, HostError, ServerKind, ServerStatus};
use mcphost_runtime::{HealthStatus, ServerConfig};
use pretty_assertions::assert_eq;
use tests::events::{drain, type_names, wait_for_event};
use tests::fixtures::USER;
use tests::{MockCapabilityClient, ServerManagerTestHarness};

fn config() -> ServerConfig {
    ServerConfig::default()
}

#[tokio::test]
async fn test_start_open_remote_server() {
    let mut h = ServerManagerTestHarness::new();
    h.factory.register(
        "deepwiki",
        MockCapabilityClient::new()
            .with_tool("ask_question")
            .with_tool("read_wiki_structure")
            .with_resource("wiki://index"),
    );

    let outcome = h.manager.start("deepwiki", USER, config()).await.unwrap();

    assert!(!outcome.already_running);
    assert_eq!(outcome.kind, ServerKind::RemoteHttp);
    assert_eq!(outcome.capabilities.tools.len(), 2);
    assert_eq!(outcome.capabilities.resources.len(), 1);
    assert!(h.manager.is_running("deepwiki", USER));
    assert_eq!(
        h.manager.get_status("deepwiki", USER).unwrap(),
        ServerStatus::Running
    );
    // Open servers get no credentials
    assert!(h.factory.last_credentials().is_none());

    let events = drain(&mut h.events);
    assert_eq!(type_names(&events), vec!["server_started"]);
    match &events[0] {
        DomainEvent::ServerStarted { tool_count, kind, .. } => {
            assert_eq!(*tool_count, 2);
            assert_eq!(*kind, ServerKind::RemoteHttp);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let h = ServerManagerTestHarness::new();
    h.factory
        .register("deepwiki", MockCapabilityClient::new().with_tool("ask_question"));

    let first = h.manager.start("deepwiki", USER, config()).await.unwrap();
    let second = h.manager.start("deepwiki", USER, config()).await.unwrap();

    assert!(!first.already_running);
    assert!(second.already_running);
    assert_eq!(second.capabilities, first.capabilities);
    assert_eq!(h.factory.connects(), 1);
}

#[tokio::test]
async fn test_concurrent_starts_connect_once() {
    let h = ServerManagerTestHarness::new();
    h.factory
        .register("deepwiki", MockCapabilityClient::new().with_tool("ask_question"));
    h.factory.set_delay(Duration::from_millis(50));

    let (a, b) = tokio::join!(
        h.manager.start("deepwiki", USER, config()),
        h.manager.start("deepwiki", USER, config()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(h.factory.connects(), 1);
    assert!(a.already_running != b.already_running);
    assert_eq!(h.manager.list_running().len(), 1);
}

#[tokio::test]
async fn test_connections_are_per_user() {
    let h = ServerManagerTestHarness::new();

    h.manager.start("deepwiki", "alice", config()).await.unwrap();
    h.manager.start("deepwiki", "bob", config()).await.unwrap();

    assert_eq!(h.factory.connects(), 2);
    let running = h.manager.list_running();
    assert_eq!(running.len(), 2);
    assert_eq!(running[0].user_id, "alice");
    assert_eq!(running[1].user_id, "bob");

    h.manager.stop("deepwiki", "alice").await;
    assert!(!h.manager.is_running("deepwiki", "alice"));
    assert!(h.manager.is_running("deepwiki", "bob"));
}

#[tokio::test]
async fn test_unknown_server() {
    let h = ServerManagerTestHarness::new();

    assert!(matches!(
        h.manager.start("nope", USER, config()).await,
        Err(HostError::NotFound(_))
    ));
    assert!(matches!(
        h.manager.get_status("nope", USER),
        Err(HostError::NotFound(_))
    ));
    assert_eq!(h.factory.connects(), 0);
}

#[tokio::test]
async fn test_coming_soon_cannot_start() {
    let h = ServerManagerTestHarness::new();

    assert!(matches!(
        h.manager.start("salesforce-remote", USER, config()).await,
        Err(HostError::ComingSoon(_))
    ));
    assert_eq!(
        h.manager.get_status("salesforce-remote", USER).unwrap(),
        ServerStatus::ComingSoon
    );
    assert!(h
        .manager
        .list_available(USER)
        .iter()
        .all(|listing| listing.id != "salesforce-remote"));
}

#[tokio::test]
async fn test_local_server_gets_config_and_no_credentials() {
    let h = ServerManagerTestHarness::new();

    let outcome = h
        .manager
        .start(
            "github",
            USER,
            config().with_env("GITHUB_PERSONAL_ACCESS_TOKEN", "ghp_local"),
        )
        .await
        .unwrap();

    assert_eq!(outcome.kind, ServerKind::LocalProcess);
    assert!(h.factory.last_credentials().is_none());
    let passed = h.factory.last_config().unwrap();
    assert_eq!(
        passed.env.get("GITHUB_PERSONAL_ACCESS_TOKEN").map(String::as_str),
        Some("ghp_local")
    );
}

#[tokio::test]
async fn test_connect_failure_sets_error_status() {
    let mut h = ServerManagerTestHarness::new();
    h.factory.fail("deepwiki", "connection refused");

    let err = h.manager.start("deepwiki", USER, config()).await.unwrap_err();
    assert!(matches!(err, HostError::Transport(_)));

    assert!(!h.manager.is_running("deepwiki", USER));
    assert_eq!(
        h.manager.get_status("deepwiki", USER).unwrap(),
        ServerStatus::Error
    );
    assert!(h
        .manager
        .last_error("deepwiki", USER)
        .unwrap()
        .contains("connection refused"));

    let event = wait_for_event(&mut h.events, Duration::from_secs(1), |e| {
        matches!(e, DomainEvent::ServerError { .. })
    })
    .await;
    assert!(event.is_some());

    // Stopping clears the error
    let outcome = h.manager.stop("deepwiki", USER).await;
    assert!(outcome.success);
    assert!(!outcome.was_running);
    assert_eq!(
        h.manager.get_status("deepwiki", USER).unwrap(),
        ServerStatus::Available
    );
}

#[tokio::test]
async fn test_successful_start_clears_previous_error() {
    let h = ServerManagerTestHarness::new();
    h.factory.fail("deepwiki", "boom");
    assert!(h.manager.start("deepwiki", USER, config()).await.is_err());
    assert_eq!(
        h.manager.get_status("deepwiki", USER).unwrap(),
        ServerStatus::Error
    );

    h.factory.recover("deepwiki");
    h.manager.start("deepwiki", USER, config()).await.unwrap();

    assert_eq!(
        h.manager.get_status("deepwiki", USER).unwrap(),
        ServerStatus::Running
    );
    assert!(h.manager.last_error("deepwiki", USER).is_none());
    assert_eq!(h.factory.connects(), 2);
}

#[tokio::test]
async fn test_stop_not_running_succeeds() {
    let mut h = ServerManagerTestHarness::new();

    let outcome = h.manager.stop("deepwiki", USER).await;

    assert!(outcome.success);
    assert!(!outcome.was_running);
    assert!(outcome.error.is_none());
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn test_stop_closes_client() {
    let mut h = ServerManagerTestHarness::new();
    let client = h.factory.register("deepwiki", MockCapabilityClient::new());

    h.manager.start("deepwiki", USER, config()).await.unwrap();
    drain(&mut h.events);

    let outcome = h.manager.stop("deepwiki", USER).await;

    assert!(outcome.success);
    assert!(outcome.was_running);
    assert!(client.is_closed());
    assert!(!h.manager.is_running("deepwiki", USER));
    assert_eq!(type_names(&drain(&mut h.events)), vec!["server_stopped"]);
}

#[tokio::test]
async fn test_stop_reports_close_failure_but_removes_connection() {
    let h = ServerManagerTestHarness::new();
    h.factory
        .register("deepwiki", MockCapabilityClient::new().failing_close());

    h.manager.start("deepwiki", USER, config()).await.unwrap();
    let outcome = h.manager.stop("deepwiki", USER).await;

    assert!(!outcome.success);
    assert!(outcome.was_running);
    assert!(outcome.error.unwrap().contains("close failed"));
    assert!(!h.manager.is_running("deepwiki", USER));
}

#[tokio::test]
async fn test_stop_all_isolates_failures() {
    let h = ServerManagerTestHarness::new();
    let good = h.factory.register("deepwiki", MockCapabilityClient::new());
    h.factory
        .register("filesystem", MockCapabilityClient::new().failing_close());

    h.manager.start("deepwiki", USER, config()).await.unwrap();
    h.manager.start("filesystem", USER, config()).await.unwrap();

    let mut reports = h.manager.stop_all().await;
    reports.sort_by(|a, b| a.server_id.cmp(&b.server_id));

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].server_id, "deepwiki");
    assert!(reports[0].outcome.success);
    assert_eq!(reports[1].server_id, "filesystem");
    assert!(!reports[1].outcome.success);

    assert!(good.is_closed());
    assert!(h.manager.list_running().is_empty());
}

#[tokio::test]
async fn test_list_available_reflects_status() {
    let h = ServerManagerTestHarness::new();
    h.manager.start("deepwiki", USER, config()).await.unwrap();

    let listings = h.manager.list_available(USER);
    let deepwiki = listings.iter().find(|l| l.id == "deepwiki").unwrap();
    assert_eq!(deepwiki.status, ServerStatus::Running);
    assert!(deepwiki.is_running);

    let github = listings.iter().find(|l| l.id == "github").unwrap();
    assert_eq!(github.status, ServerStatus::Available);

    // Another user sees nothing running
    let other = h.manager.list_available("someone-else");
    assert!(other.iter().all(|l| !l.is_running));
}

#[tokio::test]
async fn test_health_check_isolates_unhealthy_servers() {
    let h = ServerManagerTestHarness::new();
    h.factory.register(
        "deepwiki",
        MockCapabilityClient::new()
            .with_tool("ask_question")
            .with_prompt("summarize"),
    );
    h.factory
        .register("filesystem", MockCapabilityClient::new().failing_ping());

    h.manager.start("deepwiki", USER, config()).await.unwrap();
    h.manager.start("filesystem", USER, config()).await.unwrap();

    let report = h.manager.health_check().await;

    assert_eq!(report.total_servers, h.manager.registry().len());
    assert_eq!(report.running_servers, 2);

    let healthy = &report.servers[&format!("{USER}/deepwiki")];
    assert_eq!(healthy.status, HealthStatus::Healthy);
    let counts = healthy.capabilities.as_ref().unwrap();
    assert_eq!((counts.tools, counts.resources, counts.prompts), (1, 0, 1));

    let unhealthy = &report.servers[&format!("{USER}/filesystem")];
    assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
    assert!(unhealthy.error.as_ref().unwrap().contains("connection reset"));
    assert!(unhealthy.capabilities.is_none());
}

#[tokio::test]
async fn test_health_check_listing_failure_is_unhealthy() {
    let h = ServerManagerTestHarness::new();
    h.factory
        .register("deepwiki", MockCapabilityClient::new().failing_resources());

    h.manager.start("deepwiki", USER, config()).await.unwrap();
    let report = h.manager.health_check().await;

    let health = &report.servers[&format!("{USER}/deepwiki")];
    assert_eq!(health.status, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn test_health_check_with_nothing_running() {
    let h = ServerManagerTestHarness::new();

    let report = h.manager.health_check().await;

    assert_eq!(report.running_servers, 0);
    assert!(report.servers.is_empty());
    assert_eq!(report.total_servers, 6);
}

#[tokio::test]
async fn test_stop_releases_start_lock() {
    let h = ServerManagerTestHarness::new();

    h.manager.start("deepwiki", "alice", config()).await.unwrap();
    h.manager.start("deepwiki", "bob", config()).await.unwrap();
    assert_eq!(h.manager.start_lock_count(), 2);

    h.manager.stop("deepwiki", "alice").await;
    assert_eq!(h.manager.start_lock_count(), 1);

    h.manager.stop_all().await;
    // Stopping something never started leaves nothing behind either
    h.manager.stop("filesystem", "carol").await;
    assert_eq!(h.manager.start_lock_count(), 0);

    // A key can be started again after its lock was released
    h.manager.start("deepwiki", "alice", config()).await.unwrap();
    assert!(h.manager.is_running("deepwiki", "alice"));
}

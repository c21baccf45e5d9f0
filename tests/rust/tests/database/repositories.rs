//! Repository tests against a file-backed database

use std::time::Duration;

use chrono::Utc;
use mcphost_core::{
    AuthType, CredentialService, CredentialStore, SessionManager, SessionRecord,
    SessionRepository,
};
use mcphost_storage::{generate_master_key, Storage};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::db::TestDatabase;
use tests::fixtures::{atlassian_tokens, bearer, USER};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn session(server_id: &str, session_id: &str) -> SessionRecord {
    SessionRecord::new(
        USER,
        server_id,
        session_id,
        "https://mcp.atlassian.com/v1/sse",
        AuthType::OAuth,
        json!({"tools": {}}),
    )
}

#[tokio::test]
async fn test_everything_survives_reopen() {
    let test_db = TestDatabase::new();
    let master = generate_master_key().unwrap();

    {
        let storage = Storage::open(test_db.db_path(), &master).unwrap();
        CredentialStore::new(storage.credentials.clone())
            .store(USER, "github", bearer("ghp_persisted"))
            .await
            .unwrap();
        CredentialService::new(storage.tokens.clone())
            .store_tokens(USER, "atlassian-remote", atlassian_tokens())
            .await
            .unwrap();
        SessionManager::new(storage.sessions.clone(), DAY)
            .store_session(&session("atlassian-remote", "sess-persisted"))
            .await
            .unwrap();
    }

    let storage = Storage::open(test_db.db_path(), &master).unwrap();

    let record = CredentialStore::new(storage.credentials.clone())
        .get(USER, "github")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.auth_type(), AuthType::Bearer);

    let tokens = CredentialService::new(storage.tokens.clone())
        .get_valid_tokens(USER, "atlassian-remote")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tokens.cloud_id.as_deref(), Some("cloud-123"));

    let restored = SessionManager::new(storage.sessions.clone(), DAY)
        .get_session(USER, "atlassian-remote")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.session_id, "sess-persisted");
    assert_eq!(restored.capabilities, json!({"tools": {}}));
}

#[tokio::test]
async fn test_session_save_replaces_previous() {
    let storage = Storage::open_in_memory(&generate_master_key().unwrap()).unwrap();
    let sessions = SessionManager::new(storage.sessions.clone(), DAY);

    sessions.store_session(&session("srv", "old")).await.unwrap();
    sessions.store_session(&session("srv", "new")).await.unwrap();

    let record = sessions.get_session(USER, "srv").await.unwrap().unwrap();
    assert_eq!(record.session_id, "new");

    let count: i64 = storage
        .database
        .lock()
        .await
        .connection()
        .query_row("SELECT COUNT(*) FROM protocol_sessions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_stale_session_is_discarded_on_read() {
    let storage = Storage::open_in_memory(&generate_master_key().unwrap()).unwrap();
    let sessions = SessionManager::new(storage.sessions.clone(), Duration::from_secs(60));

    let mut record = session("srv", "idle");
    record.last_used_at = Utc::now() - chrono::Duration::minutes(5);
    sessions.store_session(&record).await.unwrap();

    assert!(sessions.get_session(USER, "srv").await.unwrap().is_none());
    assert!(storage.sessions.get(USER, "srv").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_last_used_and_cleanup() {
    let storage = Storage::open_in_memory(&generate_master_key().unwrap()).unwrap();
    let sessions = SessionManager::new(storage.sessions.clone(), DAY);

    let mut idle = session("idle", "s1");
    idle.last_used_at = Utc::now() - chrono::Duration::hours(2);
    sessions.store_session(&idle).await.unwrap();

    let mut touched = session("touched", "s2");
    touched.last_used_at = Utc::now() - chrono::Duration::hours(2);
    sessions.store_session(&touched).await.unwrap();

    assert!(sessions.update_last_used(USER, "touched").await.unwrap());
    assert!(!sessions.update_last_used(USER, "missing").await.unwrap());

    let removed = sessions
        .cleanup_expired(Duration::from_secs(60 * 60))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(sessions.get_session(USER, "idle").await.unwrap().is_none());
    assert!(sessions.get_session(USER, "touched").await.unwrap().is_some());
}

#[tokio::test]
async fn test_invalidate_session() {
    let storage = Storage::open_in_memory(&generate_master_key().unwrap()).unwrap();
    let sessions = SessionManager::new(storage.sessions.clone(), DAY);

    sessions.store_session(&session("srv", "s")).await.unwrap();

    assert!(sessions.invalidate_session(USER, "srv").await.unwrap());
    assert!(!sessions.invalidate_session(USER, "srv").await.unwrap());
}

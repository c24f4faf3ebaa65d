//! Integration tests for credential refresh.
//!
//! These tests verify that the PatreonClient correctly:
//! - Exchanges refresh tokens and persists the rotated pair
//! - Keeps the old refresh token when the server does not rotate it
//! - Leaves the stored credential untouched when the exchange is rejected
//! - Treats a persistence failure as a failed refresh

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pledgekeep_core::{
    Credential, CredentialStore, MemoryCredentialStore, PatreonClient, PatreonConfig, StoreError,
    SyncError,
};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to build a client pointed at a mock server.
fn create_client(server: &MockServer) -> PatreonClient {
    PatreonClient::new(
        PatreonConfig::new("client-id", "client-secret", 1234).with_base_url(server.uri()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_refresh_persists_rotated_pair() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh-token"))
        .and(body_string_contains("client_id=client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "new-refresh-token"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let store = MemoryCredentialStore::new();
    let current = Credential::new(
        "old-access-token",
        "old-refresh-token",
        Utc::now() + Duration::days(1),
    );

    let refreshed = client.refresh_credentials(&store, &current).await.unwrap();

    assert_eq!(refreshed.access_token.expose(), "new-access-token");
    assert_eq!(refreshed.refresh_token.expose(), "new-refresh-token");

    // Expiry is derived from expires_in.
    let lifetime = refreshed.expires_at - Utc::now();
    assert!(lifetime > Duration::minutes(55));
    assert!(lifetime <= Duration::hours(1));

    // The new pair was persisted before the refresh reported success.
    let stored = store.load("client-id").await.unwrap().unwrap();
    assert_eq!(stored, refreshed);
}

#[tokio::test]
async fn test_refresh_keeps_old_refresh_token_without_rotation() {
    let mock_server = MockServer::start().await;

    // No refresh_token in the response body.
    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let store = MemoryCredentialStore::new();
    let current = Credential::new(
        "old-access-token",
        "old-refresh-token",
        Utc::now() + Duration::days(1),
    );

    let refreshed = client.refresh_credentials(&store, &current).await.unwrap();

    assert_eq!(refreshed.access_token.expose(), "new-access-token");
    assert_eq!(refreshed.refresh_token.expose(), "old-refresh-token");
}

#[tokio::test]
async fn test_rejected_refresh_leaves_store_unchanged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "The refresh token is invalid or expired"
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let current = Credential::new(
        "old-access-token",
        "old-refresh-token",
        Utc::now() + Duration::days(1),
    );
    let store = MemoryCredentialStore::with_credential("client-id", current.clone());

    let err = client
        .refresh_credentials(&store, &current)
        .await
        .unwrap_err();

    // Rejection is retried on a later cycle, it must not stop the loop.
    assert!(!err.is_fatal());
    match err {
        SyncError::RefreshRejected { .. } => {}
        other => panic!("Expected SyncError::RefreshRejected, got {:?}", other),
    }

    let stored = store.load("client-id").await.unwrap().unwrap();
    assert_eq!(stored, current);
}

#[tokio::test]
async fn test_refresh_without_expiry_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access-token",
            "token_type": "Bearer"
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let store = MemoryCredentialStore::new();
    let current = Credential::new(
        "old-access-token",
        "old-refresh-token",
        Utc::now() + Duration::days(1),
    );

    let result = client.refresh_credentials(&store, &current).await;

    match result {
        Err(SyncError::RefreshRejected { message }) => {
            assert!(message.contains("expires_in"));
        }
        other => panic!("Expected SyncError::RefreshRejected, got {:?}", other),
    }

    // Nothing was persisted.
    assert!(store.load("client-id").await.unwrap().is_none());
}

/// A store whose writes always fail.
struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn load(&self, _client_id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _client_id: &str, _credential: &Credential) -> Result<(), StoreError> {
        Err(StoreError::Backend {
            message: "write refused".to_string(),
        })
    }
}

#[tokio::test]
async fn test_persistence_failure_fails_the_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "new-refresh-token"
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let current = Credential::new(
        "old-access-token",
        "old-refresh-token",
        Utc::now() + Duration::days(1),
    );

    let result = client.refresh_credentials(&FailingStore, &current).await;

    match result {
        Err(SyncError::Persistence(_)) => {}
        other => panic!("Expected SyncError::Persistence, got {:?}", other),
    }
}

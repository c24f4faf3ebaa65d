//! Integration tests for the Discord interaction endpoint.
//!
//! These tests verify that the server correctly:
//! - Rejects unsigned and badly signed requests
//! - Answers ping interactions with pongs
//! - Enforces the guild allow-list
//! - Renders lookup responses from the published snapshot

use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

use pledgekeep_core::{Patron, PatronAttributes, Secret, Snapshot, SnapshotStore};
use pledgekeep_daemon::config::{Config, DiscordConfig, PatreonSettings};
use pledgekeep_daemon::server::{build_router, AppState};

/// Deterministic signing key standing in for Discord's.
fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        discord: DiscordConfig {
            public_key: hex::encode(signing_key().verifying_key().to_bytes()),
            allowed_guilds: vec![42],
        },
        patreon: PatreonSettings {
            client_id: "client-id".to_string(),
            client_secret: Secret::new("client-secret"),
            campaign_id: 1234,
            requests_per_minute: 100,
        },
        tiers: HashMap::from([(10, "Gold".to_string())]),
    }
}

/// Serve the interaction router on an ephemeral port.
///
/// Returns the endpoint URL and a shutdown handle the test holds on to.
async fn start_server(snapshots: Arc<SnapshotStore>) -> (String, tokio::sync::oneshot::Sender<()>) {
    let state = AppState::new(&test_config(), snapshots).unwrap();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    (format!("http://{}/interaction", addr), shutdown_tx)
}

/// POST a payload signed the way Discord signs webhook deliveries.
async fn post_signed(url: &str, payload: &Value) -> reqwest::Response {
    let body = payload.to_string();
    let timestamp = "1700000000";
    let message = [timestamp.as_bytes(), body.as_bytes()].concat();
    let signature = hex::encode(signing_key().sign(&message).to_bytes());

    reqwest::Client::new()
        .post(url)
        .header("X-Signature-Ed25519", signature)
        .header("X-Signature-Timestamp", timestamp)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
}

fn ping_payload() -> Value {
    json!({
        "id": "1",
        "application_id": "2",
        "type": 1,
        "token": "interaction-token",
        "version": 1,
    })
}

/// A `lookup` command interaction as Discord delivers it.
fn lookup_payload(guild_id: Option<u64>, options: Value) -> Value {
    let mut payload = json!({
        "id": "1",
        "application_id": "2",
        "type": 2,
        "data": {
            "id": "3",
            "name": "lookup",
            "type": 1,
            "options": options,
        },
        "channel_id": "5",
        "user": {
            "id": "999",
            "username": "tester",
            "discriminator": "0",
            "global_name": null,
            "avatar": null,
        },
        "token": "interaction-token",
        "version": 1,
        "locale": "en-US",
        "guild_locale": null,
        "app_permissions": null,
        "entitlements": [],
    });
    if let Some(guild_id) = guild_id {
        payload["guild_id"] = json!(guild_id.to_string());
    }
    payload
}

fn patron() -> Patron {
    Patron {
        id: 77,
        email: "one@example.com".to_string(),
        discord_id: Some(555),
        tiers: vec![10],
        attributes: PatronAttributes {
            patron_status: Some("active_patron".to_string()),
            last_charge_status: Some("Paid".to_string()),
            last_charge_date: None,
            pledge_start: None,
        },
    }
}

fn published_store() -> Arc<SnapshotStore> {
    let snapshots = Arc::new(SnapshotStore::new());
    snapshots.publish(Snapshot::new(HashMap::from([(
        "one@example.com".to_string(),
        patron(),
    )])));
    snapshots
}

#[tokio::test]
async fn test_unsigned_request_is_rejected() {
    let (url, _shutdown) = start_server(Arc::new(SnapshotStore::new())).await;

    let response = reqwest::Client::new()
        .post(&url)
        .header("Content-Type", "application/json")
        .body(ping_payload().to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let (url, _shutdown) = start_server(Arc::new(SnapshotStore::new())).await;

    let body = ping_payload().to_string();
    let timestamp = "1700000000";
    let message = [timestamp.as_bytes(), body.as_bytes()].concat();
    let wrong_key = SigningKey::from_bytes(&[9u8; 32]);
    let signature = hex::encode(wrong_key.sign(&message).to_bytes());

    let response = reqwest::Client::new()
        .post(&url)
        .header("X-Signature-Ed25519", signature)
        .header("X-Signature-Timestamp", timestamp)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let (url, _shutdown) = start_server(Arc::new(SnapshotStore::new())).await;

    let response = post_signed(&url, &ping_payload()).await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], 1);
}

#[tokio::test]
async fn test_undecodable_payload_is_bad_request() {
    let (url, _shutdown) = start_server(Arc::new(SnapshotStore::new())).await;

    let response = post_signed(&url, &json!({ "hello": "world" })).await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unlisted_guild_is_refused() {
    let (url, _shutdown) = start_server(published_store()).await;
    let payload = lookup_payload(
        Some(7),
        json!([{ "name": "email", "type": 3, "value": "one@example.com" }]),
    );

    let response = post_signed(&url, &payload).await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], 4);
    assert_eq!(
        body["data"]["content"],
        "This guild is not in the allowed guilds list"
    );
    assert_eq!(body["data"]["flags"], 64);
}

#[tokio::test]
async fn test_direct_message_is_refused() {
    let (url, _shutdown) = start_server(published_store()).await;
    let payload = lookup_payload(
        None,
        json!([{ "name": "email", "type": 3, "value": "one@example.com" }]),
    );

    let response = post_signed(&url, &payload).await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["data"]["content"],
        "This guild is not in the allowed guilds list"
    );
}

#[tokio::test]
async fn test_lookup_before_first_snapshot() {
    let (url, _shutdown) = start_server(Arc::new(SnapshotStore::new())).await;
    let payload = lookup_payload(
        Some(42),
        json!([{ "name": "email", "type": 3, "value": "one@example.com" }]),
    );

    let response = post_signed(&url, &payload).await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["data"]["content"],
        "Initial data not loaded yet, please try again in a few minutes"
    );
}

#[tokio::test]
async fn test_lookup_without_target_asks_for_one() {
    let (url, _shutdown) = start_server(published_store()).await;
    let payload = lookup_payload(Some(42), json!([]));

    let response = post_signed(&url, &payload).await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["content"], "Missing email");
}

#[tokio::test]
async fn test_unknown_command_is_answered_ephemerally() {
    let (url, _shutdown) = start_server(published_store()).await;
    let mut payload = lookup_payload(Some(42), json!([]));
    payload["data"]["name"] = json!("frobnicate");

    let response = post_signed(&url, &payload).await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["content"], "Unknown command");
    assert_eq!(body["data"]["flags"], 64);
}

#[tokio::test]
async fn test_lookup_by_email_renders_the_account() {
    let (url, _shutdown) = start_server(published_store()).await;
    let payload = lookup_payload(
        Some(42),
        json!([{ "name": "email", "type": 3, "value": "one@example.com" }]),
    );

    let response = post_signed(&url, &payload).await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], 4);

    let embed = &body["data"]["embeds"][0];
    assert_eq!(embed["title"], "Account Found");
    assert_eq!(embed["url"], "https://www.patreon.com/user?u=77");
    assert_eq!(embed["color"], 0x4287f5);

    let fields = embed["fields"].as_array().unwrap();
    assert!(fields
        .iter()
        .any(|field| field["name"] == "Active Tiers" && field["value"] == "Gold"));
    assert!(fields
        .iter()
        .any(|field| field["name"] == "Discord Account" && field["value"] == "<@555> (555)"));
}

#[tokio::test]
async fn test_lookup_by_user_id_uses_the_discord_index() {
    let (url, _shutdown) = start_server(published_store()).await;
    let payload = lookup_payload(
        Some(42),
        json!([{ "name": "user", "type": 6, "value": "555" }]),
    );

    let response = post_signed(&url, &payload).await;

    let body: Value = response.json().await.unwrap();
    let embed = &body["data"]["embeds"][0];
    assert_eq!(embed["title"], "Account Found");
}

#[tokio::test]
async fn test_lookup_miss_renders_not_found() {
    let (url, _shutdown) = start_server(published_store()).await;
    let payload = lookup_payload(
        Some(42),
        json!([{ "name": "email", "type": 3, "value": "absent@example.com" }]),
    );

    let response = post_signed(&url, &payload).await;

    let body: Value = response.json().await.unwrap();
    let embed = &body["data"]["embeds"][0];
    assert_eq!(embed["title"], "Account Not Found");
    assert_eq!(embed["color"], 0xeb4034);
    assert_eq!(
        embed["description"],
        "No Patreon account with email `absent@example.com` found"
    );
}

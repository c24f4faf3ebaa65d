//! The Discord interaction endpoint.
//!
//! Discord delivers interactions as signed webhooks. Every request is
//! checked against the application's ed25519 public key before the body is
//! even parsed; Discord also pings the endpoint and expects
//! both failure modes (401 for bad signatures, 400 for bad payloads) to be
//! distinguished.

use anyhow::{anyhow, Context};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serenity::builder::CreateInteractionResponse;
use serenity::interactions_endpoint::Verifier;
use serenity::model::application::{CommandInteraction, Interaction};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use pledgekeep_core::SnapshotStore;

use crate::commands::{self, LookupTarget, ParseError, SlashCommand};
use crate::config::Config;

const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

/// Shared state of the interaction endpoint.
#[derive(Clone)]
pub struct AppState {
    snapshots: Arc<SnapshotStore>,
    tier_names: Arc<HashMap<u64, String>>,
    allowed_guilds: Arc<Vec<u64>>,
    verifier: Verifier,
}

impl AppState {
    /// Build the endpoint state from the daemon config and the snapshot
    /// store the sync engine publishes into.
    pub fn new(config: &Config, snapshots: Arc<SnapshotStore>) -> anyhow::Result<Self> {
        let key: [u8; 32] = hex::decode(&config.discord.public_key)
            .context("Discord public key is not valid hex")?
            .try_into()
            .map_err(|_| anyhow!("Discord public key must be 32 bytes"))?;
        let verifier =
            Verifier::try_new(key).map_err(|e| anyhow!("Invalid Discord public key: {}", e))?;

        Ok(Self {
            snapshots,
            tier_names: Arc::new(config.tiers.clone()),
            allowed_guilds: Arc::new(config.discord.allowed_guilds.clone()),
            verifier,
        })
    }
}

/// Build the interaction router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/interaction", post(handle_interaction))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !verify_signature(&state, &headers, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            debug!("Failed to decode interaction payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match interaction {
        Interaction::Ping(_) => Json(CreateInteractionResponse::Pong).into_response(),
        Interaction::Command(command) => Json(respond_to_command(&state, &command)).into_response(),
        _ => {
            debug!("Unsupported interaction kind");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

fn verify_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(timestamp) = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    state.verifier.verify(signature, timestamp, body).is_ok()
}

/// Answer an application command from the current snapshot.
fn respond_to_command(state: &AppState, command: &CommandInteraction) -> CreateInteractionResponse {
    // Direct messages carry no guild id and are refused along with
    // unlisted guilds.
    let guild_allowed = command
        .guild_id
        .is_some_and(|id| state.allowed_guilds.contains(&id.get()));
    if !guild_allowed {
        return commands::ephemeral_text("This guild is not in the allowed guilds list");
    }

    let parsed = match SlashCommand::parse(&command.data) {
        Ok(parsed) => parsed,
        Err(ParseError::UnknownCommand { name }) => {
            warn!("Unknown command {}", name);
            return commands::ephemeral_text("Unknown command");
        }
        Err(ParseError::MissingTarget) => return commands::ephemeral_text("Missing email"),
    };

    match parsed {
        SlashCommand::Lookup(target) => {
            if !state.snapshots.has_data() {
                return commands::ephemeral_text(
                    "Initial data not loaded yet, please try again in a few minutes",
                );
            }

            let patron = match &target {
                LookupTarget::Email(email) => state.snapshots.lookup_by_email(email),
                LookupTarget::User(id) => state.snapshots.lookup_by_discord_id(*id),
            };

            match patron {
                Some(patron) => commands::found_response(&patron, &state.tier_names, &command.user),
                None => commands::not_found_response(&target),
            }
        }
    }
}

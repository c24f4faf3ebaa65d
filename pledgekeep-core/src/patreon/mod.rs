//! Patreon API client.
//!
//! This module provides:
//! - [`PatreonConfig`] - Connection settings for one campaign
//! - [`PatreonClient`] - Credential refresh, page fetching, and aggregation
//! - [`wire`] - Decode types for the members listing
//!
//! One client serves one campaign. All outbound requests, including the
//! token refresh, draw from a shared [`RateLimiter`] budget.

use chrono::Utc;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::credential::{Credential, Secret};
use crate::error::SyncError;
use crate::model::{Patron, PatronAttributes};
use crate::rate_limit::RateLimiter;
use crate::snapshot::Snapshot;
use crate::store::CredentialStore;

pub mod wire;

/// Identifying header sent with every API request.
pub const USER_AGENT: &str = "pledgekeep (https://github.com/pledgekeep/pledgekeep)";

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://www.patreon.com";

/// Default outbound request budget.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

/// Connection settings for one campaign.
#[derive(Debug, Clone)]
pub struct PatreonConfig {
    /// OAuth client id; also the key of the persisted credential row.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: Secret,

    /// The campaign whose members are synchronized.
    pub campaign_id: u64,

    /// Outbound request budget, shared across refresh and page fetches.
    pub requests_per_minute: u32,

    /// API host; overridable so tests can point at a local server.
    pub base_url: String,
}

impl PatreonConfig {
    /// Create a config with the default host and request budget.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        campaign_id: u64,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret),
            campaign_id,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the request budget.
    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }
}

/// Client for the membership API of one campaign.
pub struct PatreonClient {
    http: reqwest::Client,
    oauth: BasicClient,
    limiter: RateLimiter,
    client_id: String,
    first_page_url: Url,
}

impl PatreonClient {
    /// Build a client from a config.
    ///
    /// Fails only on malformed configuration (unparseable host URL).
    pub fn new(config: PatreonConfig) -> Result<Self, SyncError> {
        let base = Url::parse(&config.base_url).map_err(|e| SyncError::Config {
            message: format!("invalid base URL {}: {}", config.base_url, e),
        })?;

        let auth_url = base.join("/oauth2/authorize").map_err(|e| SyncError::Config {
            message: format!("invalid authorize URL: {}", e),
        })?;
        let token_url = base.join("/api/oauth2/token").map_err(|e| SyncError::Config {
            message: format!("invalid token URL: {}", e),
        })?;

        // Patreon expects client credentials in the request body rather
        // than a basic-auth header.
        let oauth = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.expose().to_string())),
            AuthUrl::from_url(auth_url),
            Some(TokenUrl::from_url(token_url)),
        )
        .set_auth_type(AuthType::RequestBody);

        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            oauth,
            limiter: RateLimiter::per_minute(config.requests_per_minute),
            client_id: config.client_id,
            first_page_url: member_listing_url(&base, config.campaign_id)?,
        })
    }

    /// The OAuth client id this client authenticates as.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchange the current refresh token for a new token pair.
    ///
    /// The new pair (including a possibly-rotated refresh token) is
    /// persisted to `store` before it is returned; if the write fails the
    /// refresh counts as failed and the previously persisted credential is
    /// left untouched.
    pub async fn refresh_credentials<S>(
        &self,
        store: &S,
        current: &Credential,
    ) -> Result<Credential, SyncError>
    where
        S: CredentialStore + ?Sized,
    {
        self.limiter.acquire().await;
        tracing::debug!("Exchanging refresh token for client {}", self.client_id);

        let token_response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(current.refresh_token.expose().to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| SyncError::RefreshRejected {
                message: e.to_string(),
            })?;

        let expires_in = token_response
            .expires_in()
            .ok_or_else(|| SyncError::RefreshRejected {
                message: "token response carried no expires_in".to_string(),
            })?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in).map_err(|e| SyncError::RefreshRejected {
                message: format!("invalid expiry duration: {}", e),
            })?;

        // Keep the old refresh token if the server did not rotate it.
        let refresh_token = token_response
            .refresh_token()
            .map(|token| token.secret().as_str())
            .unwrap_or_else(|| current.refresh_token.expose());

        let refreshed = Credential::new(
            token_response.access_token().secret().as_str(),
            refresh_token,
            expires_at,
        );

        store.save(&self.client_id, &refreshed).await?;

        Ok(refreshed)
    }

    /// Fetch and decode one page of the members listing.
    ///
    /// Rejects the call without touching the network when the access
    /// token's known expiry has already passed.
    pub async fn fetch_page(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<wire::MembersPage, SyncError> {
        if credential.is_expired() {
            return Err(SyncError::StaleAccessToken {
                expires_at: credential.expires_at,
            });
        }

        self.limiter.acquire().await;
        tracing::debug!("Fetching members page {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(credential.access_token.expose())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!("Members page {} returned {}: {}", url, status, body);
            return Err(SyncError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch every page of the members listing and build a snapshot.
    ///
    /// Follows `next` links until pagination is exhausted, bounding each
    /// page fetch (including its rate-limiter wait) by `page_timeout`. Any
    /// single-page failure aborts the whole aggregation; no partial
    /// snapshot is ever produced.
    pub async fn fetch_members(
        &self,
        credential: &Credential,
        tier_names: &HashMap<u64, String>,
        page_timeout: Duration,
    ) -> Result<Snapshot, SyncError> {
        let mut patrons: HashMap<String, Patron> = HashMap::new();
        let mut next_url = Some(self.first_page_url.to_string());

        while let Some(url) = next_url {
            let page = timeout(page_timeout, self.fetch_page(&url, credential))
                .await
                .map_err(|_| SyncError::Cancelled {
                    phase: "page fetch",
                })??;

            for member in &page.data {
                if let Some(patron) = convert_member(member, &page.included, tier_names) {
                    patrons.insert(patron.email.clone(), patron);
                }
            }

            next_url = page.next_link().map(str::to_string);
        }

        Ok(Snapshot::new(patrons))
    }
}

impl std::fmt::Debug for PatreonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatreonClient")
            .field("client_id", &self.client_id)
            .field("first_page_url", &self.first_page_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Convert one member entry into a [`Patron`].
///
/// Returns `None` for members without an email; they cannot be indexed.
/// Tiers missing from `tier_names` are dropped from the tier list but the
/// member is kept.
fn convert_member(
    member: &wire::MemberResource,
    included: &[wire::IncludedResource],
    tier_names: &HashMap<u64, String>,
) -> Option<Patron> {
    let user_id = member.relationships.user.data.id;

    let email = match member.attributes.email.as_deref() {
        Some(email) if !email.is_empty() => email.to_string(),
        _ => {
            tracing::debug!("Member {} has no email, skipping", user_id);
            return None;
        }
    };

    let mut tiers = Vec::new();
    for tier in &member.relationships.currently_entitled_tiers.data {
        if tier_names.contains_key(&tier.id) {
            tiers.push(tier.id);
        } else {
            tracing::warn!("Member {} has unknown tier {}", user_id, tier.id);
        }
    }

    let discord_id = included
        .iter()
        .find(|resource| resource.id == user_id)
        .and_then(|resource| resource.attributes.social_connections.as_ref())
        .and_then(|connections| connections.discord.as_ref())
        .and_then(|discord| discord.user_id);

    Some(Patron {
        id: user_id,
        email,
        discord_id,
        tiers,
        attributes: PatronAttributes {
            patron_status: member.attributes.patron_status.clone(),
            last_charge_status: member.attributes.last_charge_status.clone(),
            last_charge_date: member.attributes.last_charge_date,
            pledge_start: member.attributes.pledge_relationship_start,
        },
    })
}

/// Build the first-page URL of the members listing for a campaign.
fn member_listing_url(base: &Url, campaign_id: u64) -> Result<Url, SyncError> {
    let mut url = base
        .join(&format!("/api/oauth2/v2/campaigns/{}/members", campaign_id))
        .map_err(|e| SyncError::Config {
            message: format!("invalid members URL: {}", e),
        })?;
    url.query_pairs_mut()
        .append_pair("include", "currently_entitled_tiers,user")
        .append_pair(
            "fields[member]",
            "last_charge_date,last_charge_status,patron_status,email,pledge_relationship_start",
        )
        .append_pair("fields[user]", "social_connections");
    Ok(url)
}

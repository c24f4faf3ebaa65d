//! The fixed-interval sync loop.
//!
//! This module provides:
//! - [`SyncConfig`] - Inter-cycle interval and per-phase deadlines
//! - [`SyncEngine`] - Drives refresh-check → aggregate → publish cycles
//!
//! One cycle: check the credential (a credential already past expiry before
//! any refresh is fatal), refresh it when inside the refresh window, fetch
//! every page of the members listing, and publish the resulting snapshot.
//! The next cycle starts a fixed interval after the previous one finishes,
//! so cycles never overlap. Every failure short of an unusable credential
//! is contained within its cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::credential::Credential;
use crate::error::SyncError;
use crate::patreon::PatreonClient;
use crate::snapshot::SnapshotStore;
use crate::store::{CredentialStore, StoreError};

/// Timing parameters of the sync loop.
///
/// All deadlines are explicit so the engine's behavior is testable without
/// real network timing.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,

    /// Deadline for the token refresh exchange.
    pub refresh_timeout: Duration,

    /// Deadline for a whole aggregation (all pages).
    pub aggregate_timeout: Duration,

    /// Deadline for a single page fetch, including its rate-limit wait.
    pub page_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(30),
            aggregate_timeout: Duration::from_secs(60 * 60),
            page_timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Drives the sync cycle against one campaign.
///
/// The engine owns the in-memory credential. It is loaded from the store
/// once at startup ([`load_credential`](SyncEngine::load_credential)) and
/// replaced only by a successful refresh, after the new pair has been
/// persisted.
pub struct SyncEngine<S> {
    client: PatreonClient,
    /// Backing credential store, exposed for test setup and inspection.
    pub store: S,
    snapshots: Arc<SnapshotStore>,
    tier_names: HashMap<u64, String>,
    config: SyncConfig,
    credential: Option<Credential>,
}

impl<S: CredentialStore> SyncEngine<S> {
    /// Create an engine. No credential is loaded yet.
    pub fn new(
        client: PatreonClient,
        store: S,
        snapshots: Arc<SnapshotStore>,
        tier_names: HashMap<u64, String>,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            store,
            snapshots,
            tier_names,
            config,
            credential: None,
        }
    }

    /// Seed the in-memory credential directly, bypassing the store.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Load the persisted credential for this client.
    ///
    /// An absent row is not an error here, but the first cycle will fail
    /// fatally: without a refresh token the loop cannot self-heal.
    pub async fn load_credential(&mut self) -> Result<(), StoreError> {
        self.credential = self.store.load(self.client.client_id()).await?;
        if self.credential.is_none() {
            tracing::warn!(
                "No stored credential for client {}; seed the credential table before syncing",
                self.client.client_id()
            );
        }
        Ok(())
    }

    /// The current in-memory credential.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Run one refresh-check → aggregate → publish cycle.
    pub async fn run_cycle(&mut self) -> Result<(), SyncError> {
        let mut credential = match &self.credential {
            Some(credential) => credential.clone(),
            None => {
                return Err(SyncError::MissingCredential {
                    client_id: self.client.client_id().to_string(),
                });
            }
        };

        // Past expiry with no refresh performed the refresh token itself is
        // likely dead; nothing this loop does can recover that.
        if credential.is_expired() {
            return Err(SyncError::ExpiredCredential {
                expires_at: credential.expires_at,
            });
        }

        if credential.needs_refresh() {
            tracing::info!(
                "Access token expires at {}, refreshing",
                credential.expires_at
            );
            match timeout(
                self.config.refresh_timeout,
                self.client.refresh_credentials(&self.store, &credential),
            )
            .await
            {
                Ok(Ok(refreshed)) => {
                    tracing::info!("Refreshed access token, new expiry {}", refreshed.expires_at);
                    self.credential = Some(refreshed.clone());
                    credential = refreshed;
                }
                // A failed refresh is retried next cycle; this cycle keeps
                // the old token and is stopped by the page-fetch
                // precondition if that token is already past expiry.
                Ok(Err(e)) => tracing::error!("Failed to refresh access token: {}", e),
                Err(_) => tracing::error!(
                    "Token refresh timed out after {:?}",
                    self.config.refresh_timeout
                ),
            }
        }

        let snapshot = timeout(
            self.config.aggregate_timeout,
            self.client
                .fetch_members(&credential, &self.tier_names, self.config.page_timeout),
        )
        .await
        .map_err(|_| SyncError::Cancelled {
            phase: "aggregation",
        })??;

        let count = snapshot.len();
        self.snapshots.publish(snapshot);
        tracing::info!("Published snapshot of {} patrons", count);

        Ok(())
    }

    /// Run cycles until the credential becomes unusable.
    ///
    /// Non-fatal cycle errors are logged and retried after the configured
    /// interval; the returned error is always fatal.
    pub async fn run(mut self) -> SyncError {
        loop {
            match self.run_cycle().await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!("Credential is unusable, stopping sync: {}", e);
                    return e;
                }
                Err(e) => tracing::error!("Sync cycle failed: {}", e),
            }

            sleep(self.config.interval).await;
        }
    }
}

impl<S> std::fmt::Debug for SyncEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("has_credential", &self.credential.is_some())
            .finish_non_exhaustive()
    }
}

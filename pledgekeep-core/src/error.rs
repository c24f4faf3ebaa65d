//! Error types for the sync path.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StoreError;

/// Error type covering credential refresh, page fetching, and aggregation.
///
/// Everything except the credential-unusable variants is contained within
/// its sync cycle: logged, the cycle ends without publishing, and normal
/// operation resumes on the next tick. [`is_fatal`](SyncError::is_fatal)
/// identifies the conditions that instead require the process to stop.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure talking to the membership API.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The membership API answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// A response body could not be decoded.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The authorization server rejected or failed the refresh exchange.
    #[error("token refresh failed: {message}")]
    RefreshRejected { message: String },

    /// Writing the refreshed credential to durable storage failed.
    ///
    /// The refresh counts as failed even though the upstream exchange
    /// succeeded; the in-memory credential must not drift ahead of the
    /// persisted one.
    #[error("credential store error: {0}")]
    Persistence(#[from] StoreError),

    /// No credential exists for the configured client id.
    ///
    /// Fatal: there is no refresh token to exchange, so the sync loop
    /// cannot self-heal. The credential table must be seeded by hand.
    #[error("no stored credential for client {client_id}")]
    MissingCredential { client_id: String },

    /// The credential expired before any refresh succeeded.
    ///
    /// Fatal: the refresh token is likely no longer accepted upstream and
    /// must be re-provisioned by an operator.
    #[error("credential expired at {expires_at} before it could be refreshed")]
    ExpiredCredential { expires_at: DateTime<Utc> },

    /// The access token expired mid-cycle; the request was not sent.
    ///
    /// Aborts the current cycle only. If the credential is truly unusable
    /// the next cycle's entry check escalates to [`ExpiredCredential`].
    #[error("access token expired at {expires_at}, request not sent")]
    StaleAccessToken { expires_at: DateTime<Utc> },

    /// A phase deadline elapsed before the work completed.
    #[error("{phase} timed out")]
    Cancelled { phase: &'static str },

    /// Invalid client configuration (endpoint URLs, campaign id).
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    /// Whether this error means the credential cannot self-heal and the
    /// process should stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::MissingCredential { .. } | SyncError::ExpiredCredential { .. }
        )
    }
}

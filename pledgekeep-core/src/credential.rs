//! OAuth credential material and refresh policy.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`Credential`] - The access/refresh token pair and its expiry
//! - The needs-refresh policy (refresh ahead of expiry by [`REFRESH_WINDOW_DAYS`])

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How far ahead of access-token expiry a refresh becomes due.
pub const REFRESH_WINDOW_DAYS: i64 = 3;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// An OAuth token pair together with the server-reported access-token expiry.
///
/// A credential is replaced wholesale by a successful refresh and never
/// mutated in place. `expires_at` always describes `access_token`; once it
/// has passed, the refresh token itself may no longer be accepted upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// The bearer token used for API calls.
    pub access_token: Secret,

    /// The token exchanged for a new pair when the access token nears expiry.
    pub refresh_token: Secret,

    /// Server-reported expiry of `access_token`.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential from raw token values and an expiry.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
            expires_at,
        }
    }

    /// Check whether the access token's expiry has already passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check whether a refresh is due.
    ///
    /// Refreshing starts [`REFRESH_WINDOW_DAYS`] ahead of expiry so a few
    /// failed attempts can be retried before the token actually lapses.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() >= self.expires_at - chrono::Duration::days(REFRESH_WINDOW_DAYS)
    }
}

//! Credential persistence.
//!
//! This module provides:
//! - [`CredentialStore`] - Trait for durable credential storage backends
//! - [`PostgresCredentialStore`] - The production backend (one row per client id)
//! - [`MemoryCredentialStore`] - In-memory implementation for testing
//!
//! The persisted row is the durable source of truth for the credential: it
//! is read once at startup and overwritten on every successful refresh.

use async_trait::async_trait;
use thiserror::Error;

use crate::credential::Credential;

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PostgresCredentialStore;

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected or failed the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    Backend { message: String },
}

/// Abstraction over durable credential storage, keyed by OAuth client id.
///
/// Implementations include:
/// - [`PostgresCredentialStore`] - One database row per client id
/// - [`MemoryCredentialStore`] - In-memory storage for testing
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve the persisted credential for a client id.
    ///
    /// Returns `Ok(None)` if no credential has ever been stored; that is a
    /// valid initial state, not an error.
    async fn load(&self, client_id: &str) -> Result<Option<Credential>, StoreError>;

    /// Persist a credential for a client id, overwriting any existing row.
    async fn save(&self, client_id: &str, credential: &Credential) -> Result<(), StoreError>;
}

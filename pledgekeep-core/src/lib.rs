//! # Pledgekeep Core
//!
//! Core library for the Pledgekeep patron index.
//!
//! This crate provides:
//! - The patron data model and the dual-indexed, atomically published snapshot
//! - OAuth credential lifecycle management (load, refresh-ahead-of-expiry, persist)
//! - A rate-limited, paginated Patreon client with cross-referencing aggregation
//! - The fixed-interval sync engine that drives refresh → aggregate → publish
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pledgekeep_core::{
//!     PatreonClient, PatreonConfig, PostgresCredentialStore, SnapshotStore, SyncConfig,
//!     SyncEngine,
//! };
//! use std::sync::Arc;
//!
//! async fn start() -> anyhow::Result<()> {
//!     let store = PostgresCredentialStore::connect("postgres://localhost/pledgekeep").await?;
//!     let client = PatreonClient::new(PatreonConfig::new("client-id", "client-secret", 1234))?;
//!     let snapshots = Arc::new(SnapshotStore::new());
//!
//!     let mut engine = SyncEngine::new(
//!         client,
//!         store,
//!         Arc::clone(&snapshots),
//!         [(10, "Gold".to_string())].into(),
//!         SyncConfig::default(),
//!     );
//!     engine.load_credential().await?;
//!     tokio::spawn(engine.run());
//!     Ok(())
//! }
//! ```

pub mod credential;
pub mod error;
pub mod model;
pub mod patreon;
pub mod rate_limit;
pub mod snapshot;
pub mod store;
pub mod sync;

// Re-export commonly used types at crate root
pub use credential::{Credential, REFRESH_WINDOW_DAYS, Secret};

pub use error::SyncError;

pub use model::{Patron, PatronAttributes};

pub use patreon::{PatreonClient, PatreonConfig};

pub use rate_limit::RateLimiter;

pub use snapshot::{Snapshot, SnapshotStore};

pub use store::{CredentialStore, MemoryCredentialStore, PostgresCredentialStore, StoreError};

pub use sync::{SyncConfig, SyncEngine};

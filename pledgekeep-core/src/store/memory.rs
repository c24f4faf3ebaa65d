//! In-memory credential storage implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{CredentialStore, StoreError};
use crate::credential::Credential;

/// In-memory credential store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct MemoryCredentialStore {
    data: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a memory store seeded with one credential.
    pub fn with_credential(client_id: impl Into<String>, credential: Credential) -> Self {
        let store = Self::new();
        store.data.write().insert(client_id.into(), credential);
        store
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCredentialStore")
            .field("clients", &self.data.read().len())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, client_id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.data.read().get(client_id).cloned())
    }

    async fn save(&self, client_id: &str, credential: &Credential) -> Result<(), StoreError> {
        self.data
            .write()
            .insert(client_id.to_string(), credential.clone());
        Ok(())
    }
}

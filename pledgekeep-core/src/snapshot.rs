//! The published patron index.
//!
//! This module provides:
//! - [`Snapshot`] - An immutable, dual-indexed view of all current patrons
//! - [`SnapshotStore`] - The atomically swappable slot lookups read from
//!
//! A snapshot is built whole at the end of a successful sync cycle and
//! replaces the previous one in a single swap. Readers always see either
//! the full previous snapshot or the full new one, never a mix.

use arc_swap::ArcSwapOption;
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::Patron;

/// An immutable pair of indexes over one set of patron records.
///
/// Both maps point at the same `Arc<Patron>` values: `by_discord_id` is a
/// projection of `by_email` over patrons with a linked Discord account, so
/// the two views can never disagree.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// All patrons, keyed by email.
    pub by_email: HashMap<String, Arc<Patron>>,

    /// Patrons with a linked Discord account, keyed by Discord user id.
    pub by_discord_id: HashMap<u64, Arc<Patron>>,
}

impl Snapshot {
    /// Build a snapshot from an email-keyed collection, deriving the
    /// Discord-id view.
    pub fn new(patrons: HashMap<String, Patron>) -> Self {
        let mut by_email = HashMap::with_capacity(patrons.len());
        let mut by_discord_id = HashMap::new();

        for (email, patron) in patrons {
            let patron = Arc::new(patron);
            if let Some(discord_id) = patron.discord_id {
                by_discord_id.insert(discord_id, Arc::clone(&patron));
            }
            by_email.insert(email, patron);
        }

        Self {
            by_email,
            by_discord_id,
        }
    }

    /// Number of patrons in the snapshot.
    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    /// Whether the snapshot holds no patrons.
    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

/// Holder of the currently published [`Snapshot`].
///
/// Publishing swaps the whole snapshot atomically; lookups are lock-free
/// and never block a publisher longer than the swap itself. The slot
/// starts empty, which is how "never synchronized" is told apart from an
/// empty result set.
#[derive(Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<Snapshot>,
}

impl SnapshotStore {
    /// Create an empty store with no published snapshot.
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::const_empty(),
        }
    }

    /// Replace the published snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        self.current.store(Some(Arc::new(snapshot)));
    }

    /// Whether any snapshot has ever been published.
    pub fn has_data(&self) -> bool {
        self.current.load().is_some()
    }

    /// The currently published snapshot, if any.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Look up a patron by email in the current snapshot.
    pub fn lookup_by_email(&self, email: &str) -> Option<Arc<Patron>> {
        self.current
            .load()
            .as_ref()
            .and_then(|snapshot| snapshot.by_email.get(email).cloned())
    }

    /// Look up a patron by linked Discord account id in the current snapshot.
    pub fn lookup_by_discord_id(&self, discord_id: u64) -> Option<Arc<Patron>> {
        self.current
            .load()
            .as_ref()
            .and_then(|snapshot| snapshot.by_discord_id.get(&discord_id).cloned())
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("patrons", &self.current.load().as_ref().map(|s| s.len()))
            .finish()
    }
}

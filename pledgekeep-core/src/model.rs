//! Patron records produced by a sync cycle.
//!
//! This module provides:
//! - [`Patron`] - One subscriber record, keyed by email in the published index
//! - [`PatronAttributes`] - Billing status and pledge dates
//!
//! Records are built fresh each cycle from raw API pages and are immutable
//! once placed into a published snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subscriber record.
///
/// `email` is the primary key of the index; members without one are
/// discarded during aggregation. `tiers` holds the entitled tier ids that
/// appear in the configured tier-name mapping; display names are applied
/// at render time, not stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patron {
    /// The backing user id on the membership platform.
    pub id: u64,

    /// Email address, unique within a snapshot.
    pub email: String,

    /// Linked Discord account, if the member has connected one.
    pub discord_id: Option<u64>,

    /// Entitled tier ids, filtered to the configured tier set.
    pub tiers: Vec<u64>,

    /// Billing status and pledge dates.
    pub attributes: PatronAttributes,
}

/// Billing attributes attached to a patron.
///
/// All fields are optional on the wire: followers and never-charged members
/// arrive with nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatronAttributes {
    /// Membership status reported by the platform (e.g. `active_patron`).
    pub patron_status: Option<String>,

    /// Outcome of the most recent charge attempt.
    pub last_charge_status: Option<String>,

    /// When the most recent charge was attempted.
    pub last_charge_date: Option<DateTime<Utc>>,

    /// When the pledge relationship began.
    pub pledge_start: Option<DateTime<Utc>>,
}

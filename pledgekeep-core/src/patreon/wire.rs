//! Wire types for the members listing endpoint.
//!
//! The API speaks a JSON:API dialect: resource ids arrive as decimal
//! strings, attribute objects are sparse, and followers show up with null
//! emails and statuses. Decoding is deliberately lenient about absent
//! fields so one odd record cannot fail a whole page.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of the members listing.
#[derive(Debug, Deserialize)]
pub struct MembersPage {
    #[serde(default)]
    pub data: Vec<MemberResource>,

    /// Auxiliary resources referenced by the members on this page.
    #[serde(default)]
    pub included: Vec<IncludedResource>,

    #[serde(default)]
    pub links: Option<PageLinks>,
}

impl MembersPage {
    /// The URL of the next page, if pagination continues.
    pub fn next_link(&self) -> Option<&str> {
        self.links.as_ref().and_then(|links| links.next.as_deref())
    }
}

/// Pagination links attached to a page.
#[derive(Debug, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

/// A member entry in a page's `data` array.
#[derive(Debug, Deserialize)]
pub struct MemberResource {
    #[serde(default)]
    pub attributes: MemberAttributes,
    pub relationships: MemberRelationships,
}

/// Member attributes requested via the `fields[member]` parameter.
#[derive(Debug, Default, Deserialize)]
pub struct MemberAttributes {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub patron_status: Option<String>,
    #[serde(default)]
    pub last_charge_status: Option<String>,
    #[serde(default)]
    pub last_charge_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pledge_relationship_start: Option<DateTime<Utc>>,
}

/// Relationship block of a member entry.
#[derive(Debug, Deserialize)]
pub struct MemberRelationships {
    pub user: UserRelationship,
    #[serde(default)]
    pub currently_entitled_tiers: TierRelationship,
}

/// The member's backing user.
#[derive(Debug, Deserialize)]
pub struct UserRelationship {
    pub data: ResourceRef,
}

/// The member's entitled tiers.
#[derive(Debug, Default, Deserialize)]
pub struct TierRelationship {
    #[serde(default)]
    pub data: Vec<ResourceRef>,
}

/// A `{type, id}` reference to another resource.
#[derive(Debug, Deserialize)]
pub struct ResourceRef {
    #[serde(with = "string_id")]
    pub id: u64,
}

/// An auxiliary resource in a page's `included` array.
#[derive(Debug, Deserialize)]
pub struct IncludedResource {
    #[serde(with = "string_id")]
    pub id: u64,
    #[serde(default)]
    pub attributes: IncludedAttributes,
}

/// Attributes of an included user resource.
#[derive(Debug, Default, Deserialize)]
pub struct IncludedAttributes {
    #[serde(default)]
    pub social_connections: Option<SocialConnections>,
}

/// The social accounts a user has linked.
#[derive(Debug, Deserialize)]
pub struct SocialConnections {
    #[serde(default)]
    pub discord: Option<DiscordConnection>,
}

/// A linked Discord account.
#[derive(Debug, Deserialize)]
pub struct DiscordConnection {
    #[serde(default, with = "opt_string_id")]
    pub user_id: Option<u64>,
}

/// Decodes a `u64` sent as a decimal string.
mod string_id {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>().map_err(serde::de::Error::custom)
    }
}

/// Decodes an optional `u64` sent as a decimal string or null.
mod opt_string_id {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|value| value.parse::<u64>().map_err(serde::de::Error::custom))
            .transpose()
    }
}

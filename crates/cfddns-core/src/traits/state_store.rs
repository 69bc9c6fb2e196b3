// # State Store Trait
//
// Defines the interface for persisting sync progress between cycles.
//
// ## Purpose
//
// The state store ensures idempotency by tracking, per address family:
// - The address confirmed live as of the last cycle
// - The domains already confirmed to point at that address
//
// A domain listed here is not written again while the address is unchanged.
//
// ## Implementations
//
// - File-based: single JSON document (`FileStateStore`)
// - In-memory: tests and embedding (`MemoryStateStore`)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

use crate::config::RecordType;

/// Sync progress for one address family
///
/// Every domain in `last_update_domains` is believed, by local bookkeeping
/// only, to already point at `last_ip`. The belief is never re-checked
/// against the provider while the address stays the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyState {
    /// Address confirmed live as of the last cycle
    #[serde(default, deserialize_with = "deserialize_last_ip")]
    pub last_ip: Option<IpAddr>,

    /// Domains confirmed synced to `last_ip`, in first-confirmed order
    #[serde(default, deserialize_with = "deserialize_domains")]
    pub last_update_domains: Vec<String>,

    /// When a cycle last wrote this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl FamilyState {
    /// Create a family entry stamped with the current time
    pub fn new(last_ip: Option<IpAddr>, last_update_domains: Vec<String>) -> Self {
        Self {
            last_ip,
            last_update_domains,
            last_updated: Some(Utc::now()),
        }
    }

    /// Whether `domain` is already confirmed for `last_ip`
    pub fn is_synced(&self, domain: &str) -> bool {
        self.last_update_domains.iter().any(|d| d == domain)
    }
}

/// Persisted sync progress for both address families
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// IPv4 (A record) progress
    #[serde(default)]
    pub ipv4: FamilyState,
    /// IPv6 (AAAA record) progress
    #[serde(default)]
    pub ipv6: FamilyState,
}

impl SyncState {
    /// Progress for the family served by `record_type`
    pub fn family(&self, record_type: RecordType) -> &FamilyState {
        match record_type {
            RecordType::A => &self.ipv4,
            RecordType::Aaaa => &self.ipv6,
        }
    }

    /// Mutable progress for the family served by `record_type`
    pub fn family_mut(&mut self, record_type: RecordType) -> &mut FamilyState {
        match record_type {
            RecordType::A => &mut self.ipv4,
            RecordType::Aaaa => &mut self.ipv6,
        }
    }
}

// Older state files store a missing address as "" and missing domains as null.
fn deserialize_last_ip<'de, D>(deserializer: D) -> Result<Option<IpAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn deserialize_domains<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}

/// Trait for state store implementations
///
/// The whole document is read at cycle start and fully rewritten at cycle
/// end. There are no partial updates.
///
/// # Contract
///
/// - `load` on a store that has never been written returns an empty
///   [`SyncState`], not an error.
/// - `load` returns [`crate::Error::StateStore`] when existing state cannot
///   be read or parsed. The caller decides how to fall back.
/// - `save` must leave either the old or the new document in place, never a
///   torn one.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state
    async fn load(&self) -> Result<SyncState, crate::Error>;

    /// Replace the persisted state
    async fn save(&self, state: &SyncState) -> Result<(), crate::Error>;
}

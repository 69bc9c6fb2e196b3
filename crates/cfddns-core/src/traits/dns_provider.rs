// # DNS Provider Trait
//
// Defines the interface for reading and writing DNS records at a provider.
//
// ## Implementations
//
// - Cloudflare: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::{DnsProvider, RecordType};
//
// #[tokio::main]
// async fn main() -> Result<(), Box<dyn std::error::Error>> {
//     let provider = /* DnsProvider implementation */;
//     let ip = std::net::IpAddr::from([203, 0, 113, 7]);
//
//     let records = provider.lookup(RecordType::A, "example.com").await?;
//     match records.first() {
//         Some(record) => provider.update(RecordType::A, "example.com", ip, &record.id).await?,
//         None => provider.create(RecordType::A, "example.com", ip).await?,
//     };
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::config::RecordType;

/// TTL applied to every record the agent creates or updates
pub const RECORD_TTL_SECS: u32 = 120;

/// A DNS record as reported by the provider
///
/// Never persisted locally; fetched or written per domain per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-specific record identifier (required for updates)
    #[serde(default)]
    pub id: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record content (the address)
    pub content: String,
    /// Time-to-live in seconds
    #[serde(default)]
    pub ttl: Option<u32>,
}

/// Trait for DNS provider implementations
///
/// # Contract
///
/// Providers are stateless and single-shot: one remote call per method,
/// no retries, no caching, no decision about whether a write is needed.
/// That decision belongs to the update planner.
///
/// # Failures
///
/// - The provider answered but reported failure (or answered with a payload
///   of an unexpected shape): [`crate::Error::Rejected`], carrying the
///   provider's code and message when it supplied them.
/// - The provider could not be reached: [`crate::Error::Transport`].
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Find records matching both `record_type` and `name` exactly
    ///
    /// An empty list means "not found" and is not an error.
    async fn lookup(
        &self,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record pointing `name` at `ip`
    async fn create(
        &self,
        record_type: RecordType,
        name: &str,
        ip: IpAddr,
    ) -> Result<DnsRecord, crate::Error>;

    /// Overwrite the content of the record identified by `record_id`
    async fn update(
        &self,
        record_type: RecordType,
        name: &str,
        ip: IpAddr,
        record_id: &str,
    ) -> Result<DnsRecord, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Whether writes are logged instead of sent
    ///
    /// Records returned by `create`/`update` in this mode are synthesized,
    /// so the planner never counts them as confirmed.
    fn is_dry_run(&self) -> bool {
        false
    }
}

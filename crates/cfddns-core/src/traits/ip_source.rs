// # Address Source Trait
//
// Defines the interface for reading the public addresses the agent publishes.
//
// ## Implementations
//
// - Interface table (Unix): `cfddns-ip-iface` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::AddressSource;
//
// #[tokio::main]
// async fn main() -> Result<(), Box<dyn std::error::Error>> {
//     let source = /* AddressSource implementation */;
//
//     let pair = source.current().await?;
//     println!("v4={:?} v6={:?}", pair.ipv4, pair.ipv6);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::RecordType;

/// The public addresses observed on the configured interface
///
/// Either family may be absent; that is a normal outcome, not a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressPair {
    /// First globally routable IPv4 address, if any
    pub ipv4: Option<Ipv4Addr>,
    /// First globally routable IPv6 address, if any
    pub ipv6: Option<Ipv6Addr>,
}

impl AddressPair {
    /// Create a new address pair
    pub fn new(ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> Self {
        Self { ipv4, ipv6 }
    }

    /// The address for the family served by `record_type`
    pub fn get(&self, record_type: RecordType) -> Option<IpAddr> {
        match record_type {
            RecordType::A => self.ipv4.map(IpAddr::V4),
            RecordType::Aaaa => self.ipv6.map(IpAddr::V6),
        }
    }
}

/// Trait for address source implementations
///
/// # Contract
///
/// - A missing interface, or an interface without a global address of some
///   family, yields `Ok` with that family set to `None`.
/// - `Err` is reserved for failures of the underlying OS query itself.
/// - Implementations observe only; they never decide whether DNS changes.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Read the current address pair
    async fn current(&self) -> Result<AddressPair, crate::Error>;

    /// Name of the observed interface (for logging)
    fn interface(&self) -> &str;
}

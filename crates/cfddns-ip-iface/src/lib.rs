// # Interface Address Source
//
// Reads the addresses bound to one named network interface and picks, per
// family, the first globally routable unicast address.
//
// ## Selection
//
// Addresses are examined in the order the OS enumerates them. Anything in an
// IANA special-purpose range that is not marked globally reachable is
// skipped: private and unique-local space, shared address space, loopback,
// link-local, multicast, documentation, benchmarking, reserved, IPv4-mapped,
// translation and discard-only prefixes.
//
// ## Platform Support
//
// Enumeration goes through `if-addrs`, which wraps `getifaddrs(3)` on Unix
// and the adapter table on Windows.

use cfddns_core::traits::{AddressPair, AddressSource};
use cfddns_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// Address source backed by the OS interface table
#[derive(Debug, Clone)]
pub struct InterfaceAddressSource {
    interface: String,
}

impl InterfaceAddressSource {
    /// Create a source for the interface called `interface` (e.g. `eth0`)
    ///
    /// The interface does not need to exist yet; a missing interface simply
    /// yields no addresses.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

#[async_trait::async_trait]
impl AddressSource for InterfaceAddressSource {
    async fn current(&self) -> Result<AddressPair> {
        let name = self.interface.clone();
        let addrs = tokio::task::spawn_blocking(move || interface_addresses(&name))
            .await
            .map_err(|e| Error::interface(format!("address enumeration task failed: {}", e)))?
            .map_err(|e| {
                Error::interface(format!(
                    "failed to enumerate addresses of {}: {}",
                    self.interface, e
                ))
            })?;

        if addrs.is_empty() {
            debug!("Interface [{}] has no addresses (or does not exist)", self.interface);
        } else {
            debug!("Interface [{}] addresses: {:?}", self.interface, addrs);
        }

        Ok(select_addresses(&addrs))
    }

    fn interface(&self) -> &str {
        &self.interface
    }
}

/// All addresses bound to `name`, in enumeration order
///
/// A name matching no interface yields an empty list.
pub fn interface_addresses(name: &str) -> std::io::Result<Vec<IpAddr>> {
    Ok(if_addrs::get_if_addrs()?
        .into_iter()
        .filter(|iface| iface.name == name)
        .map(|iface| iface.ip())
        .collect())
}

/// Pick the first global address of each family from `addrs`
pub fn select_addresses(addrs: &[IpAddr]) -> AddressPair {
    AddressPair::new(
        select_global_ipv4(addrs.iter().filter_map(|ip| match ip {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })),
        select_global_ipv6(addrs.iter().filter_map(|ip| match ip {
            IpAddr::V6(v6) => Some(*v6),
            IpAddr::V4(_) => None,
        })),
    )
}

/// First globally routable IPv4 address, in iteration order
pub fn select_global_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = Ipv4Addr>,
{
    addrs.into_iter().find(is_global_ipv4)
}

/// First globally routable IPv6 address, in iteration order
pub fn select_global_ipv6<I>(addrs: I) -> Option<Ipv6Addr>
where
    I: IntoIterator<Item = Ipv6Addr>,
{
    addrs.into_iter().find(is_global_ipv6)
}

/// Whether `ip` is a globally routable unicast IPv4 address
pub fn is_global_ipv4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, d] = ip.octets();

    // 192.0.0.9 and 192.0.0.10 are the only global addresses in 192.0.0.0/24
    if a == 192 && b == 0 && c == 0 && (d == 9 || d == 10) {
        return true;
    }

    !(a == 0
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_documentation()
        // Shared address space, 100.64.0.0/10
        || (a == 100 && (b & 0b1100_0000) == 0b0100_0000)
        // IETF protocol assignments, 192.0.0.0/24
        || (a == 192 && b == 0 && c == 0)
        // Benchmarking, 198.18.0.0/15
        || (a == 198 && (b & 0xfe) == 18)
        // Reserved, 240.0.0.0/4
        || a >= 240)
}

/// Whether `ip` is a globally routable unicast IPv6 address
pub fn is_global_ipv6(ip: &Ipv6Addr) -> bool {
    let s = ip.segments();

    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local()
        // IPv4-mapped, ::ffff:0:0/96
        || matches!(s, [0, 0, 0, 0, 0, 0xffff, _, _])
        // IPv4/IPv6 local-use translation, 64:ff9b:1::/48
        || matches!(s, [0x64, 0xff9b, 1, _, _, _, _, _])
        // Discard-only, 100::/64
        || matches!(s, [0x100, 0, 0, 0, _, _, _, _])
        || is_non_global_ietf_assignment(&s)
        // Documentation, 2001:db8::/32 and 3fff::/20
        || (s[0] == 0x2001 && s[1] == 0xdb8)
        || (s[0] & 0xfff0) == 0x3ff0
        // 6to4, 2002::/16
        || s[0] == 0x2002)
}

/// 2001::/23 minus the sub-ranges registered as globally reachable
fn is_non_global_ietf_assignment(s: &[u16; 8]) -> bool {
    if s[0] != 0x2001 || s[1] >= 0x200 {
        return false;
    }

    let global = (s[1] == 1 && s[2..7] == [0; 5] && (s[7] == 1 || s[7] == 2))
        // AMT
        || s[1] == 3
        // AS112-v6
        || (s[1] == 4 && s[2] == 0x112)
        // ORCHIDv2 and DRIP
        || (0x20..=0x3f).contains(&s[1]);

    !global
}

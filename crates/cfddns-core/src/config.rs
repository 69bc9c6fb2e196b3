//! Configuration types for the DDNS agent
//!
//! [`DdnsConfig`] is built once at startup, validated, and then only ever
//! borrowed. The daemon assembles it from the environment; library users can
//! build it directly with [`DdnsConfig::builder`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

/// Default interval between sync cycles
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 120;

/// Directory (under the system temp dir) holding the state file
const STATE_DIR_NAME: &str = "cloudflare-ddns";

/// File name of the state document
const STATE_FILE_NAME: &str = "status.dat";

/// Default location of the persisted sync state
pub fn default_state_file() -> PathBuf {
    std::env::temp_dir().join(STATE_DIR_NAME).join(STATE_FILE_NAME)
}

/// DNS record type managed by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// The record type that carries addresses of the same family as `ip`
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Wire name used by DNS providers
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main DDNS configuration
///
/// The authorization key is never printed: the `Debug` implementation
/// redacts it.
#[derive(Clone)]
pub struct DdnsConfig {
    /// Provider zone identifier
    pub zone_id: String,

    /// Bearer credential for the provider API
    pub authorization_key: String,

    /// Interface whose addresses are published (e.g., "eth0")
    pub network_interface: String,

    /// Domains kept in sync, in configured order, without duplicates
    pub domain_names: Vec<String>,

    /// Whether A records are managed
    pub ipv4_ddns: bool,

    /// Whether AAAA records are managed
    pub ipv6_ddns: bool,

    /// Seconds between sync cycles
    pub update_interval_secs: u64,

    /// Location of the persisted sync state
    pub state_file: PathBuf,

    /// Perform lookups only and log the writes that would have happened
    pub dry_run: bool,
}

impl fmt::Debug for DdnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdnsConfig")
            .field("zone_id", &self.zone_id)
            .field("authorization_key", &"<REDACTED>")
            .field("network_interface", &self.network_interface)
            .field("domain_names", &self.domain_names)
            .field("ipv4_ddns", &self.ipv4_ddns)
            .field("ipv6_ddns", &self.ipv6_ddns)
            .field("update_interval_secs", &self.update_interval_secs)
            .field("state_file", &self.state_file)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DdnsConfig {
    /// Start building a configuration
    pub fn builder() -> DdnsConfigBuilder {
        DdnsConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.zone_id.trim().is_empty() {
            return Err(Error::config("ZONE_ID must not be empty"));
        }
        if self.authorization_key.trim().is_empty() {
            return Err(Error::config("AUTHORIZATION_KEY must not be empty"));
        }
        if self.network_interface.trim().is_empty() {
            return Err(Error::config("NETWORK_INTERFACE must not be empty"));
        }
        if self.domain_names.is_empty() {
            return Err(Error::config(
                "DOMAIN_NAMES must contain at least one domain name",
            ));
        }
        if self.domain_names.iter().any(|d| d.trim().is_empty()) {
            return Err(Error::config("DOMAIN_NAMES contains an empty entry"));
        }
        if self.update_interval_secs == 0 {
            return Err(Error::config("UPDATE_INTERVAL_SECONDS must be > 0"));
        }
        Ok(())
    }

    /// Whether the given address family is enabled
    pub fn is_enabled(&self, record_type: RecordType) -> bool {
        match record_type {
            RecordType::A => self.ipv4_ddns,
            RecordType::Aaaa => self.ipv6_ddns,
        }
    }
}

/// Builder for [`DdnsConfig`]
///
/// Text fields are trimmed; domain names are trimmed, empty entries dropped
/// and duplicates removed while keeping first-seen order.
#[derive(Debug, Default)]
pub struct DdnsConfigBuilder {
    zone_id: String,
    authorization_key: String,
    network_interface: String,
    domain_names: Vec<String>,
    ipv4_ddns: bool,
    ipv6_ddns: bool,
    update_interval_secs: Option<u64>,
    state_file: Option<PathBuf>,
    dry_run: bool,
}

impl DdnsConfigBuilder {
    pub fn zone_id(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = zone_id.into().trim().to_string();
        self
    }

    pub fn authorization_key(mut self, key: impl Into<String>) -> Self {
        self.authorization_key = key.into().trim().to_string();
        self
    }

    pub fn network_interface(mut self, interface: impl Into<String>) -> Self {
        self.network_interface = interface.into().trim().to_string();
        self
    }

    pub fn domain_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.domain_names.clear();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !self.domain_names.iter().any(|d| d == name) {
                self.domain_names.push(name.to_string());
            }
        }
        self
    }

    pub fn ipv4_ddns(mut self, enabled: bool) -> Self {
        self.ipv4_ddns = enabled;
        self
    }

    pub fn ipv6_ddns(mut self, enabled: bool) -> Self {
        self.ipv6_ddns = enabled;
        self
    }

    pub fn update_interval_secs(mut self, secs: u64) -> Self {
        self.update_interval_secs = Some(secs);
        self
    }

    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<DdnsConfig> {
        let config = DdnsConfig {
            zone_id: self.zone_id,
            authorization_key: self.authorization_key,
            network_interface: self.network_interface,
            domain_names: self.domain_names,
            ipv4_ddns: self.ipv4_ddns,
            ipv6_ddns: self.ipv6_ddns,
            update_interval_secs: self
                .update_interval_secs
                .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS),
            state_file: self.state_file.unwrap_or_else(default_state_file),
            dry_run: self.dry_run,
        };
        config.validate()?;
        Ok(config)
    }
}

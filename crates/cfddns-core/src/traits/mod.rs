//! Core traits for the DDNS agent
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressSource`]: Read the public addresses of an interface
//! - [`DnsProvider`]: Look up, create and update DNS records
//! - [`StateStore`]: Persist sync progress for idempotency

pub mod ip_source;
pub mod dns_provider;
pub mod state_store;

pub use ip_source::{AddressPair, AddressSource};
pub use dns_provider::{DnsProvider, DnsRecord, RECORD_TTL_SECS};
pub use state_store::{FamilyState, StateStore, SyncState};

//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call so tests can assert on exactly which remote
//! operations a cycle performed.

#![allow(dead_code)]

use cfddns_core::error::{Error, Result};
use cfddns_core::state::MemoryStateStore;
use cfddns_core::traits::{AddressPair, AddressSource, DnsProvider, DnsRecord, StateStore, SyncState};
use cfddns_core::{DdnsConfig, RecordType};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A remote call observed by [`ScriptedDnsProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Lookup(RecordType, String),
    Create(RecordType, String, IpAddr),
    Update(RecordType, String, IpAddr, String),
}

#[derive(Default)]
struct ProviderInner {
    records: Mutex<HashMap<(RecordType, String), Vec<DnsRecord>>>,
    calls: Mutex<Vec<Call>>,
    rejected: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    dry_run: AtomicBool,
}

/// An in-memory provider whose failures are scripted per domain
///
/// Clones share records, call log and failure scripts.
#[derive(Clone, Default)]
pub struct ScriptedDnsProvider {
    inner: Arc<ProviderInner>,
}

impl ScriptedDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing remote record
    pub fn with_record(self, record_type: RecordType, name: &str, id: &str, content: &str) -> Self {
        self.inner
            .records
            .lock()
            .unwrap()
            .entry((record_type, name.to_string()))
            .or_default()
            .push(DnsRecord {
                id: id.to_string(),
                record_type: record_type.to_string(),
                name: name.to_string(),
                content: content.to_string(),
                ttl: Some(120),
            });
        self
    }

    /// Make every call for `domain` fail with a provider rejection
    pub fn reject(&self, domain: &str) {
        self.inner.rejected.lock().unwrap().insert(domain.to_string());
    }

    /// Make every call for `domain` fail with a transport error
    pub fn unreachable(&self, domain: &str) {
        self.inner.unreachable.lock().unwrap().insert(domain.to_string());
    }

    /// Log writes without applying them, like a provider in dry-run mode
    pub fn set_dry_run(&self, dry_run: bool) {
        self.inner.dry_run.store(dry_run, Ordering::SeqCst);
    }

    /// Stop failing calls for `domain`
    pub fn heal(&self, domain: &str) {
        self.inner.rejected.lock().unwrap().remove(domain);
        self.inner.unreachable.lock().unwrap().remove(domain);
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.inner.calls.lock().unwrap().clear();
    }

    /// Domains that received a create or update
    pub fn written_domains(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(_, name, _) | Call::Update(_, name, _, _) => Some(name),
                Call::Lookup(..) => None,
            })
            .collect()
    }

    /// Current remote content of a record
    pub fn content(&self, record_type: RecordType, name: &str) -> Option<String> {
        self.inner
            .records
            .lock()
            .unwrap()
            .get(&(record_type, name.to_string()))
            .and_then(|records| records.first())
            .map(|record| record.content.clone())
    }

    fn check(&self, domain: &str) -> Result<()> {
        if self.inner.unreachable.lock().unwrap().contains(domain) {
            return Err(Error::transport("connection refused"));
        }
        if self.inner.rejected.lock().unwrap().contains(domain) {
            return Err(Error::rejected(
                Some(9109),
                Some("Invalid access token".to_string()),
                Some(403),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DnsProvider for ScriptedDnsProvider {
    async fn lookup(&self, record_type: RecordType, name: &str) -> Result<Vec<DnsRecord>> {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push(Call::Lookup(record_type, name.to_string()));
        self.check(name)?;

        Ok(self
            .inner
            .records
            .lock()
            .unwrap()
            .get(&(record_type, name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn create(&self, record_type: RecordType, name: &str, ip: IpAddr) -> Result<DnsRecord> {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push(Call::Create(record_type, name.to_string(), ip));
        self.check(name)?;

        let id = format!("created-{}", self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let record = DnsRecord {
            id,
            record_type: record_type.to_string(),
            name: name.to_string(),
            content: ip.to_string(),
            ttl: Some(120),
        };
        if self.is_dry_run() {
            return Ok(record);
        }
        self.inner
            .records
            .lock()
            .unwrap()
            .entry((record_type, name.to_string()))
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        record_type: RecordType,
        name: &str,
        ip: IpAddr,
        record_id: &str,
    ) -> Result<DnsRecord> {
        self.inner.calls.lock().unwrap().push(Call::Update(
            record_type,
            name.to_string(),
            ip,
            record_id.to_string(),
        ));
        self.check(name)?;

        if self.is_dry_run() {
            return Ok(DnsRecord {
                id: record_id.to_string(),
                record_type: record_type.to_string(),
                name: name.to_string(),
                content: ip.to_string(),
                ttl: Some(120),
            });
        }

        let mut records = self.inner.records.lock().unwrap();
        let record = records
            .get_mut(&(record_type, name.to_string()))
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| Error::rejected(Some(81044), Some("Record not found".into()), Some(404)))?;
        record.content = ip.to_string();
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn is_dry_run(&self) -> bool {
        self.inner.dry_run.load(Ordering::SeqCst)
    }
}

/// A state store whose writes fail while `fail_saves` is set
///
/// Loads come from an in-memory document that only successful saves update.
#[derive(Clone, Default)]
pub struct FailingStateStore {
    inner: MemoryStateStore,
    fail_saves: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl FailingStateStore {
    /// A store that rejects every save until [`Self::fail_saves`] says otherwise
    pub fn new() -> Self {
        let store = Self::default();
        store.fail_saves(true);
        store
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Saves attempted, successful or not
    pub fn save_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> SyncState {
        self.inner.snapshot().await
    }
}

#[async_trait::async_trait]
impl StateStore for FailingStateStore {
    async fn load(&self) -> Result<SyncState> {
        self.inner.load().await
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::state_store("No space left on device"));
        }
        self.inner.save(state).await
    }
}

/// An address source returning whatever the test last set
#[derive(Clone)]
pub struct StaticAddressSource {
    pair: Arc<Mutex<AddressPair>>,
    fail: Arc<Mutex<bool>>,
    calls: Arc<AtomicUsize>,
}

impl StaticAddressSource {
    pub fn new(ipv4: Option<&str>, ipv6: Option<&str>) -> Self {
        let source = Self {
            pair: Arc::new(Mutex::new(AddressPair::default())),
            fail: Arc::new(Mutex::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        source.set(ipv4, ipv6);
        source
    }

    pub fn set(&self, ipv4: Option<&str>, ipv6: Option<&str>) {
        *self.pair.lock().unwrap() = AddressPair::new(
            ipv4.map(|ip| ip.parse().unwrap()),
            ipv6.map(|ip| ip.parse().unwrap()),
        );
    }

    /// Make `current()` fail as if the OS query broke
    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressSource for StaticAddressSource {
    async fn current(&self) -> Result<AddressPair> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(Error::interface("getifaddrs failed"));
        }
        Ok(*self.pair.lock().unwrap())
    }

    fn interface(&self) -> &str {
        "eth-test"
    }
}

/// Helper to create a config managing `domains` with both families enabled
pub fn config_for(domains: &[&str]) -> DdnsConfig {
    DdnsConfig::builder()
        .zone_id("test-zone")
        .authorization_key("test-token")
        .network_interface("eth-test")
        .domain_names(domains.iter().copied())
        .ipv4_ddns(true)
        .ipv6_ddns(true)
        .update_interval_secs(1)
        .state_file("/nonexistent/status.dat")
        .build()
        .expect("valid test config")
}

pub fn names(domains: &[&str]) -> Vec<String> {
    domains.iter().map(|d| d.to_string()).collect()
}

pub fn ip(text: &str) -> IpAddr {
    text.parse().unwrap()
}

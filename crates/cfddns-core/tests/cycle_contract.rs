//! Contract Test: Cycle Orchestration & State Persistence
//!
//! Constraints verified:
//! - An absent address never erases what was recorded for that family
//! - A missing state file means "nothing synced yet", not a failure
//! - A corrupt state file degrades to empty state and is overwritten
//! - Disabled families make no remote calls
//! - State is saved even when some domains failed
//! - A failed state write loses only durability; the next cycle redoes the work
//! - Dry-run writes are never recorded as confirmed
//!
//! If this test fails, restarts or outages cause lost or phantom progress.

mod common;

use cfddns_core::traits::{FamilyState, StateStore, SyncState};
use cfddns_core::{DdnsEngine, DdnsConfig, EngineEvent, FileStateStore, MemoryStateStore, RecordType};
use common::*;

fn engine(
    source: &StaticAddressSource,
    provider: &ScriptedDnsProvider,
    store: Box<dyn StateStore>,
    config: DdnsConfig,
) -> (DdnsEngine, tokio::sync::mpsc::Receiver<EngineEvent>) {
    DdnsEngine::new(
        Box::new(source.clone()),
        Box::new(provider.clone()),
        store,
        config,
    )
    .expect("engine construction succeeds")
}

#[tokio::test]
async fn absent_address_keeps_previous_family_state() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();
    let seeded = SyncState {
        ipv4: FamilyState::default(),
        ipv6: FamilyState::new(Some(ip("2001:db8::1")), names(&["a.example.com"])),
    };
    let store = MemoryStateStore::with_state(seeded.clone());

    let (engine, _rx) = engine(
        &source,
        &provider,
        Box::new(store.clone()),
        config_for(&["a.example.com"]),
    );
    let report = engine.run_cycle().await;

    assert_eq!(report.state.ipv6, seeded.ipv6);
    assert_eq!(store.snapshot().await.ipv6, seeded.ipv6);
    assert!(
        provider
            .calls()
            .iter()
            .all(|call| !matches!(call, Call::Lookup(RecordType::Aaaa, _)))
    );
}

#[tokio::test]
async fn address_read_failure_makes_no_calls_and_keeps_state() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), Some("2001:db8::1"));
    source.fail(true);
    let provider = ScriptedDnsProvider::new();
    let seeded = SyncState {
        ipv4: FamilyState::new(Some(ip("1.2.3.4")), names(&["a.example.com"])),
        ipv6: FamilyState::default(),
    };
    let store = MemoryStateStore::with_state(seeded.clone());

    let (engine, _rx) = engine(
        &source,
        &provider,
        Box::new(store.clone()),
        config_for(&["a.example.com"]),
    );
    let report = engine.run_cycle().await;

    assert!(provider.calls().is_empty());
    assert_eq!(report.state, seeded);
    assert!(report.state_saved);
}

#[tokio::test]
async fn missing_state_file_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("status.dat");
    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();

    let (engine, _rx) = engine(
        &source,
        &provider,
        Box::new(FileStateStore::new(&path)),
        config_for(&["a.example.com", "b.example.com"]),
    );
    let report = engine.run_cycle().await;

    assert!(report.failed.is_empty());
    assert!(report.state_saved);
    assert_eq!(
        provider.written_domains(),
        names(&["a.example.com", "b.example.com"])
    );

    let persisted = FileStateStore::new(&path).load().await.unwrap();
    assert_eq!(persisted.ipv4.last_ip, Some(ip("1.2.3.4")));
    assert_eq!(
        persisted.ipv4.last_update_domains,
        names(&["a.example.com", "b.example.com"])
    );
}

#[tokio::test]
async fn corrupt_state_file_falls_back_to_empty_and_is_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.dat");
    std::fs::write(&path, "{ not json").unwrap();

    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();

    let (engine, _rx) = engine(
        &source,
        &provider,
        Box::new(FileStateStore::new(&path)),
        config_for(&["a.example.com"]),
    );
    let report = engine.run_cycle().await;

    assert_eq!(provider.written_domains(), names(&["a.example.com"]));
    assert!(report.state_saved);

    let persisted = FileStateStore::new(&path).load().await.unwrap();
    assert_eq!(persisted.ipv4.last_update_domains, names(&["a.example.com"]));
}

#[tokio::test]
async fn disabled_family_makes_no_calls() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), Some("2001:db8::1"));
    let provider = ScriptedDnsProvider::new();
    let store = MemoryStateStore::new();
    let config = DdnsConfig::builder()
        .zone_id("zone")
        .authorization_key("token")
        .network_interface("eth-test")
        .domain_names(["a.example.com"])
        .ipv4_ddns(true)
        .ipv6_ddns(false)
        .build()
        .unwrap();

    let (engine, mut rx) = engine(&source, &provider, Box::new(store.clone()), config);
    let report = engine.run_cycle().await;

    assert!(
        provider
            .calls()
            .iter()
            .all(|call| !matches!(call, Call::Lookup(RecordType::Aaaa, _)))
    );
    assert_eq!(report.state.ipv6.last_ip, Some(ip("2001:db8::1")));
    assert!(report.state.ipv6.last_update_domains.is_empty());

    let mut skipped = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(
            event,
            EngineEvent::FamilySkipped {
                record_type: RecordType::Aaaa,
                ..
            }
        ) {
            skipped = true;
        }
    }
    assert!(skipped, "disabled family should emit FamilySkipped");
}

#[tokio::test]
async fn state_is_saved_after_partial_failure() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();
    provider.reject("b.example.com");
    let store = MemoryStateStore::new();

    let (engine, _rx) = engine(
        &source,
        &provider,
        Box::new(store.clone()),
        config_for(&["a.example.com", "b.example.com"]),
    );
    let report = engine.run_cycle().await;

    assert_eq!(report.failed, vec![(RecordType::A, "b.example.com".to_string())]);
    assert_eq!(store.save_count(), 1);
    assert_eq!(
        store.snapshot().await.ipv4.last_update_domains,
        names(&["a.example.com"])
    );
}

#[tokio::test]
async fn failed_domain_converges_on_later_cycle() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();
    provider.unreachable("b.example.com");
    let store = MemoryStateStore::new();

    let (engine, _rx) = engine(
        &source,
        &provider,
        Box::new(store.clone()),
        config_for(&["a.example.com", "b.example.com"]),
    );
    engine.run_cycle().await;

    provider.heal("b.example.com");
    provider.clear_calls();
    let report = engine.run_cycle().await;

    assert_eq!(provider.written_domains(), names(&["b.example.com"]));
    assert!(report.failed.is_empty());
    assert_eq!(
        store.snapshot().await.ipv4.last_update_domains,
        names(&["a.example.com", "b.example.com"])
    );
}

#[tokio::test]
async fn address_change_resyncs_all_domains() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();
    let store = MemoryStateStore::new();

    let (engine, _rx) = engine(
        &source,
        &provider,
        Box::new(store.clone()),
        config_for(&["a.example.com", "b.example.com"]),
    );
    engine.run_cycle().await;
    provider.clear_calls();

    source.set(Some("5.6.7.8"), None);
    engine.run_cycle().await;

    assert_eq!(
        provider.written_domains(),
        names(&["a.example.com", "b.example.com"])
    );
    assert_eq!(
        provider.content(RecordType::A, "a.example.com").as_deref(),
        Some("5.6.7.8")
    );
    assert_eq!(store.snapshot().await.ipv4.last_ip, Some(ip("5.6.7.8")));
}

#[tokio::test]
async fn failed_state_write_is_reported_and_work_is_redone() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();
    let store = FailingStateStore::new();

    let (engine, mut rx) = engine(
        &source,
        &provider,
        Box::new(store.clone()),
        config_for(&["a.example.com", "b.example.com"]),
    );
    let report = engine.run_cycle().await;

    assert!(!report.state_saved);
    assert!(report.failed.is_empty());
    assert_eq!(
        report.state.ipv4.last_update_domains,
        names(&["a.example.com", "b.example.com"])
    );
    assert_eq!(
        provider.written_domains(),
        names(&["a.example.com", "b.example.com"])
    );
    assert_eq!(store.snapshot().await, SyncState::default());

    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::CycleCompleted { state_saved, .. } = event {
            completed = Some(state_saved);
        }
    }
    assert_eq!(completed, Some(false));

    provider.clear_calls();
    store.fail_saves(false);
    let report = engine.run_cycle().await;

    assert!(report.state_saved);
    assert_eq!(store.save_attempts(), 2);
    assert_eq!(
        provider.written_domains(),
        names(&["a.example.com", "b.example.com"])
    );
    assert_eq!(
        store.snapshot().await.ipv4.last_update_domains,
        names(&["a.example.com", "b.example.com"])
    );
}

#[tokio::test]
async fn dry_run_cycle_leaves_domains_unconfirmed() {
    let source = StaticAddressSource::new(Some("1.2.3.4"), None);
    let provider = ScriptedDnsProvider::new();
    provider.set_dry_run(true);
    let store = MemoryStateStore::new();

    let (engine, mut rx) = engine(
        &source,
        &provider,
        Box::new(store.clone()),
        config_for(&["a.example.com"]),
    );
    let report = engine.run_cycle().await;

    assert!(report.failed.is_empty());
    assert!(report.state.ipv4.last_update_domains.is_empty());
    assert_eq!(provider.content(RecordType::A, "a.example.com"), None);

    let mut simulated = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::RecordSimulated { domain, .. } = event {
            simulated.push(domain);
        }
    }
    assert_eq!(simulated, names(&["a.example.com"]));

    provider.set_dry_run(false);
    provider.clear_calls();
    engine.run_cycle().await;

    assert_eq!(provider.written_domains(), names(&["a.example.com"]));
    assert_eq!(
        provider.content(RecordType::A, "a.example.com").as_deref(),
        Some("1.2.3.4")
    );
    assert_eq!(
        store.snapshot().await.ipv4.last_update_domains,
        names(&["a.example.com"])
    );
}

//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Reading the interface addresses via AddressSource
//! - Loading sync progress from the StateStore
//! - Running the update planner per enabled address family
//! - Persisting the new state at the end of every cycle
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐      ┌─────────────┐
//! │ AddressSource │      │ StateStore  │
//! │ (resolve)     │      │ (load/save) │
//! └───────────────┘      └─────────────┘
//!          │                    │
//!          ▼                    ▼
//!        ┌────────────────────────┐
//!        │       DdnsEngine       │── EngineEvent ──▶ monitoring
//!        └────────────────────────┘
//!                    │
//!                    ▼
//!        ┌────────────────────────┐      ┌─────────────┐
//!        │        planner         │─────▶│ DnsProvider │
//!        └────────────────────────┘      └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve the address pair (failure: both families absent)
//! 2. Load state (failure: empty state)
//! 3. Per enabled family with an address: plan and apply
//! 4. Assemble the new document and save it, even after partial failure
//!
//! Nothing in a cycle stops the engine; the next tick retries.

use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::{DdnsConfig, RecordType};
use crate::error::{Error, ErrorKind, Result};
use crate::planner::{self, DomainOutcome};
use crate::traits::{AddressPair, AddressSource, DnsProvider, FamilyState, StateStore, SyncState};

/// Default capacity of the engine event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Why an address family was left untouched this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The family is not enabled in configuration
    Disabled,
    /// The interface has no global address of this family
    NoAddress,
}

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        domains_count: usize,
        interval_secs: u64,
    },

    /// A cycle began
    CycleStarted { cycle: u64 },

    /// Interface addresses were read
    AddressResolved { pair: AddressPair },

    /// A family was not planned this cycle
    FamilySkipped {
        record_type: RecordType,
        reason: SkipReason,
    },

    /// A missing record was created
    RecordCreated {
        domain: String,
        record_type: RecordType,
        ip: IpAddr,
    },

    /// An existing record was updated
    RecordUpdated {
        domain: String,
        record_type: RecordType,
        ip: IpAddr,
    },

    /// Dry-run: the write was logged, not sent; the domain stays unconfirmed
    RecordSimulated {
        domain: String,
        record_type: RecordType,
        ip: IpAddr,
    },

    /// Syncing a record failed; it will be retried next cycle
    RecordFailed {
        domain: String,
        record_type: RecordType,
        kind: ErrorKind,
        error: String,
    },

    /// A cycle finished
    CycleCompleted {
        cycle: u64,
        failures: usize,
        state_saved: bool,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// Summary of one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// The state document produced by the cycle
    pub state: SyncState,
    /// Domains whose sync failed, per record type
    pub failed: Vec<(RecordType, String)>,
    /// Whether the state document was written successfully
    pub state_saved: bool,
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`], or drive single cycles with
///    [`DdnsEngine::run_cycle()`]
/// 3. `run()` returns after a shutdown signal is observed between cycles
///
/// ## Threading
///
/// Cycles run one at a time on the calling task. Ticks that come due while a
/// cycle is still running are delayed, never overlapped.
pub struct DdnsEngine {
    /// Address source for the configured interface
    address_source: Box<dyn AddressSource>,

    /// DNS provider for record writes
    provider: Box<dyn DnsProvider>,

    /// State store for idempotency
    state_store: Box<dyn StateStore>,

    /// Immutable configuration
    config: DdnsConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,

    /// Number of cycles started so far
    cycles: std::sync::atomic::AtomicU64,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        address_source: Box<dyn AddressSource>,
        provider: Box<dyn DnsProvider>,
        state_store: Box<dyn StateStore>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        Self::with_event_capacity(
            address_source,
            provider,
            state_store,
            config,
            DEFAULT_EVENT_CHANNEL_CAPACITY,
        )
    }

    /// Create a new DDNS engine with a custom event channel capacity
    ///
    /// When the channel is full, new events are dropped with a warning.
    pub fn with_event_capacity(
        address_source: Box<dyn AddressSource>,
        provider: Box<dyn DnsProvider>,
        state_store: Box<dyn StateStore>,
        config: DdnsConfig,
        event_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;
        if event_capacity == 0 {
            return Err(Error::config("event channel capacity must be > 0"));
        }

        let (tx, rx) = mpsc::channel(event_capacity);

        let engine = Self {
            address_source,
            provider,
            state_store,
            config,
            event_tx: tx,
            cycles: std::sync::atomic::AtomicU64::new(0),
        };

        Ok((engine, rx))
    }

    /// The configuration the engine was built with
    pub fn config(&self) -> &DdnsConfig {
        &self.config
    }

    /// Run the engine
    ///
    /// Runs one cycle immediately, then one per configured interval, until
    /// Ctrl-C (or SIGTERM on Unix) is received between cycles.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(Box::pin(shutdown_signal())).await
    }

    /// Run the engine until `shutdown` resolves
    ///
    /// Used by embedders and tests that own their shutdown trigger.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        self.run_internal(Box::pin(shutdown)).await
    }

    async fn run_internal(
        &self,
        mut shutdown: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>>,
    ) -> Result<()> {
        let interval_secs = self.config.update_interval_secs;

        self.emit_event(EngineEvent::Started {
            domains_count: self.config.domain_names.len(),
            interval_secs,
        });
        info!(
            "Scheduling sync every {}s for {} domain(s) on interface {}",
            interval_secs,
            self.config.domain_names.len(),
            self.address_source.interface()
        );

        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        loop {
            tokio::select! {
                // Polled first so a pending shutdown wins over a due tick
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                Some(_) = ticks.next() => {
                    self.run_cycle().await;
                }
            }
        }

        Ok(())
    }

    /// Run one full resolve → plan → apply → persist cycle
    ///
    /// Never fails: every error is logged and contained.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self
            .cycles
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        self.emit_event(EngineEvent::CycleStarted { cycle });

        let interface = self.address_source.interface();
        let pair = match self.address_source.current().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Failed to read addresses of interface [{}]: {}", interface, e);
                AddressPair::default()
            }
        };
        info!(
            "Interface [{}]: public IPv4 [{}] public IPv6 [{}]",
            interface,
            display_opt(pair.ipv4),
            display_opt(pair.ipv6)
        );
        self.emit_event(EngineEvent::AddressResolved { pair });

        let previous = self.load_state().await;

        let mut next = SyncState::default();
        let mut failed = Vec::new();

        for record_type in [RecordType::A, RecordType::Aaaa] {
            let family = self
                .sync_family(record_type, pair.get(record_type), previous.family(record_type))
                .await;
            failed.extend(family.failed.into_iter().map(|d| (record_type, d)));
            *next.family_mut(record_type) = family.state;
        }

        let state_saved = match self.state_store.save(&next).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save sync state: {}", e);
                false
            }
        };

        self.emit_event(EngineEvent::CycleCompleted {
            cycle,
            failures: failed.len(),
            state_saved,
        });
        debug!("Cycle {} completed ({} failure(s))", cycle, failed.len());

        CycleReport {
            state: next,
            failed,
            state_saved,
        }
    }

    /// Load persisted state, falling back to empty state
    async fn load_state(&self) -> SyncState {
        match self.state_store.load().await {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to load sync state, starting from empty state: {}", e);
                SyncState::default()
            }
        }
    }

    /// Plan one family and build its next state entry
    async fn sync_family(
        &self,
        record_type: RecordType,
        current_ip: Option<IpAddr>,
        previous: &FamilyState,
    ) -> FamilySync {
        let Some(ip) = current_ip else {
            if self.config.is_enabled(record_type) {
                warn!(
                    "No public {} address on interface [{}], keeping previous state",
                    family_name(record_type),
                    self.address_source.interface()
                );
            }
            self.emit_event(EngineEvent::FamilySkipped {
                record_type,
                reason: SkipReason::NoAddress,
            });
            return FamilySync::carried_over(previous);
        };

        if !self.config.is_enabled(record_type) {
            self.emit_event(EngineEvent::FamilySkipped {
                record_type,
                reason: SkipReason::Disabled,
            });
            return FamilySync {
                state: FamilyState::new(Some(ip), Vec::new()),
                failed: Vec::new(),
            };
        }

        let outcome = planner::plan_and_apply(
            self.provider.as_ref(),
            previous,
            record_type,
            ip,
            &self.config.domain_names,
        )
        .await;

        let mut failed = Vec::new();
        for (domain, result) in outcome.results {
            let event = match result {
                DomainOutcome::Created(_) => EngineEvent::RecordCreated {
                    domain,
                    record_type,
                    ip,
                },
                DomainOutcome::Updated(_) => EngineEvent::RecordUpdated {
                    domain,
                    record_type,
                    ip,
                },
                DomainOutcome::Simulated(_) => EngineEvent::RecordSimulated {
                    domain,
                    record_type,
                    ip,
                },
                DomainOutcome::Failed(e) => {
                    failed.push(domain.clone());
                    EngineEvent::RecordFailed {
                        domain,
                        record_type,
                        kind: e.kind(),
                        error: e.to_string(),
                    }
                }
            };
            self.emit_event(event);
        }

        FamilySync {
            state: FamilyState::new(Some(ip), outcome.updated_domains),
            failed,
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // A closed channel means nobody is listening; that is fine
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider draining engine events faster.");
        }
    }
}

/// Next state of one family plus the domains that failed
struct FamilySync {
    state: FamilyState,
    failed: Vec<String>,
}

impl FamilySync {
    fn carried_over(previous: &FamilyState) -> Self {
        Self {
            state: previous.clone(),
            failed: Vec::new(),
        }
    }
}

fn family_name(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::A => "IPv4",
        RecordType::Aaaa => "IPv6",
    }
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Wait for SIGINT/SIGTERM (SIGINT only off Unix)
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = wait_for_ctrl_c(tokio::signal::ctrl_c()) => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                wait_for_ctrl_c(tokio::signal::ctrl_c()).await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_ctrl_c(tokio::signal::ctrl_c()).await;
    }
}

/// Resolve on SIGINT; never resolve if the handler cannot be installed
async fn wait_for_ctrl_c<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for SIGINT, ignoring it from now on: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_equality() {
        let event = EngineEvent::RecordCreated {
            domain: "example.com".to_string(),
            record_type: RecordType::A,
            ip: IpAddr::from([1, 2, 3, 4]),
        };

        assert_eq!(event.clone(), event);
    }

    #[tokio::test]
    async fn test_ctrl_c_listener_failure_never_resolves() {
        let failed = async { Err(std::io::Error::other("no signal driver")) };
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for_ctrl_c(failed)).await;
        assert!(waited.is_err(), "a failed listener must not trigger shutdown");
    }

    #[tokio::test]
    async fn test_ctrl_c_received_resolves() {
        let received = async { Ok(()) };
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for_ctrl_c(received)).await;
        assert!(waited.is_ok());
    }

    #[test]
    fn test_display_opt() {
        assert_eq!(display_opt::<IpAddr>(None), "");
        assert_eq!(display_opt(Some(IpAddr::from([1, 2, 3, 4]))), "1.2.3.4");
    }
}

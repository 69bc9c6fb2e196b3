//! Update planner
//!
//! Decides which domains need a remote write for one address family, performs
//! the writes in order, and folds the outcomes into the domain set that will
//! be persisted.
//!
//! ## Decision Rule
//!
//! 1. Address unchanged: only domains not yet confirmed for it are candidates.
//! 2. Address changed (or never recorded): every configured domain is a
//!    candidate.
//! 3. No candidates: no remote calls.
//! 4. Each candidate is looked up, then created (no record) or updated (first
//!    matching record). A failure is logged and the next domain proceeds.
//!
//! A provider in dry-run mode answers writes without sending them. Those
//! outcomes are reported as simulated and never confirmed, so switching to
//! real mode at the same address still writes every domain.
//!
//! Confirmed domains are never re-checked against the provider while the
//! address is unchanged, so a record edited out-of-band stays wrong until the
//! address changes.

use std::net::IpAddr;
use tracing::{debug, error, info};

use crate::config::RecordType;
use crate::error::Error;
use crate::traits::{DnsProvider, DnsRecord, FamilyState};

/// What happened to one candidate domain
#[derive(Debug)]
pub enum DomainOutcome {
    /// No record existed; one was created
    Created(DnsRecord),
    /// An existing record was overwritten
    Updated(DnsRecord),
    /// The provider is in dry-run mode; the write was logged, not sent
    Simulated(DnsRecord),
    /// Lookup, create or update failed
    Failed(Error),
}

impl DomainOutcome {
    /// Whether the write went through, or would have in dry-run mode
    pub fn is_success(&self) -> bool {
        !matches!(self, DomainOutcome::Failed(_))
    }

    /// Whether the domain now really points at the current address
    pub fn is_confirmed(&self) -> bool {
        matches!(self, DomainOutcome::Created(_) | DomainOutcome::Updated(_))
    }
}

/// Result of planning and applying one address family
#[derive(Debug, Default)]
pub struct PlanOutcome {
    /// Domains confirmed for the current address, to be persisted
    pub updated_domains: Vec<String>,
    /// Per-candidate outcomes, in the order they were attempted
    pub results: Vec<(String, DomainOutcome)>,
}

impl PlanOutcome {
    /// Number of candidates that failed this cycle
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, o)| !o.is_success()).count()
    }
}

/// Domains that need a remote write this cycle, in configured order
pub fn candidates(state: &FamilyState, current_ip: IpAddr, domains: &[String]) -> Vec<String> {
    if state.last_ip == Some(current_ip) {
        domains
            .iter()
            .filter(|domain| !state.is_synced(domain))
            .cloned()
            .collect()
    } else {
        domains.to_vec()
    }
}

/// Plan and apply one address family against `provider`
///
/// The returned `updated_domains` starts from the previously confirmed set
/// when the address is unchanged, and from nothing when it changed, then
/// gains every candidate whose write was confirmed.
pub async fn plan_and_apply(
    provider: &dyn DnsProvider,
    state: &FamilyState,
    record_type: RecordType,
    current_ip: IpAddr,
    domains: &[String],
) -> PlanOutcome {
    let to_update = candidates(state, current_ip, domains);

    let mut outcome = PlanOutcome {
        updated_domains: if state.last_ip == Some(current_ip) {
            state.last_update_domains.clone()
        } else {
            Vec::new()
        },
        results: Vec::with_capacity(to_update.len()),
    };

    if to_update.is_empty() {
        info!(record_type = %record_type, ip = %current_ip, "No domains need updating");
        return outcome;
    }

    debug!(
        record_type = %record_type,
        ip = %current_ip,
        "{} domain(s) to sync: {:?}",
        to_update.len(),
        to_update
    );

    for domain in to_update {
        let result = sync_domain(provider, record_type, &domain, current_ip).await;

        if result.is_confirmed() {
            if !outcome.updated_domains.contains(&domain) {
                outcome.updated_domains.push(domain.clone());
            }
        } else if let DomainOutcome::Failed(e) = &result {
            error!(
                domain = %domain,
                record_type = %record_type,
                kind = ?e.kind(),
                "Failed to sync DNS record: {}",
                e
            );
        }

        outcome.results.push((domain, result));
    }

    outcome
}

/// Look up one domain, then create or update its record
async fn sync_domain(
    provider: &dyn DnsProvider,
    record_type: RecordType,
    domain: &str,
    ip: IpAddr,
) -> DomainOutcome {
    let dry_run = provider.is_dry_run();
    let existing = match provider.lookup(record_type, domain).await {
        Ok(records) => records,
        Err(e) => return DomainOutcome::Failed(e),
    };

    match existing.first() {
        None => {
            info!(domain = %domain, record_type = %record_type, "Record does not exist, creating -> {}", ip);
            match provider.create(record_type, domain, ip).await {
                Ok(record) if dry_run => DomainOutcome::Simulated(record),
                Ok(record) => DomainOutcome::Created(record),
                Err(e) => DomainOutcome::Failed(e),
            }
        }
        Some(record) => {
            info!(
                domain = %domain,
                record_type = %record_type,
                record_id = %record.id,
                "Record exists, updating {} -> {}",
                record.content,
                ip
            );
            match provider.update(record_type, domain, ip, &record.id).await {
                Ok(record) if dry_run => DomainOutcome::Simulated(record),
                Ok(record) => DomainOutcome::Updated(record),
                Err(e) => DomainOutcome::Failed(e),
            }
        }
    }
}

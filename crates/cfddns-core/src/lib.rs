// # cfddns-core
//
// Core library for the interface-driven Cloudflare DDNS agent.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **AddressSource**: Trait for reading the public addresses of an interface
// - **DnsProvider**: Trait for looking up, creating and updating DNS records
// - **StateStore**: Trait for persisting sync progress (idempotency)
// - **planner**: Decides which domains need a write and applies them
// - **DdnsEngine**: Runs the resolve → plan → apply → persist cycle on a timer
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from I/O implementations
// 2. **Partial failure is normal**: One domain failing never affects another
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: A domain confirmed for an unchanged address is not written again

pub mod traits;
pub mod engine;
pub mod planner;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{AddressPair, AddressSource, DnsProvider, DnsRecord, FamilyState, StateStore, SyncState};
pub use engine::{CycleReport, DdnsEngine, EngineEvent};
pub use config::{DdnsConfig, RecordType};
pub use error::{Error, ErrorKind, Result};
pub use state::{FileStateStore, MemoryStateStore};

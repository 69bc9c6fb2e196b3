// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Provides a simple state store that doesn't persist across restarts.
// Useful for testing and for embedding the engine where a restart may
// safely re-write every domain once.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First cycle after a restart treats every domain as unsynced

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateStore, SyncState};

/// In-memory state store implementation
///
/// Clones share the same underlying document.
///
/// # Example
///
/// ```rust,no_run
/// use cfddns_core::state::MemoryStateStore;
/// use cfddns_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///
///     let mut state = store.load().await?;
///     state.ipv4.last_ip = Some("203.0.113.7".parse()?);
///     store.save(&state).await?;
///
///     assert_eq!(store.snapshot().await.ipv4.last_ip, state.ipv4.last_ip);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<SyncState>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with `state`
    pub fn with_state(state: SyncState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Copy of the current document
    pub async fn snapshot(&self) -> SyncState {
        self.inner.read().await.clone()
    }

    /// Number of times `save` has been called
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SyncState, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, state: &SyncState) -> Result<(), Error> {
        *self.inner.write().await = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

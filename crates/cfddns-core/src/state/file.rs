// # File State Store
//
// File-based implementation of StateStore.
//
// ## Purpose
//
// Keeps sync progress across daemon restarts so that domains already
// confirmed for the current address are not written again.
//
// ## Durability
//
// - Atomic writes: the document is written to a sibling temp file, then
//   renamed over the real one
// - Parent directories are created on first save
// - A missing file loads as empty state; an unreadable or corrupt file is
//   reported as an error so the caller can log it and fall back
//
// ## File Format
//
// ```json
// {
//   "ipv4": {
//     "last_ip": "203.0.113.7",
//     "last_update_domains": ["example.com", "www.example.com"],
//     "last_updated": "2025-01-09T12:00:00Z"
//   },
//   "ipv6": {
//     "last_ip": null,
//     "last_update_domains": []
//   }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::traits::state_store::{StateStore, SyncState};

/// File-based state store
///
/// # Example
///
/// ```rust,no_run
/// use cfddns_core::state::FileStateStore;
/// use cfddns_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/tmp/cloudflare-ddns/status.dat");
///
///     let mut state = store.load().await?;
///     state.ipv4.last_ip = Some("203.0.113.7".parse()?);
///     store.save(&state).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store backed by `path`
    ///
    /// Nothing touches the filesystem until the first `load` or `save`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the state document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    async fn ensure_parent_dir(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<SyncState, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("State file does not exist: {}", self.path.display());
                return Ok(SyncState::default());
            }
            Err(e) => {
                return Err(Error::state_store(format!(
                    "Failed to read state file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let state: SyncState = serde_json::from_str(&content).map_err(|e| {
            Error::state_store(format!(
                "Failed to parse state file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            "Loaded state: ipv4={:?} ({} domains), ipv6={:?} ({} domains)",
            state.ipv4.last_ip,
            state.ipv4.last_update_domains.len(),
            state.ipv6.last_ip,
            state.ipv6.last_update_domains.len()
        );
        Ok(state)
    }

    async fn save(&self, state: &SyncState) -> Result<(), Error> {
        self.ensure_parent_dir().await?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FamilyState;
    use tempfile::tempdir;

    fn sample_state() -> SyncState {
        SyncState {
            ipv4: FamilyState::new(
                Some("1.2.3.4".parse().unwrap()),
                vec!["a.example.com".to_string()],
            ),
            ipv6: FamilyState::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("absent").join("status.dat"));

        let state = store.load().await.unwrap();
        assert_eq!(state, SyncState::default());
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cloudflare-ddns").join("status.dat");
        let store = FileStateStore::new(&path);

        let state = sample_state();
        store.save(&state).await.unwrap();
        assert!(path.exists());
        assert!(!store.temp_path().exists(), "temp file must be renamed away");

        let reloaded = FileStateStore::new(&path).load().await.unwrap();
        assert_eq!(reloaded, state);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.dat");
        fs::write(&path, b"corrupted json data").await.unwrap();

        let err = FileStateStore::new(&path).load().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StateStore);
    }

    #[tokio::test]
    async fn test_save_replaces_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.dat");
        let store = FileStateStore::new(&path);

        store.save(&sample_state()).await.unwrap();
        store.save(&SyncState::default()).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, SyncState::default());
    }

    #[tokio::test]
    async fn test_loads_document_written_by_older_agents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.dat");
        fs::write(
            &path,
            br#"{"ipv4": {"last_ip": "1.2.3.4", "last_update_domains": ["a.example.com"]},
                 "ipv6": {"last_ip": null, "last_update_domains": null}}"#,
        )
        .await
        .unwrap();

        let state = FileStateStore::new(&path).load().await.unwrap();
        assert_eq!(state.ipv4.last_ip, Some("1.2.3.4".parse().unwrap()));
        assert_eq!(state.ipv4.last_update_domains, vec!["a.example.com"]);
        assert!(state.ipv6.last_update_domains.is_empty());
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Durable storage for the last good [`Snapshot`].
//!
//! Exactly one snapshot blob is kept and overwritten on every successful
//! live refresh. Backends implement [`SnapshotStore`] and may fail; the
//! refresh cycle only ever talks to them through [`PersistenceGateway`],
//! which turns every failure into a logged `false`/`None`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `PERSISTENCE_BACKEND` | `remote` | `remote` or `file` |
//! | `PERSISTENCE_API_URL` | `https://ejitech.co.mz/data-api.php` | Remote store endpoint |
//! | `PERSISTENCE_PATH` | `data/snapshot.json` | File store location |
//! | `PERSISTENCE_TIMEOUT` | `30000` | Remote store timeout in milliseconds |

pub mod file;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tender_watch_tender_models::Snapshot;

pub use file::FileStore;
pub use remote::RemoteStore;

/// Default remote store endpoint.
pub const DEFAULT_API_URL: &str = "https://ejitech.co.mz/data-api.php";

/// Default file store location.
pub const DEFAULT_PATH: &str = "data/snapshot.json";

/// Errors that can occur while reading or writing the durable snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The remote store could not be reached or answered with an error.
    #[error("Remote store error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored blob is not a valid snapshot.
    #[error("Invalid snapshot blob: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

/// A durable holder of exactly one snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Human-readable location of the store, used in log messages.
    fn location(&self) -> String;

    /// Reads the stored snapshot. `Ok(None)` means nothing has been stored
    /// yet.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the store cannot be read or holds an
    /// invalid blob.
    async fn read(&self) -> Result<Option<Snapshot>, PersistenceError>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot cannot be written.
    async fn write(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
}

/// Best-effort facade over a [`SnapshotStore`].
///
/// Failures are logged and reported as `false`/`None`, never propagated.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn SnapshotStore>,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("store", &self.store.location())
            .finish()
    }
}

impl PersistenceGateway {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Saves `snapshot`, returning whether it was written.
    pub async fn save(&self, snapshot: &Snapshot) -> bool {
        match self.store.write(snapshot).await {
            Ok(()) => {
                log::info!(
                    "Saved snapshot with {} records to {}",
                    snapshot.total_records(),
                    self.store.location()
                );
                true
            }
            Err(e) => {
                log::error!("Failed to save snapshot to {}: {e}", self.store.location());
                false
            }
        }
    }

    /// Loads the stored snapshot. `None` covers both "nothing stored" and
    /// "store unreadable".
    pub async fn load(&self) -> Option<Snapshot> {
        match self.store.read().await {
            Ok(Some(snapshot)) => {
                log::info!(
                    "Loaded snapshot from {} generated at {}",
                    self.store.location(),
                    snapshot.generated_at()
                );
                Some(snapshot)
            }
            Ok(None) => {
                log::info!("No snapshot stored at {}", self.store.location());
                None
            }
            Err(e) => {
                log::error!(
                    "Failed to load snapshot from {}: {e}",
                    self.store.location()
                );
                None
            }
        }
    }
}

/// Which backend to build from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// HTTP endpoint accepting `GET`/`POST` of the JSON blob.
    Remote {
        /// Endpoint URL.
        url: String,
        /// Request timeout.
        timeout: Duration,
    },
    /// Local JSON file.
    File {
        /// File path.
        path: PathBuf,
    },
}

impl StoreConfig {
    /// Reads the backend selection from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Config`] if `PERSISTENCE_BACKEND` names an
    /// unknown backend.
    pub fn from_env() -> Result<Self, PersistenceError> {
        let backend = std::env::var("PERSISTENCE_BACKEND").unwrap_or_else(|_| "remote".to_string());

        match backend.to_lowercase().as_str() {
            "remote" | "http" => Ok(Self::Remote {
                url: std::env::var("PERSISTENCE_API_URL")
                    .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
                timeout: std::env::var("PERSISTENCE_TIMEOUT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map_or(Duration::from_secs(30), Duration::from_millis),
            }),
            "file" => Ok(Self::File {
                path: std::env::var("PERSISTENCE_PATH")
                    .unwrap_or_else(|_| DEFAULT_PATH.to_string())
                    .into(),
            }),
            other => Err(PersistenceError::Config {
                message: format!("unknown PERSISTENCE_BACKEND '{other}' (expected remote or file)"),
            }),
        }
    }

    /// Builds the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the HTTP client for the remote store
    /// cannot be built.
    pub fn build(self) -> Result<Arc<dyn SnapshotStore>, PersistenceError> {
        Ok(match self {
            Self::Remote { url, timeout } => Arc::new(RemoteStore::new(&url, timeout)?),
            Self::File { path } => Arc::new(FileStore::new(path)),
        })
    }
}

/// Builds a [`PersistenceGateway`] from environment variables.
///
/// # Errors
///
/// Returns [`PersistenceError`] if the configuration is invalid.
pub fn gateway_from_env() -> Result<PersistenceGateway, PersistenceError> {
    let config = StoreConfig::from_env()?;
    log::info!("Using persistence backend {config:?}");
    Ok(PersistenceGateway::new(config.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use chrono::TimeZone as _;
    use tender_watch_tender_models::{Category, TenderRecord};

    struct BrokenStore;

    #[async_trait]
    impl SnapshotStore for BrokenStore {
        fn location(&self) -> String {
            "broken".to_owned()
        }

        async fn read(&self) -> Result<Option<Snapshot>, PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::other("disk on fire")))
        }

        async fn write(&self, _snapshot: &Snapshot) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::other("disk on fire")))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        blob: Mutex<Option<Snapshot>>,
    }

    #[async_trait]
    impl SnapshotStore for MemoryStore {
        fn location(&self) -> String {
            "memory".to_owned()
        }

        async fn read(&self) -> Result<Option<Snapshot>, PersistenceError> {
            Ok(self.blob.lock().unwrap().clone())
        }

        async fn write(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
            *self.blob.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    fn snapshot() -> Snapshot {
        let mut data = BTreeMap::new();
        data.insert(Category::OpenTenders, vec![TenderRecord::new("R/1", "Obra")]);
        Snapshot::new(data, chrono::Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let gateway = PersistenceGateway::new(Arc::new(BrokenStore));
        assert!(!gateway.save(&snapshot()).await);
        assert!(gateway.load().await.is_none());
    }

    #[tokio::test]
    async fn save_then_load_returns_snapshot() {
        let gateway = PersistenceGateway::new(Arc::new(MemoryStore::default()));
        assert!(gateway.load().await.is_none());
        assert!(gateway.save(&snapshot()).await);
        assert_eq!(gateway.load().await, Some(snapshot()));
    }
}

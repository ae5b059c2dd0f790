//! The authoritative cache state and its read-only accessor.
//!
//! The orchestrator publishes a fresh immutable [`CacheState`] on every
//! transition through a `tokio::sync::watch` channel. Readers hold a
//! [`SnapshotReader`] and clone the current `Arc`, so a read never waits
//! for a refresh in flight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use tender_watch_tender_models::{Provenance, Snapshot};
use tokio::sync::watch;

/// Where the orchestrator is in its refresh lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Startup: the persisted snapshot is being loaded and the first live
    /// refresh is running.
    Bootstrapping,
    /// The served snapshot came from the last refresh, which succeeded.
    Live,
    /// The last refresh failed and no retry is pending; the next periodic
    /// tick is the next attempt.
    Degraded,
    /// The last refresh failed and a bounded retry is scheduled.
    RetryPending,
}

/// Status descriptor published alongside the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    /// Origin of the served snapshot. `None` until anything was loaded.
    pub provenance: Option<Provenance>,
    /// When the served data was produced.
    pub last_update: Option<DateTime<Utc>>,
    /// Consecutive failed refresh attempts.
    pub retry_attempts: u32,
    /// Lifecycle phase.
    pub phase: Phase,
}

impl CacheStatus {
    /// Whether the served snapshot is a persisted fallback.
    #[must_use]
    pub fn is_using_persisted_data(&self) -> bool {
        self.provenance == Some(Provenance::Persisted)
    }
}

/// One immutable version of the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheState {
    /// Served snapshot, absent only until the first successful load.
    pub snapshot: Option<Arc<Snapshot>>,
    /// Status descriptor.
    pub status: CacheStatus,
}

impl CacheState {
    /// The empty state every orchestrator starts from.
    #[must_use]
    pub const fn bootstrapping() -> Self {
        Self {
            snapshot: None,
            status: CacheStatus {
                provenance: None,
                last_update: None,
                retry_attempts: 0,
                phase: Phase::Bootstrapping,
            },
        }
    }

    /// A state serving `snapshot` with the given provenance and phase.
    #[must_use]
    pub fn serving(snapshot: Snapshot, provenance: Provenance, phase: Phase) -> Self {
        let last_update = Some(snapshot.generated_at());
        Self {
            snapshot: Some(Arc::new(snapshot)),
            status: CacheStatus {
                provenance: Some(provenance),
                last_update,
                retry_attempts: 0,
                phase,
            },
        }
    }
}

/// A snapshot together with the status it was published with.
#[derive(Debug, Clone)]
pub struct SnapshotView {
    /// The served snapshot.
    pub snapshot: Arc<Snapshot>,
    /// Status at the time of the read.
    pub status: CacheStatus,
}

/// Read-only, non-blocking access to the current cache state.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Arc<CacheState>>,
}

impl SnapshotReader {
    pub(crate) const fn new(rx: watch::Receiver<Arc<CacheState>>) -> Self {
        Self { rx }
    }

    /// A reader that always sees `state`.
    #[must_use]
    pub fn fixed(state: CacheState) -> Self {
        let (_tx, rx) = watch::channel(Arc::new(state));
        Self { rx }
    }

    /// The current cache state.
    #[must_use]
    pub fn state(&self) -> Arc<CacheState> {
        self.rx.borrow().clone()
    }

    /// The current snapshot and status, or `None` if nothing has been
    /// loaded yet.
    #[must_use]
    pub fn snapshot(&self) -> Option<SnapshotView> {
        let state = self.state();
        state.snapshot.clone().map(|snapshot| SnapshotView {
            snapshot,
            status: state.status,
        })
    }

    /// The current status descriptor.
    #[must_use]
    pub fn status(&self) -> CacheStatus {
        self.state().status
    }
}

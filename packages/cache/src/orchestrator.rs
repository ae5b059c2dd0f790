//! Refresh cycle: probe, fetch, commit or fall back.
//!
//! A cycle first probes the portal. If it is up, every category is fetched
//! concurrently and, when the combined result is non-empty, committed as a
//! new live snapshot and saved. Any failure loads the durable snapshot
//! instead and decides whether a bounded retry should follow.
//!
//! Cycles are serialized by a single-flight guard; a cycle triggered while
//! another runs is skipped, not queued.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::try_join_all;
use tender_watch_persistence::PersistenceGateway;
use tender_watch_scraper::ScrapeError;
use tender_watch_tender_models::{Category, Provenance, Snapshot};
use tokio::sync::{Mutex, watch};

use crate::{CacheState, CacheStatus, Phase, SnapshotReader, UpstreamSource};

/// Refresh cadence and retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Time between periodic refreshes.
    pub interval: Duration,
    /// Failed attempts after which retries stop until the next periodic
    /// refresh.
    pub max_retries: u32,
    /// Delay before a scheduled retry.
    pub retry_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(8 * 60 * 60),
            max_retries: 2,
            retry_delay: Duration::from_secs(5 * 60),
        }
    }
}

impl OrchestratorConfig {
    /// Reads `CACHE_INTERVAL`, `MAX_RETRY_ATTEMPTS` and `RETRY_DELAY`
    /// (durations in milliseconds), keeping defaults for anything unset or
    /// unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
        };

        Self {
            interval: millis("CACHE_INTERVAL").unwrap_or(defaults.interval),
            max_retries: std::env::var("MAX_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay: millis("RETRY_DELAY").unwrap_or(defaults.retry_delay),
        }
    }
}

/// Why a cycle did not commit.
#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    /// The availability probe failed; nothing was fetched.
    #[error("upstream unavailable")]
    Unavailable,
    /// A category fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] ScrapeError),
    /// Every category came back empty.
    #[error("upstream returned no records")]
    Empty,
}

/// Whether a failed cycle is followed by a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    Scheduled(Duration),
    /// Retry budget spent; the counter was reset and the next periodic
    /// refresh is the next attempt.
    Exhausted,
}

/// Result of one refresh cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A new live snapshot was committed.
    Committed {
        /// Records in the committed snapshot.
        records: usize,
    },
    /// The cycle failed and the cache fell back.
    Degraded {
        /// What went wrong.
        reason: FailureReason,
        /// Whether a retry follows.
        retry: RetryDecision,
    },
    /// Another cycle was already running.
    Skipped,
}

impl CycleOutcome {
    /// Delay of the retry this outcome asks for, if any.
    #[must_use]
    pub const fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::Degraded {
                retry: RetryDecision::Scheduled(delay),
                ..
            } => Some(*delay),
            _ => None,
        }
    }
}

/// Owner of the cache state and the only code path that writes it.
pub struct RefreshOrchestrator {
    source: Arc<dyn UpstreamSource>,
    persistence: PersistenceGateway,
    config: OrchestratorConfig,
    state: watch::Sender<Arc<CacheState>>,
    in_flight: Mutex<()>,
}

impl std::fmt::Debug for RefreshOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshOrchestrator")
            .field("persistence", &self.persistence)
            .field("config", &self.config)
            .field("status", &self.state.borrow().status)
            .finish_non_exhaustive()
    }
}

impl RefreshOrchestrator {
    /// Creates an orchestrator in the [`Phase::Bootstrapping`] state.
    #[must_use]
    pub fn new(
        source: Arc<dyn UpstreamSource>,
        persistence: PersistenceGateway,
        config: OrchestratorConfig,
    ) -> Self {
        let (state, _rx) = watch::channel(Arc::new(CacheState::bootstrapping()));
        Self {
            source,
            persistence,
            config,
            state,
            in_flight: Mutex::new(()),
        }
    }

    /// A read-only handle on the cache.
    #[must_use]
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(self.state.subscribe())
    }

    /// The current cache state.
    #[must_use]
    pub fn state(&self) -> Arc<CacheState> {
        self.state.borrow().clone()
    }

    /// Refresh cadence and retry bounds.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Seeds the cache from the durable snapshot, then runs the first
    /// refresh.
    ///
    /// Waits for any cycle already in flight instead of skipping.
    pub async fn bootstrap(&self) -> CycleOutcome {
        let _guard = self.in_flight.lock().await;

        if let Some(snapshot) = self.persistence.load().await {
            log::info!(
                "Cache initialized from saved data ({} records)",
                snapshot.total_records()
            );
            self.publish(CacheState::serving(
                snapshot,
                Provenance::Persisted,
                Phase::Bootstrapping,
            ));
        }

        self.refresh().await
    }

    /// Runs one refresh cycle unless another is in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            log::debug!("Refresh already in progress, skipping trigger");
            return CycleOutcome::Skipped;
        };
        self.refresh().await
    }

    async fn refresh(&self) -> CycleOutcome {
        if !self.source.probe().await {
            log::warn!("UFSA portal is not available, falling back to persisted data");
            return self.fall_back(FailureReason::Unavailable).await;
        }

        let fetches = Category::ALL.into_iter().map(|category| {
            let source = Arc::clone(&self.source);
            async move {
                source
                    .fetch_category(category)
                    .await
                    .map(|records| (category, records))
            }
        });

        let data = match try_join_all(fetches).await {
            Ok(results) => results.into_iter().collect::<BTreeMap<_, _>>(),
            Err(e) => {
                log::error!("Failed to update cache: {e}");
                return self.fall_back(FailureReason::Fetch(e)).await;
            }
        };

        let snapshot = Snapshot::new(data, Utc::now());
        if snapshot.is_empty() {
            log::error!("Upstream returned no records, refusing to commit");
            return self.fall_back(FailureReason::Empty).await;
        }

        self.commit(snapshot).await
    }

    async fn commit(&self, snapshot: Snapshot) -> CycleOutcome {
        let records = snapshot.total_records();
        let snapshot = Arc::new(snapshot);

        self.publish(CacheState {
            snapshot: Some(Arc::clone(&snapshot)),
            status: CacheStatus {
                provenance: Some(Provenance::Live),
                last_update: Some(snapshot.generated_at()),
                retry_attempts: 0,
                phase: Phase::Live,
            },
        });
        log::info!("Cache updated with {records} live records");

        if !self.persistence.save(&snapshot).await {
            log::warn!("Live snapshot is served but could not be saved");
        }

        CycleOutcome::Committed { records }
    }

    async fn fall_back(&self, reason: FailureReason) -> CycleOutcome {
        let fallback = self.persistence.load().await;
        let current = self.state();

        let (snapshot, provenance, last_update) = match fallback {
            Some(snapshot) => {
                log::info!("Using persisted data due to update failure");
                let last_update = Some(snapshot.generated_at());
                (
                    Some(Arc::new(snapshot)),
                    Some(Provenance::Persisted),
                    last_update,
                )
            }
            None => {
                log::warn!("No persisted data available, keeping the current snapshot");
                (
                    current.snapshot.clone(),
                    current.status.provenance,
                    current.status.last_update,
                )
            }
        };

        let attempts = current.status.retry_attempts.saturating_add(1);
        let (retry, retry_attempts, phase) = if attempts <= self.config.max_retries {
            log::info!(
                "Retry attempt {attempts} of {} in {}s",
                self.config.max_retries,
                self.config.retry_delay.as_secs()
            );
            (
                RetryDecision::Scheduled(self.config.retry_delay),
                attempts,
                Phase::RetryPending,
            )
        } else {
            log::error!("Max retry attempts reached. Will try again at next scheduled update.");
            (RetryDecision::Exhausted, 0, Phase::Degraded)
        };

        self.publish(CacheState {
            snapshot,
            status: CacheStatus {
                provenance,
                last_update,
                retry_attempts,
                phase,
            },
        });

        CycleOutcome::Degraded { reason, retry }
    }

    fn publish(&self, state: CacheState) {
        self.state.send_replace(Arc::new(state));
    }
}

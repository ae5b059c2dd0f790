#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory tender snapshot cache and the machinery that keeps it fresh.
//!
//! [`RefreshOrchestrator`] owns the single authoritative [`CacheState`]:
//! it probes the portal, fetches every category, commits live snapshots,
//! and falls back to the durable copy when anything goes wrong.
//! [`Scheduler`] drives it with a periodic interval plus bounded retries.
//! Everything else reads through a [`SnapshotReader`].
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `CACHE_INTERVAL` | `28800000` | Periodic refresh interval in milliseconds |
//! | `MAX_RETRY_ATTEMPTS` | `2` | Failed attempts retried before waiting for the interval |
//! | `RETRY_DELAY` | `300000` | Delay before a retry in milliseconds |

pub mod orchestrator;
pub mod scheduler;
pub mod source;
pub mod state;

pub use orchestrator::{
    CycleOutcome, FailureReason, OrchestratorConfig, RefreshOrchestrator, RetryDecision,
};
pub use scheduler::Scheduler;
pub use source::UpstreamSource;
pub use state::{CacheState, CacheStatus, Phase, SnapshotReader, SnapshotView};

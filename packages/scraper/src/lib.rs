#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resilient HTTP client and HTML normalizer for the UFSA procurement portal.
//!
//! The portal is slow and flaky, so every request goes through
//! [`retry`], which paces requests with a randomized delay and retries
//! transient failures with capped exponential backoff. Listing pages are
//! turned into [`TenderRecord`](tender_watch_tender_models::TenderRecord)s
//! by [`html_table`], detail pages by [`detail`]. [`probe`] offers a cheap
//! availability check used as a gate before a full refresh.

pub mod client;
pub mod detail;
pub mod html_table;
pub mod probe;
pub mod retry;

use std::time::Duration;

pub use client::{Document, UfsaClient};
pub use probe::AvailabilityProber;
pub use retry::{Pacing, RetryPolicy};

/// Default portal base URL.
pub const DEFAULT_BASE_URL: &str = "https://www.ufsa.gov.mz";

/// Errors that can occur while talking to the portal.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The request could not be built (malformed URL, bad header, etc.).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A connection, timeout, or body transfer error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The portal answered HTTP 429.
    #[error("Rate limited by upstream (HTTP 429)")]
    RateLimited,

    /// The portal answered with a server-side status (5xx, 523, 530, ...).
    #[error("Upstream returned HTTP {status}")]
    RemoteStatus {
        /// The last status code received.
        status: u16,
    },

    /// The portal rejected the request with a non-retryable 4xx status.
    #[error("Upstream rejected request with HTTP {status}")]
    ClientStatus {
        /// The status code received.
        status: u16,
    },

    /// The portal answered HTTP 404.
    #[error("Not found: {url}")]
    NotFound {
        /// The URL that was requested.
        url: String,
    },

    /// The availability probe reported the portal as down.
    #[error("Upstream unavailable: {host}")]
    Unavailable {
        /// The probed base URL.
        host: String,
    },

    /// The page did not contain the expected structure.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ScrapeError {
    /// Maps a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        match status.as_u16() {
            404 => Self::NotFound {
                url: url.to_owned(),
            },
            429 => Self::RateLimited,
            code if code >= 500 => Self::RemoteStatus { status: code },
            code => Self::ClientStatus { status: code },
        }
    }

    /// Whether retrying the same request might succeed.
    ///
    /// 404 counts as transient: the portal is known to return it spuriously
    /// for pages that exist.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited | Self::NotFound { .. } => true,
            Self::RemoteStatus { status } => *status >= 500,
            Self::InvalidRequest(_)
            | Self::ClientStatus { .. }
            | Self::Unavailable { .. }
            | Self::MalformedResponse(_) => false,
        }
    }
}

/// Connection settings for the portal.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Portal base URL, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to every regular request.
    pub request_timeout: Duration,
    /// Timeout applied to the availability probe.
    pub probe_timeout: Duration,
    /// Randomized delay inserted before every request.
    pub pacing: Pacing,
    /// Retry and backoff settings.
    pub retry: RetryPolicy,
}

impl UpstreamConfig {
    /// Creates a `UpstreamConfig` for the given base URL with the portal's
    /// usual defaults (30s requests, 5s probe, 2-5s pacing, 5 attempts).
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            pacing: Pacing::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Reads the configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `UFSA_BASE_URL` | `https://www.ufsa.gov.mz` |
    /// | `REQUEST_TIMEOUT` | `30000` ms |
    /// | `PROBE_TIMEOUT` | `5000` ms |
    /// | `REQUEST_MIN_DELAY` | `2000` ms |
    /// | `REQUEST_MAX_DELAY` | `5000` ms |
    /// | `REQUEST_MAX_ATTEMPTS` | `5` |
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("UFSA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let defaults = Self::new(&base_url);

        let mut retry = defaults.retry;
        retry.max_attempts = std::env::var("REQUEST_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(retry.max_attempts);
        let pacing = Pacing::new(
            env_millis("REQUEST_MIN_DELAY", defaults.pacing.min),
            env_millis("REQUEST_MAX_DELAY", defaults.pacing.max),
        );
        let request_timeout = env_millis("REQUEST_TIMEOUT", defaults.request_timeout);
        let probe_timeout = env_millis("PROBE_TIMEOUT", defaults.probe_timeout);

        defaults
            .with_request_timeout(request_timeout)
            .with_probe_timeout(probe_timeout)
            .with_pacing(pacing)
            .with_retry(retry)
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the probe timeout.
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the inter-request pacing.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Joins a portal-relative path onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Reads a duration in milliseconds from an environment variable.
fn env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_portal_quirks() {
        let url = "https://example.test/x";
        assert!(matches!(
            ScrapeError::from_status(reqwest::StatusCode::NOT_FOUND, url),
            ScrapeError::NotFound { .. }
        ));
        assert!(matches!(
            ScrapeError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, url),
            ScrapeError::RateLimited
        ));
        let vendor = reqwest::StatusCode::from_u16(523).unwrap();
        assert!(matches!(
            ScrapeError::from_status(vendor, url),
            ScrapeError::RemoteStatus { status: 523 }
        ));
        assert!(matches!(
            ScrapeError::from_status(reqwest::StatusCode::FORBIDDEN, url),
            ScrapeError::ClientStatus { status: 403 }
        ));
    }

    #[test]
    fn transient_classification() {
        assert!(ScrapeError::RateLimited.is_transient());
        assert!(ScrapeError::RemoteStatus { status: 530 }.is_transient());
        assert!(
            ScrapeError::NotFound {
                url: String::new()
            }
            .is_transient()
        );
        assert!(!ScrapeError::ClientStatus { status: 400 }.is_transient());
        assert!(!ScrapeError::InvalidRequest("bad".to_owned()).is_transient());
        assert!(!ScrapeError::MalformedResponse("no table".to_owned()).is_transient());
    }

    #[test]
    fn url_joins_without_double_slash() {
        let config = UpstreamConfig::new("https://portal.test/");
        assert_eq!(
            config.url("/query/Busca_concurso1.php"),
            "https://portal.test/query/Busca_concurso1.php"
        );
        assert_eq!(config.url("a.php"), "https://portal.test/a.php");
    }
}

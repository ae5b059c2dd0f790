//! HTTP retry helpers for the portal's transient failures.
//!
//! Every portal request should go through [`send`] or [`send_text`]
//! instead of calling `reqwest::RequestBuilder::send()` directly. This
//! ensures every request is paced with a randomized delay and retried with
//! capped exponential backoff plus jitter on transient failures
//! (connection errors, timeouts, 5xx, 429, and the portal's spurious 404s).
//!
//! # Usage
//!
//! ```ignore
//! use crate::retry;
//!
//! let html = retry::send_text(&pacing, &policy, || client.get(&url)).await?;
//! ```

use std::time::Duration;

use rand::Rng as _;

use crate::ScrapeError;

/// Maximum number of full re-fetch attempts when the response arrives but
/// its body cannot be read (connection dropped mid-transfer, etc.).
///
/// Each body retry goes through [`send`] again, so status-level retries
/// still apply.
const MAX_BODY_RETRIES: u32 = 2;

/// Randomized delay inserted before every request so the portal does not
/// rate-limit us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Shortest delay.
    pub min: Duration,
    /// Longest delay.
    pub max: Duration,
}

impl Pacing {
    /// Creates a pacing interval. A `max` below `min` is clamped to `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// No delay at all. Used by tests and one-shot CLI commands.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Picks a delay uniformly within `[min, max]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(5))
    }
}

/// Retry and backoff settings.
///
/// With the defaults (1s start, factor 2, 30s cap, up to 1s jitter) the
/// waits between five attempts are roughly 1s, 2s, 4s and 8s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the backoff after every retry.
    pub multiplier: u32,
    /// Upper bound for the exponential part of the backoff.
    pub max_delay: Duration,
    /// Upper bound for the random jitter added to every backoff.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// A policy that never waits between attempts. Used by tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            multiplier: 2,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Backoff before retry number `retry` (1-based), excluding jitter.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Backoff before retry number `retry` (1-based), including jitter.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn delay(&self, retry: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        self.base_delay(retry) + jitter
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
        }
    }
}

/// Sends a request and returns the response body as text.
///
/// Retries the whole request (up to [`MAX_BODY_RETRIES`] times) when the
/// body cannot be read after a successful status.
///
/// # Errors
///
/// Returns [`ScrapeError`] if the request fails after all retries, the
/// portal answers with a non-retryable status, or the body cannot be read.
pub async fn send_text<F>(
    pacing: &Pacing,
    policy: &RetryPolicy,
    build_request: F,
) -> Result<String, ScrapeError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut body_attempt = 0;
    loop {
        let response = send(pacing, policy, &build_request).await?;
        let url = response.url().to_string();

        match response.text().await {
            Ok(text) => return Ok(text),
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                body_attempt += 1;
                log::warn!(
                    "Body read failed (body retry {body_attempt}/{MAX_BODY_RETRIES}) for {url}: {e}"
                );
            }
            Err(e) => {
                log::error!("Body read failed after {MAX_BODY_RETRIES} retries for {url}: {e}");
                return Err(ScrapeError::Network(e));
            }
        }
    }
}

/// Core retry loop.
///
/// Sends the request built by `build_request` (called afresh on every
/// attempt since builders are consumed by `.send()`), retrying transient
/// failures up to `policy.max_attempts` attempts in total. Returns the
/// successful response (status 2xx or 3xx).
///
/// # Errors
///
/// Returns [`ScrapeError::InvalidRequest`] immediately if the request
/// cannot be built, a non-transient status error immediately, or the last
/// transient error once all attempts are used up.
pub async fn send<F>(
    pacing: &Pacing,
    policy: &RetryPolicy,
    build_request: &F,
) -> Result<reqwest::Response, ScrapeError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let pause = pacing.sample();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let error = match build_request().send().await {
            Err(e) if e.is_builder() => return Err(ScrapeError::InvalidRequest(e.to_string())),
            Err(e) => ScrapeError::Network(e),
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    return Ok(response);
                }
                ScrapeError::from_status(status, response.url().as_str())
            }
        };

        if !error.is_transient() {
            log::warn!("  non-retryable error: {error}");
            return Err(error);
        }
        if attempt >= max_attempts {
            log::error!("  giving up after {max_attempts} attempts: {error}");
            return Err(error);
        }

        let delay = policy.delay(attempt);
        log::warn!(
            "  transient error: {error}; retry {attempt}/{} in {delay:?}...",
            max_attempts - 1
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

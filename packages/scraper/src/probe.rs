//! Cheap availability check for the portal.
//!
//! One short-timeout `GET` against the base URL. Any status below 500 means
//! the portal is reachable and minimally functioning, even if it answered
//! with an error page.

use std::time::Duration;

use crate::ScrapeError;

/// Issues availability probes against a fixed URL.
#[derive(Debug, Clone)]
pub struct AvailabilityProber {
    client: reqwest::Client,
    url: String,
}

impl AvailabilityProber {
    /// Creates a prober for `url` with the given timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidRequest`] if the HTTP client cannot be
    /// built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    /// The probed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` if the portal answered with a status below 500.
    pub async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.as_u16() < 500 {
                    log::debug!("Availability probe of {} answered {status}", self.url);
                    true
                } else {
                    log::warn!("Availability probe of {} answered {status}", self.url);
                    false
                }
            }
            Err(e) => {
                log::warn!("Availability probe of {} failed: {e}", self.url);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn probe_with_status(status: u16) -> bool {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        let prober = AvailabilityProber::new(&server.uri(), Duration::from_secs(5)).unwrap();
        prober.probe().await
    }

    #[tokio::test]
    async fn statuses_below_500_are_available() {
        assert!(probe_with_status(200).await);
        assert!(probe_with_status(404).await);
        assert!(probe_with_status(499).await);
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        assert!(!probe_with_status(500).await);
        assert!(!probe_with_status(503).await);
        assert!(!probe_with_status(523).await);
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;
        let prober = AvailabilityProber::new(&server.uri(), Duration::from_millis(50)).unwrap();
        assert!(!prober.probe().await);
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let prober =
            AvailabilityProber::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert!(!prober.probe().await);
    }
}

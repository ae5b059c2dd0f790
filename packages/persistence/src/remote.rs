//! Remote HTTP snapshot store.
//!
//! The endpoint returns the stored blob on `GET` and replaces it with the
//! request body on `POST`.

use std::time::Duration;

use async_trait::async_trait;
use tender_watch_tender_models::Snapshot;

use crate::{PersistenceError, SnapshotStore};

/// Snapshot store backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    url: String,
}

impl RemoteStore {
    /// Creates a store for `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PersistenceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }
}

#[async_trait]
impl SnapshotStore for RemoteStore {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn read(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let body = body.trim();
        if body.is_empty() || body == "null" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(body)?))
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        self.client
            .post(&self.url)
            .json(snapshot)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::TimeZone as _;
    use tender_watch_tender_models::{Category, TenderRecord};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot() -> Snapshot {
        let mut data = BTreeMap::new();
        data.insert(
            Category::DirectAdjustments,
            vec![TenderRecord::new("AD/4", "Limpeza")],
        );
        Snapshot::new(data, chrono::Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    fn store(server: &MockServer) -> RemoteStore {
        RemoteStore::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn read_parses_stored_blob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(snapshot()))
            .mount(&server)
            .await;

        assert_eq!(store(&server).read().await.unwrap(), Some(snapshot()));
    }

    #[tokio::test]
    async fn empty_body_means_nothing_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        assert_eq!(store(&server).read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = store(&server).read().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Http(_)));
    }

    #[tokio::test]
    async fn garbage_blob_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = store(&server).read().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Json(_)));
    }

    #[tokio::test]
    async fn write_posts_blob() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "meta": { "estatisticas": { "ajustes_diretos": 1 } }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).write(&snapshot()).await.unwrap();
    }
}

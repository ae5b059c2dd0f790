//! Portal client: listing pages, detail pages, and document downloads.
//!
//! All three go through [`retry`](crate::retry) so they share the pacing
//! and backoff behaviour. The client holds only read-only configuration and
//! is safe to share between the refresh cycle and request handlers.

use reqwest::header::{self, HeaderMap, HeaderValue};
use tender_watch_tender_models::{Category, DocumentKind, TenderDetails, TenderRecord};

use crate::{AvailabilityProber, ScrapeError, UpstreamConfig, detail, html_table, retry};

/// Browser-like user agent; the portal serves degraded pages to unknown
/// clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Content type assumed when a document download has none.
const DEFAULT_DOCUMENT_CONTENT_TYPE: &str = "application/pdf";

/// A downloaded tender document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Content type reported by the portal.
    pub content_type: String,
    /// File name to offer to clients.
    pub file_name: String,
}

/// HTTP client for the UFSA portal.
#[derive(Debug, Clone)]
pub struct UfsaClient {
    client: reqwest::Client,
    prober: AvailabilityProber,
    config: UpstreamConfig,
}

impl UfsaClient {
    /// Builds a client with browser-like default headers and the configured
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidRequest`] if the HTTP client cannot be
    /// built.
    pub fn new(config: UpstreamConfig) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("pt-PT,pt;q=0.9,en;q=0.5"),
        );
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ScrapeError::InvalidRequest(e.to_string()))?;
        let prober = AvailabilityProber::new(&config.base_url, config.probe_timeout)?;

        Ok(Self {
            client,
            prober,
            config,
        })
    }

    /// Returns a reference to the client configuration.
    #[must_use]
    pub const fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Probes the portal base URL. See [`AvailabilityProber::probe`].
    pub async fn probe(&self) -> bool {
        self.prober.probe().await
    }

    /// Like [`probe`](Self::probe), but reports a down portal as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Unavailable`] naming the probed URL if the
    /// portal is down.
    pub async fn ensure_available(&self) -> Result<(), ScrapeError> {
        if self.probe().await {
            Ok(())
        } else {
            Err(ScrapeError::Unavailable {
                host: self.prober.url().to_owned(),
            })
        }
    }

    /// Fetches the raw listing page of a category.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the page cannot be fetched after all
    /// retries.
    pub async fn fetch_listing(&self, category: Category) -> Result<String, ScrapeError> {
        let url = self.config.url(category.listing_path());
        log::info!("Fetching {category} listing from {url}");
        retry::send_text(&self.config.pacing, &self.config.retry, || {
            self.client.get(&url)
        })
        .await
    }

    /// Fetches and normalizes every record of a category.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the page cannot be fetched or contains no
    /// table.
    pub async fn fetch_category(
        &self,
        category: Category,
    ) -> Result<Vec<TenderRecord>, ScrapeError> {
        let html = self.fetch_listing(category).await?;
        let records = html_table::parse_listing(category, &html)?;
        log::info!("Fetched {} {category} records", records.len());
        Ok(records)
    }

    /// Fetches the raw detail page of a record.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the page cannot be fetched after all
    /// retries.
    pub async fn fetch_detail(
        &self,
        category: Category,
        reference: &str,
    ) -> Result<String, ScrapeError> {
        let url = self.config.url(category.detail_path());
        log::info!("Fetching {category} details for {reference}");
        retry::send_text(&self.config.pacing, &self.config.retry, || {
            self.client.get(&url).query(&[("referencia", reference)])
        })
        .await
    }

    /// Fetches and parses the detail page of a record.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the page cannot be fetched or parsed.
    pub async fn fetch_details(
        &self,
        category: Category,
        reference: &str,
    ) -> Result<TenderDetails, ScrapeError> {
        let html = self.fetch_detail(category, reference).await?;
        detail::parse_details(&html, &self.config.base_url)
    }

    /// Downloads a tender document.
    ///
    /// # Errors
    ///
    /// Once retries are exhausted, returns [`ScrapeError::NotFound`] if the
    /// last answer was a genuine 404, otherwise [`ScrapeError::RemoteStatus`]
    /// with the last status code (or the last network error).
    pub async fn fetch_document(
        &self,
        reference: &str,
        kind: DocumentKind,
    ) -> Result<Document, ScrapeError> {
        let url = self.config.url(kind.path());
        log::info!("Fetching {kind} for {reference} from {url}");

        let response = retry::send(&self.config.pacing, &self.config.retry, &|| {
            self.client
                .get(&url)
                .query(&[("REFERENCIA", reference)])
                .header(
                    header::ACCEPT,
                    HeaderValue::from_static("application/pdf,application/octet-stream"),
                )
        })
        .await
        .map_err(|e| match e {
            ScrapeError::RateLimited => ScrapeError::RemoteStatus { status: 429 },
            ScrapeError::ClientStatus { status } => ScrapeError::RemoteStatus { status },
            other => other,
        })?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_DOCUMENT_CONTENT_TYPE)
            .to_owned();
        let bytes = response.bytes().await?.to_vec();

        Ok(Document {
            bytes,
            content_type,
            file_name: kind.file_name(reference),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Pacing, RetryPolicy};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> UfsaClient {
        let config = UpstreamConfig::new(&server.uri())
            .with_pacing(Pacing::none())
            .with_retry(RetryPolicy::immediate(3));
        UfsaClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn fetch_category_drops_footer_row() {
        let server = MockServer::start().await;
        let html = "<table><tbody>\
                    <tr><td>Concurso Limitado:CL/1</td><td>Obras</td></tr>\
                    <tr><td>Total</td></tr>\
                    </tbody></table>";
        Mock::given(method("GET"))
            .and(path("/query/Busca_concurso1.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let records = client_for(&server)
            .fetch_category(Category::OpenTenders)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference, "CL/1");
    }

    #[tokio::test]
    async fn ensure_available_names_the_probed_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).ensure_available().await.unwrap_err();

        assert!(!err.is_transient());
        match err {
            ScrapeError::Unavailable { host } => assert_eq!(host, server.uri()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn fetch_details_sends_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/adjudicacao_detalhes.php"))
            .and(query_param("referencia", "A/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<table id=\"lista\"><tbody><tr><th>estado</th><td>Adjudicado</td></tr></tbody></table>",
            ))
            .mount(&server)
            .await;

        let details = client_for(&server)
            .fetch_details(Category::AwardedTenders, "A/1")
            .await
            .unwrap();

        assert_eq!(details.fields.len(), 1);
    }

    #[tokio::test]
    async fn fetch_document_returns_bytes_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/includes/Baixar_anuncio.php"))
            .and(query_param("REFERENCIA", "R 1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4".to_vec()),
            )
            .mount(&server)
            .await;

        let document = client_for(&server)
            .fetch_document("R 1", DocumentKind::Announcement)
            .await
            .unwrap();

        assert_eq!(document.bytes, b"%PDF-1.4");
        assert_eq!(document.content_type, "application/pdf");
        assert_eq!(document.file_name, "anuncio-R 1.pdf");
    }

    #[tokio::test]
    async fn exhausted_document_fetch_surfaces_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/includes/Baixar_cad_enc.php"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_document("missing", DocumentKind::Document)
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn exhausted_document_fetch_surfaces_last_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/includes/Baixar_cad_enc.php"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/includes/Baixar_cad_enc.php"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_document("flaky", DocumentKind::Document)
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::RemoteStatus { status: 502 }));
    }
}

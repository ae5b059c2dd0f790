//! The upstream seen by the orchestrator.

use async_trait::async_trait;
use tender_watch_scraper::{ScrapeError, UfsaClient};
use tender_watch_tender_models::{Category, TenderRecord};

/// Where refresh cycles get their data from.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Cheap availability pre-check.
    async fn probe(&self) -> bool;

    /// Fetches and normalizes every record of one category.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the category cannot be fetched or parsed.
    async fn fetch_category(&self, category: Category) -> Result<Vec<TenderRecord>, ScrapeError>;
}

#[async_trait]
impl UpstreamSource for UfsaClient {
    async fn probe(&self) -> bool {
        Self::probe(self).await
    }

    async fn fetch_category(&self, category: Category) -> Result<Vec<TenderRecord>, ScrapeError> {
        Self::fetch_category(self, category).await
    }
}

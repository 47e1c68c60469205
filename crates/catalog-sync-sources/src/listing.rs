use crate::browser::{BrowserOptions, BrowserSession};
use crate::error::SourceError;
use crate::scraper::{ListingPage, ListingScraper, PageFetcher};
use async_trait::async_trait;
use catalog_sync_config::SourceListingConfig;
use tracing::debug;

/// Paginated title listing of the source site, read through a browser page
pub struct BrowserListingScraper {
    options: BrowserOptions,
    base_url: String,
    title_selector: String,
    page_selector: String,
    session: Option<BrowserSession>,
}

impl BrowserListingScraper {
    pub fn new(options: BrowserOptions, config: &SourceListingConfig) -> Self {
        Self {
            options,
            base_url: config.base_url.clone(),
            title_selector: config.title_selector.clone(),
            page_selector: config.page_selector.clone(),
            session: None,
        }
    }
}

/// `https://site/` + `/movie/x` + page 2 → `https://site/movie/x/?get-page=2`
pub fn listing_url(base_url: &str, url_path: &str, page: u32) -> String {
    format!(
        "{}/{}/?get-page={}",
        base_url.trim_end_matches('/'),
        url_path.trim_matches('/'),
        page
    )
}

/// Last pagination label that parses as a number, 1 when there is none
pub fn max_page_from_labels(labels: &[String]) -> u32 {
    labels
        .iter()
        .rev()
        .find_map(|label| label.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

#[async_trait]
impl ListingScraper for BrowserListingScraper {
    async fn fetch_listing(&mut self, url_path: &str, page: u32) -> Result<ListingPage, SourceError> {
        if self.session.is_none() {
            self.session = Some(BrowserSession::launch(&self.options).await?);
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SourceError::SessionLost("listing browser not available".to_string()))?;

        let url = listing_url(&self.base_url, url_path, page);
        let html = session.fetch_page(&url).await?;
        if html.is_empty() {
            return Err(SourceError::transient(format!("empty page at {}", url)));
        }
        let titles = session
            .texts(&self.title_selector)
            .await?
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();
        let max_page = max_page_from_labels(&session.texts(&self.page_selector).await?);

        debug!("{}: {} titles, {} pages", url, titles.len(), max_page);
        Ok(ListingPage { titles, max_page })
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        if let Some(mut session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}

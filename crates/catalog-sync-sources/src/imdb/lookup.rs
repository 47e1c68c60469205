use super::{find_url, selectors, title_id_from_href, year_from_text};
use crate::browser::{BrowserOptions, BrowserSession};
use crate::error::SourceError;
use crate::scraper::{LookupScraper, TitleQuery};
use async_trait::async_trait;
use catalog_sync_models::LookupRecord;
use std::time::Duration;
use tracing::debug;

/// Resolves titles against the IMDB find page.
///
/// The browser is only launched on the first lookup, so a pass served
/// entirely from the cache never starts Chromium.
pub struct ImdbLookupScraper {
    options: BrowserOptions,
    lookup_timeout: Duration,
    session: Option<BrowserSession>,
}

impl ImdbLookupScraper {
    pub fn new(options: BrowserOptions, lookup_timeout: Duration) -> Self {
        Self {
            options,
            lookup_timeout,
            session: None,
        }
    }

    async fn session(&mut self) -> Result<&BrowserSession, SourceError> {
        if self.session.is_none() {
            self.session = Some(BrowserSession::launch(&self.options).await?);
        }
        self.session
            .as_ref()
            .ok_or_else(|| SourceError::SessionLost("lookup browser not available".to_string()))
    }
}

#[async_trait]
impl LookupScraper for ImdbLookupScraper {
    type Query = TitleQuery;
    type Record = LookupRecord;

    fn scraper_name(&self) -> &str {
        "imdb-find"
    }

    async fn fetch_lookup(&mut self, query: &TitleQuery) -> Result<LookupRecord, SourceError> {
        let timeout = self.lookup_timeout;
        let session = self.session().await?;
        session.goto(&find_url(&query.name, query.year.as_deref())).await?;

        let link = session
            .wait_for(selectors::FIND_TITLE_LINK, timeout)
            .await?
            .ok_or_else(|| SourceError::LookupUnavailable(query.name.clone()))?;

        let display_name = link.inner_text().await?.map(|t| t.trim().to_string());
        let imdb_id = link.attribute("href").await?.as_deref().and_then(title_id_from_href);
        let year = match session.texts(selectors::FIND_TITLE_YEAR).await?.first() {
            Some(text) => year_from_text(text),
            None => None,
        };

        let record = LookupRecord {
            display_name: display_name.filter(|n| !n.is_empty()),
            year,
            imdb_id,
        };
        if record.imdb_id.is_none() {
            return Err(SourceError::LookupUnavailable(query.name.clone()));
        }
        debug!(
            "IMDB match for '{}': {:?} ({:?}) {:?}",
            query.name, record.display_name, record.year, record.imdb_id
        );
        Ok(record)
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        if let Some(mut session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}

use crate::error::SourceError;
use async_trait::async_trait;

/// Resolves one title into a catalog record.
///
/// `Ok` with an all-null record is never returned; a title with no match is
/// `SourceError::LookupUnavailable` and the caller decides what to store.
#[async_trait]
pub trait LookupScraper: Send {
    type Query: Send + Sync;
    type Record: Send;

    fn scraper_name(&self) -> &str;

    async fn fetch_lookup(&mut self, query: &Self::Query) -> Result<Self::Record, SourceError>;

    async fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Name and year to search for; built from a title key or its corrected name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleQuery {
    pub name: String,
    pub year: Option<String>,
}

impl TitleQuery {
    pub fn new(name: impl Into<String>, year: Option<&str>) -> Self {
        Self {
            name: name.into(),
            year: year.map(str::to_string),
        }
    }
}

/// Raw page access: navigate to `url` and return the rendered HTML
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch_page(&mut self, url: &str) -> Result<String, SourceError>;
}

/// One page of a paginated title listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub titles: Vec<String>,
    /// Highest page number advertised by the pagination links, at least 1
    pub max_page: u32,
}

#[async_trait]
pub trait ListingScraper: Send {
    async fn fetch_listing(&mut self, url_path: &str, page: u32) -> Result<ListingPage, SourceError>;

    async fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

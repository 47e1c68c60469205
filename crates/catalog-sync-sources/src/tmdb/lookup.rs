use super::{api, build_client};
use crate::error::SourceError;
use crate::scraper::LookupScraper;
use async_trait::async_trait;
use catalog_sync_models::TmdbRecord;
use reqwest::Client;

/// Resolves IMDB ids to TMDB records through `/3/find`
pub struct TmdbLookup {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbLookup {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, SourceError> {
        let api_key = api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SourceError::SessionAcquisition("no TMDB API key configured".to_string()))?;
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl LookupScraper for TmdbLookup {
    /// IMDB id
    type Query = String;
    type Record = TmdbRecord;

    fn scraper_name(&self) -> &str {
        "tmdb-find"
    }

    async fn fetch_lookup(&mut self, imdb_id: &String) -> Result<TmdbRecord, SourceError> {
        match api::find_by_imdb_id(&self.client, &self.base_url, &self.api_key, imdb_id).await? {
            Some((tmdb_id, media_type)) => Ok(TmdbRecord::new(tmdb_id, media_type, imdb_id.clone())),
            None => Err(SourceError::LookupUnavailable(imdb_id.clone())),
        }
    }
}

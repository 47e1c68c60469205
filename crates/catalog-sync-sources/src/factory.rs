//! Builds adapters and scrapers from configuration, so the CLI never has to
//! know which concrete platform type backs a catalog.

use crate::browser::BrowserOptions;
use crate::imdb::{ImdbListAdapter, ImdbLookupScraper};
use crate::listing::BrowserListingScraper;
use crate::tmdb::{TmdbListAdapter, TmdbLookup};
use crate::traits::RemoteListAdapter;
use anyhow::{anyhow, Result};
use catalog_sync_config::{Config, CredentialStore, PathManager};
use catalog_sync_models::CatalogId;

pub fn create_list_adapter(
    catalog: CatalogId,
    config: &Config,
    credentials: &CredentialStore,
    paths: &PathManager,
) -> Result<Box<dyn RemoteListAdapter>> {
    match catalog {
        CatalogId::Imdb => Ok(Box::new(ImdbListAdapter::new(
            BrowserOptions::from_config(&config.imdb, paths),
            config.imdb.list_id.clone(),
            config.imdb.page_timeout(),
        ))),
        CatalogId::Tmdb => Ok(Box::new(TmdbListAdapter::new(
            config.tmdb.api_base_url.clone(),
            config.tmdb.list_id.clone(),
            credentials.tmdb_access_token(),
        ))),
        CatalogId::Source => Err(anyhow!("the source catalog has no remote list")),
    }
}

pub fn create_imdb_lookup(config: &Config, paths: &PathManager) -> ImdbLookupScraper {
    ImdbLookupScraper::new(BrowserOptions::from_config(&config.imdb, paths), config.imdb.lookup_timeout())
}

pub fn create_tmdb_lookup(config: &Config, credentials: &CredentialStore) -> Result<TmdbLookup> {
    TmdbLookup::new(config.tmdb.api_base_url.clone(), credentials.tmdb_api_key())
        .map_err(|e| anyhow!("TMDB lookup unavailable: {}", e))
}

pub fn create_listing_scraper(config: &Config, paths: &PathManager) -> BrowserListingScraper {
    BrowserListingScraper::new(BrowserOptions::from_config(&config.imdb, paths), &config.source)
}

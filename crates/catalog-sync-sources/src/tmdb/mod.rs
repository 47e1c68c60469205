pub mod api;
pub mod list;
pub mod lookup;

#[cfg(test)]
mod tests;

pub use list::TmdbListAdapter;
pub use lookup::TmdbLookup;

use crate::error::SourceError;
use catalog_sync_models::TmdbMediaType;
use reqwest::Client;
use std::time::Duration;

pub const TMDB_API_BASE_URL: &str = "https://api.themoviedb.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client() -> Result<Client, SourceError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("catalog-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SourceError::SessionAcquisition(format!("cannot build HTTP client: {}", e)))
}

/// Split a `movie:603` style external id
pub fn parse_external_id(external_id: &str) -> Option<(TmdbMediaType, u64)> {
    let (media_type, id) = external_id.split_once(':')?;
    Some((TmdbMediaType::parse(media_type)?, id.parse().ok()?))
}

pub fn external_id(media_type: TmdbMediaType, tmdb_id: u64) -> String {
    format!("{}:{}", media_type.as_str(), tmdb_id)
}

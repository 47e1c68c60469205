use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three linked catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogId {
    /// Ordered title list scraped from the listing site
    Source,
    Imdb,
    Tmdb,
}

impl CatalogId {
    /// Directory name used to namespace this catalog's files
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogId::Source => "source",
            CatalogId::Imdb => "imdb",
            CatalogId::Tmdb => "tmdb",
        }
    }

    /// Catalogs that have a remote watchlist
    pub fn has_remote_list(&self) -> bool {
        !matches!(self, CatalogId::Source)
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source" => Ok(CatalogId::Source),
            "imdb" => Ok(CatalogId::Imdb),
            "tmdb" => Ok(CatalogId::Tmdb),
            other => Err(format!("unknown catalog '{}'", other)),
        }
    }
}

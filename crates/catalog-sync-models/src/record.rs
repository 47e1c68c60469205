use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared surface of the per-catalog record types.
///
/// The reconciler only needs to know which external id a record resolves to
/// and whether the record is an unresolved placeholder.
pub trait CatalogRecord: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Identity of the record on the remote list, if resolved
    fn external_id(&self) -> Option<String>;

    /// True for the all-null placeholder written when a lookup failed
    fn is_unavailable(&self) -> bool;

    /// The all-null placeholder
    fn unavailable() -> Self;
}

/// IMDB-side triple: display name, year and `tt` id.
///
/// Serialized as a three-element JSON array, `[null, null, null]` meaning the
/// title could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "(Option<String>, Option<String>, Option<String>)")]
#[serde(into = "(Option<String>, Option<String>, Option<String>)")]
pub struct LookupRecord {
    pub display_name: Option<String>,
    pub year: Option<String>,
    pub imdb_id: Option<String>,
}

impl LookupRecord {
    pub fn new(display_name: impl Into<String>, year: impl Into<String>, imdb_id: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            year: Some(year.into()),
            imdb_id: Some(imdb_id.into()),
        }
    }

    /// Record that only carries an id, as used for manual additions
    pub fn with_id(imdb_id: impl Into<String>) -> Self {
        Self {
            display_name: None,
            year: None,
            imdb_id: Some(imdb_id.into()),
        }
    }

    /// All three parts present
    pub fn is_complete(&self) -> bool {
        self.display_name.is_some() && self.year.is_some() && self.imdb_id.is_some()
    }
}

impl From<(Option<String>, Option<String>, Option<String>)> for LookupRecord {
    fn from((display_name, year, imdb_id): (Option<String>, Option<String>, Option<String>)) -> Self {
        Self { display_name, year, imdb_id }
    }
}

impl From<LookupRecord> for (Option<String>, Option<String>, Option<String>) {
    fn from(record: LookupRecord) -> Self {
        (record.display_name, record.year, record.imdb_id)
    }
}

impl CatalogRecord for LookupRecord {
    fn external_id(&self) -> Option<String> {
        self.imdb_id.clone()
    }

    fn is_unavailable(&self) -> bool {
        self.display_name.is_none() && self.year.is_none() && self.imdb_id.is_none()
    }

    fn unavailable() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TmdbMediaType {
    Movie,
    Tv,
}

impl TmdbMediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TmdbMediaType::Movie => "movie",
            TmdbMediaType::Tv => "tv",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(TmdbMediaType::Movie),
            "tv" => Some(TmdbMediaType::Tv),
            _ => None,
        }
    }
}

impl fmt::Display for TmdbMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TMDB-side triple: numeric id, media type and the IMDB id it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "(Option<u64>, Option<TmdbMediaType>, Option<String>)")]
#[serde(into = "(Option<u64>, Option<TmdbMediaType>, Option<String>)")]
pub struct TmdbRecord {
    pub tmdb_id: Option<u64>,
    pub media_type: Option<TmdbMediaType>,
    pub imdb_id: Option<String>,
}

impl TmdbRecord {
    pub fn new(tmdb_id: u64, media_type: TmdbMediaType, imdb_id: impl Into<String>) -> Self {
        Self {
            tmdb_id: Some(tmdb_id),
            media_type: Some(media_type),
            imdb_id: Some(imdb_id.into()),
        }
    }

    /// Unresolved record that remembers which IMDB id was tried
    pub fn unresolved(imdb_id: Option<String>) -> Self {
        Self {
            tmdb_id: None,
            media_type: None,
            imdb_id,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.tmdb_id.is_some() && self.media_type.is_some() && self.imdb_id.is_some()
    }
}

impl From<(Option<u64>, Option<TmdbMediaType>, Option<String>)> for TmdbRecord {
    fn from((tmdb_id, media_type, imdb_id): (Option<u64>, Option<TmdbMediaType>, Option<String>)) -> Self {
        Self { tmdb_id, media_type, imdb_id }
    }
}

impl From<TmdbRecord> for (Option<u64>, Option<TmdbMediaType>, Option<String>) {
    fn from(record: TmdbRecord) -> Self {
        (record.tmdb_id, record.media_type, record.imdb_id)
    }
}

impl CatalogRecord for TmdbRecord {
    /// TMDB lists hold `(media_type, id)` pairs, so that pair is the remote identity
    fn external_id(&self) -> Option<String> {
        match (self.media_type, self.tmdb_id) {
            (Some(media_type), Some(id)) => Some(format!("{}:{}", media_type, id)),
            _ => None,
        }
    }

    fn is_unavailable(&self) -> bool {
        self.tmdb_id.is_none() && self.media_type.is_none() && self.imdb_id.is_none()
    }

    fn unavailable() -> Self {
        Self::default()
    }
}

/// Remote id cache entry: the list item id the platform assigned and the
/// external id it was added under. Serialized as `[remoteItemId, externalId]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct RemoteEntry {
    pub remote_item_id: String,
    pub external_id: String,
}

impl RemoteEntry {
    pub fn new(remote_item_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            remote_item_id: remote_item_id.into(),
            external_id: external_id.into(),
        }
    }
}

impl From<(String, String)> for RemoteEntry {
    fn from((remote_item_id, external_id): (String, String)) -> Self {
        Self { remote_item_id, external_id }
    }
}

impl From<RemoteEntry> for (String, String) {
    fn from(entry: RemoteEntry) -> Self {
        (entry.remote_item_id, entry.external_id)
    }
}

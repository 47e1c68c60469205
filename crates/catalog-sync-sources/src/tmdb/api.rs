use crate::error::SourceError;
use catalog_sync_models::TmdbMediaType;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct FindResult {
    id: u64,
    /// Only set on episode results
    show_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindResult>,
    #[serde(default)]
    tv_results: Vec<FindResult>,
    #[serde(default)]
    tv_episode_results: Vec<FindResult>,
}

/// Status envelope of the v4 list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListStatus {
    pub success: Option<bool>,
    pub status_code: Option<i64>,
    pub status_message: Option<String>,
}

impl ListStatus {
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(false) || self.status_code == Some(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub media_type: TmdbMediaType,
    pub media_id: u64,
}

#[derive(Debug, Serialize)]
struct ItemsRequest<'a> {
    items: &'a [ListItem],
}

#[derive(Debug, Deserialize)]
pub struct ItemResult {
    pub media_type: TmdbMediaType,
    pub media_id: u64,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ItemsResponse {
    #[serde(flatten)]
    pub status: ListStatus,
    #[serde(default)]
    pub results: Vec<ItemResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListEntry {
    pub id: u64,
    pub media_type: TmdbMediaType,
}

#[derive(Debug, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub results: Vec<ListEntry>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

fn authorized(request: RequestBuilder, access_token: &str) -> RequestBuilder {
    request
        .header("Authorization", format!("Bearer {}", access_token))
        .header("Accept", "application/json")
}

async fn check_status(response: Response, context: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    warn!("TMDB {} failed: {} - {}", context, status, error_text);
    Err(SourceError::from_status(status.as_u16(), context))
}

/// Resolve an IMDB id to a TMDB id and media type.
///
/// Movies win over shows, and an episode match resolves to its show.
pub async fn find_by_imdb_id(
    client: &Client,
    base_url: &str,
    api_key: &str,
    imdb_id: &str,
) -> Result<Option<(u64, TmdbMediaType)>, SourceError> {
    let url = format!("{}/3/find/{}", base_url, imdb_id);
    let response = client
        .get(&url)
        .query(&[("api_key", api_key), ("external_source", "imdb_id")])
        .header("Accept", "application/json")
        .send()
        .await?;
    let found: FindResponse = check_status(response, "find").await?.json().await?;

    if let Some(movie) = found.movie_results.first() {
        return Ok(Some((movie.id, TmdbMediaType::Movie)));
    }
    if let Some(show) = found.tv_results.first() {
        return Ok(Some((show.id, TmdbMediaType::Tv)));
    }
    if let Some(episode) = found.tv_episode_results.first() {
        return Ok(Some((episode.show_id.unwrap_or(episode.id), TmdbMediaType::Tv)));
    }
    debug!("No TMDB result for {}", imdb_id);
    Ok(None)
}

pub async fn clear_list(client: &Client, base_url: &str, access_token: &str, list_id: &str) -> Result<(), SourceError> {
    let url = format!("{}/4/list/{}/clear", base_url, list_id);
    let response = authorized(client.get(&url), access_token).send().await?;
    let status: ListStatus = check_status(response, "clear").await?.json().await?;
    if status.is_success() {
        Ok(())
    } else {
        Err(SourceError::rejected(format!(
            "TMDB refused to clear list {}: {}",
            list_id,
            status.status_message.unwrap_or_default()
        )))
    }
}

pub async fn add_items(
    client: &Client,
    base_url: &str,
    access_token: &str,
    list_id: &str,
    items: &[ListItem],
) -> Result<ItemsResponse, SourceError> {
    let url = format!("{}/4/list/{}/items", base_url, list_id);
    let response = authorized(client.post(&url), access_token)
        .json(&ItemsRequest { items })
        .send()
        .await?;
    Ok(check_status(response, "add items").await?.json().await?)
}

pub async fn remove_items(
    client: &Client,
    base_url: &str,
    access_token: &str,
    list_id: &str,
    items: &[ListItem],
) -> Result<ItemsResponse, SourceError> {
    let url = format!("{}/4/list/{}/items", base_url, list_id);
    let response = authorized(client.delete(&url), access_token)
        .json(&ItemsRequest { items })
        .send()
        .await?;
    Ok(check_status(response, "remove items").await?.json().await?)
}

pub async fn get_list_page(
    client: &Client,
    base_url: &str,
    access_token: &str,
    list_id: &str,
    page: u32,
) -> Result<ListPage, SourceError> {
    let url = format!("{}/4/list/{}", base_url, list_id);
    let response = authorized(client.get(&url), access_token)
        .query(&[("page", page.to_string()), ("language", "en-US".to_string())])
        .send()
        .await?;
    Ok(check_status(response, "list page").await?.json().await?)
}

use super::api::{self, ListItem};
use super::{build_client, external_id, parse_external_id};
use crate::error::SourceError;
use crate::traits::{AddRequest, BatchAddOutcome, BatchDeleteOutcome, RemoteAnchors, RemoteListAdapter, ReorderMove};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

/// TMDB v4 list over the REST API.
///
/// Items are identified by `(media_type, id)`, so the remote item id kept in
/// the remote id cache is the external id itself.
pub struct TmdbListAdapter {
    client: Option<Client>,
    base_url: String,
    list_id: String,
    access_token: Option<String>,
}

impl TmdbListAdapter {
    pub fn new(base_url: impl Into<String>, list_id: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            client: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            list_id: list_id.into(),
            access_token,
        }
    }

    fn session(&self) -> Result<(&Client, &str), SourceError> {
        match (&self.client, &self.access_token) {
            (Some(client), Some(token)) => Ok((client, token.as_str())),
            _ => Err(SourceError::SessionLost("TMDB session not open".to_string())),
        }
    }
}

fn to_list_items<'a, I>(external_ids: I) -> Result<Vec<ListItem>, SourceError>
where
    I: IntoIterator<Item = &'a String>,
{
    external_ids
        .into_iter()
        .map(|id| {
            parse_external_id(id)
                .map(|(media_type, media_id)| ListItem { media_type, media_id })
                .ok_or_else(|| SourceError::rejected(format!("'{}' is not a TMDB list item id", id)))
        })
        .collect()
}

#[async_trait]
impl RemoteListAdapter for TmdbListAdapter {
    fn platform_name(&self) -> &str {
        "tmdb"
    }

    async fn open_session(&mut self) -> Result<(), SourceError> {
        let token = self
            .access_token
            .clone()
            .ok_or_else(|| SourceError::SessionAcquisition("no TMDB access token configured".to_string()))?;
        let client = build_client()?;

        // a cheap authenticated read proves the token and the list id
        let page = api::get_list_page(&client, &self.base_url, &token, &self.list_id, 1)
            .await
            .map_err(|e| SourceError::SessionAcquisition(format!("TMDB list {} not reachable: {}", self.list_id, e)))?;
        info!(list_id = %self.list_id, items = page.total_results, "TMDB list session ready");

        self.client = Some(client);
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), SourceError> {
        let (client, token) = self.session()?;
        api::clear_list(client, &self.base_url, token, &self.list_id).await?;
        info!(list_id = %self.list_id, "TMDB list cleared");
        Ok(())
    }

    async fn add_batch(&mut self, items: &[AddRequest]) -> BatchAddOutcome {
        let (client, token) = match self.session() {
            Ok(session) => session,
            Err(e) => return BatchAddOutcome::failed(e),
        };
        let list_items = match to_list_items(items.iter().map(|item| &item.external_id)) {
            Ok(list_items) => list_items,
            Err(e) => return BatchAddOutcome::failed(e),
        };

        let response = match api::add_items(client, &self.base_url, token, &self.list_id, &list_items).await {
            Ok(response) => response,
            Err(e) => {
                warn!("TMDB add batch of {} failed: {}", items.len(), e);
                return BatchAddOutcome::failed(e);
            }
        };

        let mut outcome = BatchAddOutcome::default();
        if response.results.is_empty() {
            // older responses only carry the envelope
            if response.status.is_success() {
                outcome.confirmed = items.iter().map(|i| (i.key.clone(), i.external_id.clone())).collect();
            } else {
                outcome.refused = items.iter().map(|i| i.key.clone()).collect();
            }
            return outcome;
        }

        for item in items {
            let accepted = response
                .results
                .iter()
                .any(|r| r.success && external_id(r.media_type, r.media_id) == item.external_id);
            if accepted {
                outcome.confirmed.push((item.key.clone(), item.external_id.clone()));
            } else {
                debug!(key = %item.key, id = %item.external_id, "TMDB refused list add");
                outcome.refused.push(item.key.clone());
            }
        }
        outcome
    }

    async fn delete_batch(&mut self, remote_item_ids: &[String]) -> BatchDeleteOutcome {
        if remote_item_ids.is_empty() {
            return BatchDeleteOutcome::default();
        }
        let (client, token) = match self.session() {
            Ok(session) => session,
            Err(e) => return BatchDeleteOutcome::failed(e),
        };
        let list_items = match to_list_items(remote_item_ids) {
            Ok(list_items) => list_items,
            Err(e) => return BatchDeleteOutcome::failed(e),
        };

        let response = match api::remove_items(client, &self.base_url, token, &self.list_id, &list_items).await {
            Ok(response) => response,
            Err(e) => {
                warn!("TMDB delete batch of {} failed: {}", remote_item_ids.len(), e);
                return BatchDeleteOutcome::failed(e);
            }
        };

        if response.results.is_empty() {
            if response.status.is_success() {
                return BatchDeleteOutcome::all(remote_item_ids);
            }
            return BatchDeleteOutcome::failed(SourceError::rejected(format!(
                "TMDB refused to remove {} items: {}",
                remote_item_ids.len(),
                response.status.status_message.unwrap_or_default()
            )));
        }

        let mut outcome = BatchDeleteOutcome::default();
        let mut unanswered = Vec::new();
        for id in remote_item_ids {
            let result = response
                .results
                .iter()
                .find(|r| &external_id(r.media_type, r.media_id) == id);
            match result {
                Some(r) if r.success => outcome.confirmed.push(id.clone()),
                Some(_) => {
                    debug!(id = %id, "TMDB refused list removal");
                    outcome.refused.push(id.clone());
                }
                None => unanswered.push(id.as_str()),
            }
        }
        if !unanswered.is_empty() {
            outcome.error = Some(SourceError::UnknownOutcome(format!(
                "TMDB did not report on removing {}",
                unanswered.join(", ")
            )));
        }
        outcome
    }

    async fn reorder(&mut self, _moves: &[ReorderMove]) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("reorder", "tmdb"))
    }

    async fn first_and_last_remote_ids(&mut self) -> Result<Option<RemoteAnchors>, SourceError> {
        let (client, token) = self.session()?;
        let first_page = api::get_list_page(client, &self.base_url, token, &self.list_id, 1).await?;
        let first = match first_page.results.first() {
            Some(entry) => external_id(entry.media_type, entry.id),
            None => return Ok(None),
        };

        let last_entry = if first_page.total_pages > 1 {
            api::get_list_page(client, &self.base_url, token, &self.list_id, first_page.total_pages)
                .await?
                .results
                .last()
                .cloned()
        } else {
            first_page.results.last().cloned()
        };
        let last = last_entry
            .map(|entry| external_id(entry.media_type, entry.id))
            .ok_or_else(|| SourceError::transient("TMDB list last page came back empty"))?;

        Ok(Some(RemoteAnchors { first, last }))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.client = None;
        Ok(())
    }
}

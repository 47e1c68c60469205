use super::{list_edit_url, selectors, title_id_from_href, IMDB_BASE_URL};
use crate::browser::{BrowserOptions, BrowserSession};
use crate::error::SourceError;
use crate::traits::{AddRequest, BatchAddOutcome, BatchDeleteOutcome, RemoteAnchors, RemoteListAdapter, ReorderMove};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);
const CLEAR_SETTLE: Duration = Duration::from_secs(2);
/// Each round deletes one page of the edit view; this bounds a list of ~25k items
const MAX_CLEAR_ROUNDS: usize = 250;

/// Hidden form field the list endpoints expect alongside every POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormToken {
    pub name: String,
    pub value: String,
}

impl FormToken {
    fn encoded(&self) -> String {
        format!("{}={}", self.name, urlencoding::encode(&self.value))
    }
}

/// What the in-page `fetch` hands back to us
#[derive(Debug, Deserialize)]
struct FetchResponse {
    status: u16,
    #[serde(default)]
    body: String,
}

impl FetchResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// IMDB list driven through a logged-in browser page.
///
/// Every write is a form POST issued by `fetch` inside the page, so the
/// request carries the user's cookies and the edit page's form token.
pub struct ImdbListAdapter {
    options: BrowserOptions,
    list_id: String,
    page_timeout: Duration,
    session: Option<BrowserSession>,
    token: Option<FormToken>,
}

impl ImdbListAdapter {
    pub fn new(options: BrowserOptions, list_id: impl Into<String>, page_timeout: Duration) -> Self {
        Self {
            options,
            list_id: list_id.into(),
            page_timeout,
            session: None,
            token: None,
        }
    }

    fn session(&self) -> Result<&BrowserSession, SourceError> {
        self.session
            .as_ref()
            .ok_or_else(|| SourceError::SessionLost("IMDB session not open".to_string()))
    }

    fn token(&self) -> Result<&FormToken, SourceError> {
        self.token
            .as_ref()
            .ok_or_else(|| SourceError::SessionLost("IMDB form token not loaded".to_string()))
    }

    async fn read_form_token(&self) -> Result<FormToken, SourceError> {
        let session = self.session()?;
        let input = session
            .wait_for(selectors::LIST_FORM_TOKEN, self.page_timeout)
            .await?
            .ok_or_else(|| {
                SourceError::SessionAcquisition("list edit page has no form token, is the profile logged in?".to_string())
            })?;
        let name = input.attribute("id").await?.unwrap_or_default();
        let value = input.attribute("value").await?.unwrap_or_default();
        if name.is_empty() || value.is_empty() {
            return Err(SourceError::SessionAcquisition("empty form token on list edit page".to_string()));
        }
        Ok(FormToken { name, value })
    }

    async fn post_form(&self, url: &str, body: &str) -> Result<FetchResponse, SourceError> {
        let value = self.session()?.evaluate(&post_form_script(url, body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn add_one(&self, request: &AddRequest) -> Result<Option<String>, SourceError> {
        let url = format!("{}/list/{}/{}/add", IMDB_BASE_URL, self.list_id, request.external_id);
        let response = self.post_form(&url, &self.token()?.encoded()).await?;
        add_result(&response, &request.external_id)
    }

    /// External id of the first title on the edit page in the given sort order
    async fn anchor(&self, order: &str) -> Result<Option<String>, SourceError> {
        let session = self.session()?;
        session
            .goto(&format!("{}?sort=list_order,{}", list_edit_url(&self.list_id), order))
            .await?;
        match session.wait_for(selectors::LIST_FIRST_TITLE_LINK, self.page_timeout).await? {
            Some(link) => Ok(link.attribute("href").await?.as_deref().and_then(title_id_from_href)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RemoteListAdapter for ImdbListAdapter {
    fn platform_name(&self) -> &str {
        "imdb"
    }

    fn supports_reorder(&self) -> bool {
        true
    }

    async fn open_session(&mut self) -> Result<(), SourceError> {
        if self.session.is_none() {
            self.session = Some(BrowserSession::launch(&self.options).await?);
        }
        self.session()?
            .goto(&list_edit_url(&self.list_id))
            .await
            .map_err(|e| SourceError::SessionAcquisition(format!("cannot open list {}: {}", self.list_id, e)))?;
        self.token = Some(self.read_form_token().await?);
        info!(list_id = %self.list_id, "IMDB list session ready");
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), SourceError> {
        let session = self.session()?;
        let edit_url = list_edit_url(&self.list_id);

        for round in 1..=MAX_CLEAR_ROUNDS {
            session.goto(&edit_url).await?;
            if session.wait_for(selectors::LIST_FIRST_TITLE_LINK, CONTROL_TIMEOUT).await?.is_none() {
                info!(list_id = %self.list_id, rounds = round - 1, "IMDB list cleared");
                return Ok(());
            }

            for selector in [
                selectors::LIST_SELECT_ALL,
                selectors::LIST_DELETE_BUTTON,
                selectors::LIST_CONFIRM_DELETE,
            ] {
                if !session.click(selector, CONTROL_TIMEOUT).await? {
                    return Err(SourceError::rejected(format!("list edit control '{}' not found", selector)));
                }
            }
            debug!("Clear round {} submitted", round);
            sleep(CLEAR_SETTLE).await;
        }

        Err(SourceError::transient(format!(
            "list {} still has items after {} clear rounds",
            self.list_id, MAX_CLEAR_ROUNDS
        )))
    }

    async fn add_batch(&mut self, items: &[AddRequest]) -> BatchAddOutcome {
        let mut outcome = BatchAddOutcome::default();
        for item in items {
            match self.add_one(item).await {
                Ok(Some(item_id)) => {
                    debug!(key = %item.key, item_id = %item_id, "Added to IMDB list");
                    outcome.confirmed.push((item.key.clone(), item_id));
                }
                Ok(None) => {
                    warn!(key = %item.key, imdb_id = %item.external_id, "IMDB refused list add");
                    outcome.refused.push(item.key.clone());
                }
                Err(e) => {
                    warn!(key = %item.key, "IMDB add stopped the batch: {}", e);
                    outcome.error = Some(e);
                    break;
                }
            }
        }
        outcome
    }

    async fn delete_batch(&mut self, remote_item_ids: &[String]) -> BatchDeleteOutcome {
        if remote_item_ids.is_empty() {
            return BatchDeleteOutcome::default();
        }
        let url = format!("{}/list/items/{}/delete", IMDB_BASE_URL, self.list_id);
        let body = match self.token() {
            Ok(token) => delete_body(remote_item_ids, token),
            Err(e) => return BatchDeleteOutcome::failed(e),
        };
        match self.post_form(&url, &body).await {
            Ok(response) if response.is_success() => {
                debug!("Deleted {} items from IMDB list", remote_item_ids.len());
                BatchDeleteOutcome::all(remote_item_ids)
            }
            Ok(response) => BatchDeleteOutcome::failed(SourceError::from_status(response.status, "IMDB delete")),
            Err(e) => BatchDeleteOutcome::failed(e),
        }
    }

    async fn reorder(&mut self, moves: &[ReorderMove]) -> Result<(), SourceError> {
        let url = format!("{}/list/{}/edit/reorderitems", IMDB_BASE_URL, self.list_id);
        for step in moves {
            let response = self.post_form(&url, &reorder_body(step, self.token()?)).await?;
            if !response.is_success() {
                return Err(SourceError::from_status(response.status, "IMDB reorder"));
            }
        }
        Ok(())
    }

    async fn first_and_last_remote_ids(&mut self) -> Result<Option<RemoteAnchors>, SourceError> {
        let first = match self.anchor("asc").await? {
            Some(id) => id,
            None => return Ok(None),
        };
        let last = self
            .anchor("desc")
            .await?
            .ok_or_else(|| SourceError::transient("list has a first title but no last title"))?;
        Ok(Some(RemoteAnchors { first, last }))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.token = None;
        if let Some(mut session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}

/// Script that POSTs a form body from inside the page and resolves to
/// `{status, body}`. Arguments go through JSON so quoting is never an issue.
fn post_form_script(url: &str, body: &str) -> String {
    let url = serde_json::Value::String(url.to_string());
    let body = serde_json::Value::String(body.to_string());
    format!(
        r#"(async () => {{
    const response = await fetch({url}, {{
        method: "POST",
        credentials: "include",
        headers: {{ "Content-Type": "application/x-www-form-urlencoded" }},
        body: {body},
    }});
    return {{ status: response.status, body: await response.text() }};
}})()"#
    )
}

/// `Ok(None)` is an explicit refusal. A 2xx answer without an item id means
/// the title may be on the list without us knowing where, so it stops the batch.
fn add_result(response: &FetchResponse, imdb_id: &str) -> Result<Option<String>, SourceError> {
    if !response.is_success() {
        return match SourceError::from_status(response.status, "IMDB add") {
            SourceError::Rejected(_) => Ok(None),
            other => Err(other),
        };
    }
    match list_item_id_from_body(&response.body) {
        Some(item_id) => Ok(Some(item_id)),
        None => Err(SourceError::UnknownOutcome(format!(
            "IMDB accepted {} but returned no list item id",
            imdb_id
        ))),
    }
}

fn list_item_id_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("list_item_id")? {
        serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn delete_body(remote_item_ids: &[String], token: &FormToken) -> String {
    let items = remote_item_ids
        .iter()
        .map(|id| if id.starts_with("li") { id.clone() } else { format!("li{}", id) })
        .collect::<Vec<_>>()
        .join(",");
    format!("items={}&{}", urlencoding::encode(&items), token.encoded())
}

fn reorder_body(step: &ReorderMove, token: &FormToken) -> String {
    let mut order = serde_json::Map::new();
    order.insert(step.remote_item_id.clone(), serde_json::Value::from(step.position));
    let order = serde_json::Value::Object(order);
    format!("newListOrder={}&{}", urlencoding::encode(&order.to_string()), token.encoded())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> FormToken {
        FormToken {
            name: "49e6c".to_string(),
            value: "a/b+c".to_string(),
        }
    }

    #[test]
    fn test_delete_body_prefixes_item_ids() {
        let body = delete_body(&["123".to_string(), "li456".to_string()], &token());
        assert_eq!(body, "items=li123%2Cli456&49e6c=a%2Fb%2Bc");
    }

    #[test]
    fn test_reorder_body() {
        let step = ReorderMove {
            remote_item_id: "987".to_string(),
            position: 3,
        };
        assert_eq!(
            reorder_body(&step, &token()),
            "newListOrder=%7B%22987%22%3A3%7D&49e6c=a%2Fb%2Bc"
        );
    }

    #[test]
    fn test_list_item_id_from_body() {
        assert_eq!(list_item_id_from_body(r#"{"list_item_id":"5512"}"#), Some("5512".to_string()));
        assert_eq!(list_item_id_from_body(r#"{"list_item_id":5512,"status":200}"#), Some("5512".to_string()));
        assert_eq!(list_item_id_from_body(r#"{"status":200}"#), None);
        assert_eq!(list_item_id_from_body("<html>"), None);
    }

    #[test]
    fn test_add_result() {
        let accepted = FetchResponse {
            status: 200,
            body: r#"{"list_item_id":"5512"}"#.to_string(),
        };
        assert_eq!(add_result(&accepted, "tt1").unwrap(), Some("5512".to_string()));

        let refused = FetchResponse {
            status: 403,
            body: String::new(),
        };
        assert_eq!(add_result(&refused, "tt1").unwrap(), None);

        let throttled = FetchResponse {
            status: 429,
            body: String::new(),
        };
        assert!(add_result(&throttled, "tt1").unwrap_err().is_transient());
    }

    #[test]
    fn test_add_without_item_id_is_unknown_outcome() {
        let response = FetchResponse {
            status: 200,
            body: r#"{"status":200}"#.to_string(),
        };
        let err = add_result(&response, "tt1160419").unwrap_err();
        assert_eq!(err.category(), "unknown_outcome");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_post_form_script_quotes_arguments() {
        let script = post_form_script("https://www.imdb.com/list/ls1/tt1/add", "a=\"b\"");
        assert!(script.contains(r#"fetch("https://www.imdb.com/list/ls1/tt1/add""#));
        assert!(script.contains(r#"body: "a=\"b\"""#));
    }

    #[tokio::test]
    async fn test_calls_before_open_session_are_session_errors() {
        let options = BrowserOptions {
            profile_dir: std::env::temp_dir().join("catalog-sync-test-profile"),
            executable: None,
            headless: true,
        };
        let mut adapter = ImdbListAdapter::new(options, "ls1", Duration::from_secs(1));
        let deleted = adapter.delete_batch(&["1".to_string()]).await;
        assert!(deleted.confirmed.is_empty());
        assert!(deleted.error.as_ref().is_some_and(|e| e.is_fatal()));

        let outcome = adapter
            .add_batch(&[AddRequest {
                key: "Dune|2021".into(),
                external_id: "tt1160419".to_string(),
            }])
            .await;
        assert!(outcome.confirmed.is_empty());
        assert!(outcome.error.as_ref().is_some_and(|e| e.is_fatal()));
    }
}

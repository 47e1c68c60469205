//! In-memory stand-ins for the remote list and the scrapers.

use crate::store::RemoteCacheSink;
use async_trait::async_trait;
use catalog_sync_models::{LookupRecord, RemoteIdCache, TmdbRecord};
use catalog_sync_sources::{
    AddRequest, BatchAddOutcome, BatchDeleteOutcome, ListingPage, ListingScraper, LookupScraper, RemoteAnchors,
    RemoteListAdapter, ReorderMove, SourceError, TitleQuery,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Remote list held as `(item id, external id)` pairs in list order
pub struct MemoryList {
    pub items: Vec<(String, String)>,
    next_id: usize,
    pub reorderable: bool,
    pub calls: Vec<&'static str>,
    pub add_calls: usize,
    pub delete_calls: Vec<Vec<String>>,
    pub reorder_calls: usize,
    /// 1-based add calls that fail with a transient error
    pub fail_add_calls: HashSet<usize>,
    pub lose_session_on_add_call: Option<usize>,
    /// External ids the remote refuses
    pub refuse: HashSet<String>,
    pub fail_delete: bool,
    /// Item ids the remote refuses to delete
    pub keep: HashSet<String>,
    pub fail_reorder_call: Option<usize>,
    pub fail_open: bool,
}

impl MemoryList {
    pub fn new() -> Self {
        Self::with_items(&[])
    }

    pub fn with_items(items: &[(&str, &str)]) -> Self {
        Self {
            items: items.iter().map(|(id, ext)| (id.to_string(), ext.to_string())).collect(),
            next_id: items.len() + 1,
            reorderable: true,
            calls: Vec::new(),
            add_calls: 0,
            delete_calls: Vec::new(),
            reorder_calls: 0,
            fail_add_calls: HashSet::new(),
            lose_session_on_add_call: None,
            refuse: HashSet::new(),
            fail_delete: false,
            keep: HashSet::new(),
            fail_reorder_call: None,
            fail_open: false,
        }
    }

    pub fn external_ids(&self) -> Vec<&str> {
        self.items.iter().map(|(_, ext)| ext.as_str()).collect()
    }
}

#[async_trait]
impl RemoteListAdapter for MemoryList {
    fn platform_name(&self) -> &str {
        "memory"
    }

    fn supports_reorder(&self) -> bool {
        self.reorderable
    }

    async fn open_session(&mut self) -> Result<(), SourceError> {
        self.calls.push("open");
        if self.fail_open {
            return Err(SourceError::SessionAcquisition("no session".to_string()));
        }
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), SourceError> {
        self.calls.push("clear");
        self.items.clear();
        Ok(())
    }

    async fn add_batch(&mut self, items: &[AddRequest]) -> BatchAddOutcome {
        self.calls.push("add");
        self.add_calls += 1;
        if self.lose_session_on_add_call == Some(self.add_calls) {
            return BatchAddOutcome::failed(SourceError::SessionLost("page closed".to_string()));
        }
        if self.fail_add_calls.contains(&self.add_calls) {
            return BatchAddOutcome::failed(SourceError::transient("timeout"));
        }

        let mut outcome = BatchAddOutcome::default();
        for item in items {
            if self.refuse.contains(&item.external_id) {
                outcome.refused.push(item.key.clone());
                continue;
            }
            let item_id = format!("li{}", self.next_id);
            self.next_id += 1;
            self.items.push((item_id.clone(), item.external_id.clone()));
            outcome.confirmed.push((item.key.clone(), item_id));
        }
        outcome
    }

    async fn delete_batch(&mut self, remote_item_ids: &[String]) -> BatchDeleteOutcome {
        self.calls.push("delete");
        self.delete_calls.push(remote_item_ids.to_vec());
        if self.fail_delete {
            return BatchDeleteOutcome::failed(SourceError::transient("timeout"));
        }
        let mut outcome = BatchDeleteOutcome::default();
        for id in remote_item_ids {
            if self.keep.contains(id) {
                outcome.refused.push(id.clone());
            } else {
                self.items.retain(|(item_id, _)| item_id != id);
                outcome.confirmed.push(id.clone());
            }
        }
        outcome
    }

    async fn reorder(&mut self, moves: &[ReorderMove]) -> Result<(), SourceError> {
        self.calls.push("reorder");
        self.reorder_calls += 1;
        if self.fail_reorder_call == Some(self.reorder_calls) {
            return Err(SourceError::transient("timeout"));
        }
        for request in moves {
            if let Some(from) = self.items.iter().position(|(id, _)| id == &request.remote_item_id) {
                let item = self.items.remove(from);
                let to = request.position.saturating_sub(1).min(self.items.len());
                self.items.insert(to, item);
            }
        }
        Ok(())
    }

    async fn first_and_last_remote_ids(&mut self) -> Result<Option<RemoteAnchors>, SourceError> {
        self.calls.push("anchors");
        Ok(match (self.items.first(), self.items.last()) {
            (Some((_, first)), Some((_, last))) => Some(RemoteAnchors {
                first: first.clone(),
                last: last.clone(),
            }),
            _ => None,
        })
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.calls.push("close");
        Ok(())
    }
}

/// Keeps every checkpointed snapshot
#[derive(Default)]
pub struct RecordingSink {
    pub snapshots: Arc<Mutex<Vec<RemoteIdCache>>>,
}

impl RemoteCacheSink for RecordingSink {
    fn checkpoint(&mut self, cache: &RemoteIdCache) -> anyhow::Result<()> {
        self.snapshots
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(cache.clone());
        Ok(())
    }
}

/// IMDB-style lookups answered from a name → record table.
/// Names mapped to `None` fail as unavailable; unknown names fail as transient.
#[derive(Default)]
pub struct FakeImdbLookup {
    pub answers: HashMap<String, Option<LookupRecord>>,
    pub lose_session_at: Option<usize>,
    pub queries: Vec<TitleQuery>,
}

impl FakeImdbLookup {
    pub fn answer(mut self, name: &str, record: Option<LookupRecord>) -> Self {
        self.answers.insert(name.to_string(), record);
        self
    }
}

#[async_trait]
impl LookupScraper for FakeImdbLookup {
    type Query = TitleQuery;
    type Record = LookupRecord;

    fn scraper_name(&self) -> &str {
        "fake-imdb"
    }

    async fn fetch_lookup(&mut self, query: &TitleQuery) -> Result<LookupRecord, SourceError> {
        self.queries.push(query.clone());
        if self.lose_session_at == Some(self.queries.len()) {
            return Err(SourceError::SessionLost("browser closed".to_string()));
        }
        match self.answers.get(&query.name) {
            Some(Some(record)) => Ok(record.clone()),
            Some(None) => Err(SourceError::LookupUnavailable(query.name.clone())),
            None => Err(SourceError::transient("timeout")),
        }
    }
}

/// TMDB find-by-imdb-id answered from a table
#[derive(Default)]
pub struct FakeTmdbLookup {
    pub answers: HashMap<String, TmdbRecord>,
    pub queries: Vec<String>,
}

#[async_trait]
impl LookupScraper for FakeTmdbLookup {
    type Query = String;
    type Record = TmdbRecord;

    fn scraper_name(&self) -> &str {
        "fake-tmdb"
    }

    async fn fetch_lookup(&mut self, imdb_id: &String) -> Result<TmdbRecord, SourceError> {
        self.queries.push(imdb_id.clone());
        self.answers
            .get(imdb_id)
            .cloned()
            .ok_or_else(|| SourceError::LookupUnavailable(imdb_id.clone()))
    }
}

/// Listing pages, page 1 first
#[derive(Default)]
pub struct FakeListing {
    pub pages: Vec<Vec<String>>,
    pub requested: Vec<u32>,
}

#[async_trait]
impl ListingScraper for FakeListing {
    async fn fetch_listing(&mut self, _url_path: &str, page: u32) -> Result<ListingPage, SourceError> {
        self.requested.push(page);
        let titles = self
            .pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .ok_or_else(|| SourceError::transient(format!("no page {}", page)))?;
        Ok(ListingPage {
            titles,
            max_page: self.pages.len() as u32,
        })
    }
}

//! List-level flows: what a user runs against one remote list.
//!
//! Each flow opens the adapter's session, does its work through a
//! [`SyncExecutor`] and closes the session again on every exit path.

use crate::batch::Pacing;
use crate::dedup::DedupGuard;
use crate::error::SyncError;
use crate::reconcile::reconcile;
use crate::report::SyncReport;
use crate::store::{CatalogStore, Untracked};
use crate::sync::SyncExecutor;
use anyhow::anyhow;
use catalog_sync_config::{CatalogFile, SyncOptions};
use catalog_sync_models::{
    CanonicalOrder, CatalogId, CatalogRecord, DuplicateRegister, LookupRecord, OrderedCache, RemoteIdCache, TitleKey,
    TmdbRecord,
};
use catalog_sync_sources::{AddRequest, RemoteAnchors, RemoteListAdapter};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFlow {
    /// Reconcile against the remote id cache
    Sync,
    /// Clear the list and upload the whole catalog
    Upload,
    /// Anchored catch-up of a list the remote id cache does not track
    Update,
    Clear,
}

impl ListFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListFlow::Sync => "sync",
            ListFlow::Upload => "upload",
            ListFlow::Update => "update",
            ListFlow::Clear => "clear",
        }
    }
}

pub struct ListFlows {
    store: CatalogStore,
    max_batch_size: usize,
    pacing: Pacing,
}

impl ListFlows {
    pub fn new(store: CatalogStore, options: &SyncOptions) -> Self {
        Self {
            store,
            max_batch_size: options.max_batch_size,
            pacing: Pacing::from_options(options),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn sync_catalog(&self, catalog: CatalogId, adapter: &mut dyn RemoteListAdapter) -> SyncReport {
        self.run(catalog, adapter, ListFlow::Sync).await
    }

    pub async fn upload_list(&self, catalog: CatalogId, adapter: &mut dyn RemoteListAdapter) -> SyncReport {
        self.run(catalog, adapter, ListFlow::Upload).await
    }

    pub async fn update_list(&self, catalog: CatalogId, adapter: &mut dyn RemoteListAdapter) -> SyncReport {
        self.run(catalog, adapter, ListFlow::Update).await
    }

    pub async fn clear_list(&self, catalog: CatalogId, adapter: &mut dyn RemoteListAdapter) -> SyncReport {
        self.run(catalog, adapter, ListFlow::Clear).await
    }

    #[instrument(skip(self, adapter))]
    pub async fn run(&self, catalog: CatalogId, adapter: &mut dyn RemoteListAdapter, flow: ListFlow) -> SyncReport {
        let start = Instant::now();
        info!(
            operation = "flow_start",
            catalog = %catalog,
            flow = flow.as_str(),
            "Starting {} of the {} list",
            flow.as_str(),
            catalog
        );

        let mut report = match adapter.open_session().await {
            Err(e) => {
                error!(operation = "session_failed", catalog = %catalog, "Could not open {} session: {}", catalog, e);
                SyncReport::aborted(catalog, e.to_string())
            }
            Ok(()) => {
                let result = match catalog {
                    CatalogId::Imdb => self.run_flow::<LookupRecord>(catalog, adapter, flow).await,
                    CatalogId::Tmdb => self.run_flow::<TmdbRecord>(catalog, adapter, flow).await,
                    CatalogId::Source => Err(SyncError::Store(anyhow!("the source catalog has no remote list"))),
                };
                result.unwrap_or_else(|e| {
                    error!(operation = "flow_failed", catalog = %catalog, category = e.category(), "{}", e);
                    SyncReport::aborted(catalog, e.to_string())
                })
            }
        };

        if let Err(e) = adapter.close().await {
            warn!("Closing the {} session failed: {}", catalog, e);
        }
        report.duration = start.elapsed();
        report
    }

    async fn run_flow<R: CatalogRecord>(
        &self,
        catalog: CatalogId,
        adapter: &mut dyn RemoteListAdapter,
        flow: ListFlow,
    ) -> Result<SyncReport, SyncError> {
        match flow {
            ListFlow::Clear => {
                self.clear(catalog, adapter).await?;
                Ok(SyncReport::new(catalog))
            }
            ListFlow::Upload => {
                let local = self.load_local_view::<R>(catalog)?;
                self.clear(catalog, adapter).await?;
                self.pacing.pause_after_clear().await;
                self.reconcile_and_execute(catalog, adapter, &local, RemoteIdCache::new()).await
            }
            ListFlow::Update => {
                let local = self.load_local_view::<R>(catalog)?;
                match adapter.first_and_last_remote_ids().await? {
                    Some(anchors) => self.catch_up(catalog, adapter, &local, &anchors).await,
                    None => {
                        info!("The {} list is empty, uploading the whole catalog", catalog);
                        self.reconcile_and_execute(catalog, adapter, &local, RemoteIdCache::new()).await
                    }
                }
            }
            ListFlow::Sync => {
                let local = self.load_local_view::<R>(catalog)?;
                let remote: RemoteIdCache = self.store.load(catalog, CatalogFile::RemoteIds)?;
                if remote.is_empty() {
                    if let Some(anchors) = adapter.first_and_last_remote_ids().await? {
                        info!("No remote id cache for a non-empty {} list, catching up from its anchors", catalog);
                        return self.catch_up(catalog, adapter, &local, &anchors).await;
                    }
                    info!("First sync of the {} list, uploading the whole catalog", catalog);
                }
                self.reconcile_and_execute(catalog, adapter, &local, remote).await
            }
        }
    }

    /// The catalog's cache as it should appear remotely: verified records
    /// (plus manual additions on the IMDB side) in source catalog order.
    pub fn load_local_view<R: CatalogRecord>(&self, catalog: CatalogId) -> Result<OrderedCache<R>, SyncError> {
        let mut view: OrderedCache<R> = self.store.load(catalog, CatalogFile::Cache)?;
        if catalog == CatalogId::Imdb {
            let additions: OrderedCache<R> = self.store.load(catalog, CatalogFile::ManualAdditions)?;
            view = view.merge(&additions);
        }
        let source: Vec<TitleKey> = self.store.load(CatalogId::Source, CatalogFile::Db)?;
        view.sort_by_order(&CanonicalOrder::new(&source));
        Ok(view)
    }

    async fn clear(&self, catalog: CatalogId, adapter: &mut dyn RemoteListAdapter) -> Result<(), SyncError> {
        adapter.clear().await?;
        self.store.delete(catalog, CatalogFile::RemoteIds)?;
        info!(operation = "list_cleared", catalog = %catalog, "Cleared the {} list", catalog);
        Ok(())
    }

    async fn reconcile_and_execute<R: CatalogRecord>(
        &self,
        catalog: CatalogId,
        adapter: &mut dyn RemoteListAdapter,
        local: &OrderedCache<R>,
        remote: RemoteIdCache,
    ) -> Result<SyncReport, SyncError> {
        let plan = reconcile(local, &remote);
        let guard = self.dedup_guard(catalog, local)?;
        let mut executor = SyncExecutor::new(catalog, adapter, remote, Box::new(self.store.remote_checkpoint(catalog)))
            .with_batch_size(self.max_batch_size)
            .with_pacing(self.pacing)
            .with_guard(guard);

        let mut report = executor.execute_sync(&plan).await;
        if let Err(e) = self.save_duplicates(catalog, executor.duplicates()) {
            report.fatal.get_or_insert(format!("could not save duplicates: {}", e));
        }
        Ok(report)
    }

    /// Add what is missing around the remote's anchors without touching the
    /// remote id cache: the list stays untracked, so running this again only
    /// adds what is still missing.
    async fn catch_up<R: CatalogRecord>(
        &self,
        catalog: CatalogId,
        adapter: &mut dyn RemoteListAdapter,
        local: &OrderedCache<R>,
        anchors: &RemoteAnchors,
    ) -> Result<SyncReport, SyncError> {
        let records: Vec<(&TitleKey, &R)> = local.iter().collect();
        let position_of = |external_id: &str| {
            records
                .iter()
                .position(|(_, record)| record.external_id().as_deref() == Some(external_id))
        };

        let first = position_of(&anchors.first).ok_or_else(|| {
            SyncError::UntrackedRemote(format!(
                "the first {} item {} is not in the local catalog, run upload instead",
                catalog, anchors.first
            ))
        })?;
        let tail_start = match position_of(&anchors.last) {
            Some(last) if last >= first => last + 1,
            _ => records.len(),
        };

        let mut unresolved = 0;
        let head = add_requests(&records[..first], &mut unresolved);
        let tail = add_requests(&records[tail_start..], &mut unresolved);
        info!(
            "{} titles before the first {} item, {} after the last",
            head.len(),
            catalog,
            tail.len()
        );

        let guard = self.dedup_guard(catalog, local)?;
        let mut executor = SyncExecutor::new(catalog, adapter, RemoteIdCache::new(), Box::new(Untracked))
            .with_batch_size(self.max_batch_size)
            .with_pacing(self.pacing)
            .with_guard(guard);
        let mut report = executor.execute_catch_up(&head, &tail).await;
        report.unresolved = unresolved;
        if let Err(e) = self.save_duplicates(catalog, executor.duplicates()) {
            report.fatal.get_or_insert(format!("could not save duplicates: {}", e));
        }
        Ok(report)
    }

    /// Every id cached for the catalog is owned before the sync starts: the
    /// lookup db first, then the local view. The executor hands ids already
    /// on the remote list to their holders.
    fn dedup_guard<R: CatalogRecord>(
        &self,
        catalog: CatalogId,
        local: &OrderedCache<R>,
    ) -> Result<DedupGuard, SyncError> {
        let db: OrderedCache<R> = self.store.load(catalog, CatalogFile::Db)?;
        let mut guard = DedupGuard::from_cache(&db);
        guard.claim_all(local);
        Ok(guard)
    }

    fn save_duplicates(&self, catalog: CatalogId, diverted: &DuplicateRegister) -> anyhow::Result<()> {
        if diverted.is_empty() {
            return Ok(());
        }
        let existing: DuplicateRegister = self.store.load(catalog, CatalogFile::Duplicates)?;
        let merged = existing.merge(diverted);
        self.store.save(catalog, CatalogFile::Duplicates, &merged)?;
        info!("Recorded {} duplicate titles for {}", diverted.len(), catalog);
        Ok(())
    }
}

/// Requests for the entries that resolve to an external id; the rest are counted
fn add_requests<R: CatalogRecord>(entries: &[(&TitleKey, &R)], unresolved: &mut usize) -> Vec<AddRequest> {
    entries
        .iter()
        .filter_map(|(key, record)| match record.external_id() {
            Some(external_id) => Some(AddRequest {
                key: (*key).clone(),
                external_id,
            }),
            None => {
                *unresolved += 1;
                None
            }
        })
        .collect()
}

use crate::batch::{chunk, Pacing};
use crate::dedup::{Admission, DedupGuard};
use crate::error::SyncError;
use crate::reconcile::{plan_reorder, RemoveOp, ReorderStep, SyncPlan};
use crate::report::{FailedItem, Operation, SyncReport};
use crate::store::RemoteCacheSink;
use catalog_sync_models::{CanonicalOrder, CatalogId, DuplicateRegister, RemoteEntry, RemoteIdCache, TitleKey};
use catalog_sync_sources::{AddRequest, ProgressTracker, RemoteListAdapter, ReorderMove, SourceError};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Per-run state machine. Phases only move forward; an empty plan goes
/// straight from `Diffing` to `Persisting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Diffing,
    Deleting,
    Adding,
    Reordering,
    Persisting,
}

/// Runs plans against one remote list.
///
/// Owns the working copy of the remote id cache: only confirmed operations
/// are folded into it, and it is handed to the checkpoint sink after every
/// confirmed batch so an aborted run resumes from what actually happened.
pub struct SyncExecutor<'a> {
    catalog: CatalogId,
    adapter: &'a mut dyn RemoteListAdapter,
    remote: RemoteIdCache,
    sink: Box<dyn RemoteCacheSink + 'a>,
    guard: DedupGuard,
    max_batch_size: usize,
    pacing: Pacing,
    phase: SyncPhase,
    report: SyncReport,
    started: Instant,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(
        catalog: CatalogId,
        adapter: &'a mut dyn RemoteListAdapter,
        remote: RemoteIdCache,
        sink: Box<dyn RemoteCacheSink + 'a>,
    ) -> Self {
        Self {
            catalog,
            adapter,
            remote,
            sink,
            guard: DedupGuard::new(),
            max_batch_size: 100,
            pacing: Pacing::none(),
            phase: SyncPhase::Idle,
            report: SyncReport::new(catalog),
            started: Instant::now(),
        }
    }

    pub fn with_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_guard(mut self, guard: DedupGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn remote(&self) -> &RemoteIdCache {
        &self.remote
    }

    /// Keys diverted by the dedup guard during this run
    pub fn duplicates(&self) -> &DuplicateRegister {
        self.guard.diverted()
    }

    /// Run a full plan: deletes, adds, then ordering, then the final save.
    ///
    /// Never fails: fatal errors end up in `SyncReport::fatal`, per-item
    /// failures in `SyncReport::failed`.
    #[instrument(skip(self, plan), fields(catalog = %self.catalog))]
    pub async fn execute_sync(&mut self, plan: &SyncPlan) -> SyncReport {
        info!(
            operation = "sync_start",
            catalog = %self.catalog,
            remove = plan.to_remove.len(),
            add = plan.to_add.len(),
            "Executing plan against {}",
            self.adapter.platform_name()
        );
        if let Err(e) = self.run_plan(plan).await {
            self.abort(e);
        }
        self.finish()
    }

    async fn run_plan(&mut self, plan: &SyncPlan) -> Result<(), SyncError> {
        self.enter(SyncPhase::Diffing);
        plan.validate(&self.remote)?;

        // keys staying on the list own their ids ahead of any local claim
        let leaving: HashSet<&TitleKey> = plan.to_remove.iter().map(|op| &op.key).collect();
        for (key, entry) in self.remote.iter() {
            if !leaving.contains(key) {
                self.guard.hold(key, &entry.external_id);
            }
        }

        self.report.unresolved = plan.unresolved.len();
        for key in &plan.unresolved {
            debug!("{} has no external id and stays off the list", key);
        }

        if !plan.is_empty() {
            self.enter(SyncPhase::Deleting);
            let blocked = self.delete_phase(&plan.to_remove).await?;

            self.enter(SyncPhase::Adding);
            let adds: Vec<AddRequest> = plan
                .to_add
                .iter()
                .filter(|item| !blocked.contains(&item.key))
                .cloned()
                .collect();
            if adds.len() < plan.to_add.len() {
                warn!(
                    "{} changed titles not re-added because their delete failed",
                    plan.to_add.len() - adds.len()
                );
            }
            self.add_phase(&adds).await?;

            self.enter(SyncPhase::Reordering);
            self.align_order(&plan.canonical).await?;
        }

        self.persist()
    }

    /// Catch up a list the remote id cache does not track: add the titles
    /// newer than the remote's first item and move them to the top in order,
    /// then append the titles past its last item.
    #[instrument(skip_all, fields(catalog = %self.catalog))]
    pub async fn execute_catch_up(&mut self, head: &[AddRequest], tail: &[AddRequest]) -> SyncReport {
        info!(
            operation = "catch_up_start",
            catalog = %self.catalog,
            head = head.len(),
            tail = tail.len(),
            "Catching up {} list",
            self.adapter.platform_name()
        );
        if let Err(e) = self.run_catch_up(head, tail).await {
            self.abort(e);
        }
        self.finish()
    }

    async fn run_catch_up(&mut self, head: &[AddRequest], tail: &[AddRequest]) -> Result<(), SyncError> {
        self.enter(SyncPhase::Adding);
        let items: Vec<AddRequest> = head.iter().chain(tail).cloned().collect();
        let confirmed: HashSet<TitleKey> = self.add_phase(&items).await?.into_iter().collect();

        if self.adapter.supports_reorder() {
            self.enter(SyncPhase::Reordering);
            let steps: Vec<ReorderStep> = head
                .iter()
                .filter(|item| confirmed.contains(&item.key))
                .enumerate()
                .map(|(index, item)| ReorderStep {
                    key: item.key.clone(),
                    position: index + 1,
                })
                .collect();
            self.reorder_phase(&steps).await?;
        }

        self.persist()
    }

    /// Delete in chunks. Only ids the remote confirmed leave the cache; the
    /// rest are recorded as failures, keep owning their external id and, for
    /// changed keys, are returned so they are not re-added on top of the old item.
    pub async fn delete_phase(&mut self, ops: &[RemoveOp]) -> Result<HashSet<TitleKey>, SyncError> {
        let mut blocked = HashSet::new();

        for (index, batch) in chunk(ops, self.max_batch_size).enumerate() {
            if index > 0 {
                self.pacing.pause_between_batches().await;
            }
            let ids: Vec<String> = batch.iter().map(|op| op.remote_item_id.clone()).collect();
            let outcome = self.adapter.delete_batch(&ids).await;
            let confirmed: HashSet<&str> = outcome.confirmed.iter().map(String::as_str).collect();
            let refused: HashSet<&str> = outcome.refused.iter().map(String::as_str).collect();
            let mut deleted = 0;

            for op in batch {
                if confirmed.contains(op.remote_item_id.as_str()) {
                    self.remote.remove(&op.key);
                    deleted += 1;
                    continue;
                }

                let refusal;
                let e = match &outcome.error {
                    Some(e) if !refused.contains(op.remote_item_id.as_str()) => e,
                    _ => {
                        refusal = SourceError::rejected(format!(
                            "{} kept by {}",
                            op.remote_item_id,
                            self.adapter.platform_name()
                        ));
                        &refusal
                    }
                };
                self.record_failure(&op.key, Operation::Delete, e);
                if let Some(entry) = self.remote.get(&op.key) {
                    self.guard.hold(&op.key, &entry.external_id);
                }
                if op.changed {
                    blocked.insert(op.key.clone());
                }
            }

            self.report.removed += deleted;
            if deleted > 0 {
                info!(
                    operation = "delete_batch",
                    catalog = %self.catalog,
                    batch = index + 1,
                    count = deleted,
                    "Deleted {} items",
                    deleted
                );
                self.checkpoint()?;
            }
            if deleted < batch.len() {
                warn!(
                    "Delete batch {}: {} of {} items not confirmed",
                    index + 1,
                    batch.len() - deleted,
                    batch.len()
                );
            }
            if let Some(e) = outcome.error {
                if e.is_fatal() {
                    return Err(e.into());
                }
            }
        }
        Ok(blocked)
    }

    /// Add in chunks after the dedup check. Returns the confirmed keys in the
    /// order the remote accepted them.
    pub async fn add_phase(&mut self, items: &[AddRequest]) -> Result<Vec<TitleKey>, SyncError> {
        let mut admitted = Vec::with_capacity(items.len());
        for item in items {
            match self.guard.admit(&item.key, &item.external_id) {
                Admission::Admitted => admitted.push(item.clone()),
                Admission::Duplicate(_) => self.report.duplicates += 1,
            }
        }

        let mut confirmed_keys = Vec::new();
        let mut progress = ProgressTracker::new(format!("{} add", self.catalog), admitted.len(), self.max_batch_size);
        let mut attempted = 0;

        for (index, batch) in chunk(&admitted, self.max_batch_size).enumerate() {
            if index > 0 {
                self.pacing.pause_between_batches().await;
            }
            let outcome = self.adapter.add_batch(batch).await;
            let external_ids: HashMap<&TitleKey, &str> =
                batch.iter().map(|item| (&item.key, item.external_id.as_str())).collect();
            let mut settled = HashSet::new();

            for (key, remote_item_id) in outcome.confirmed {
                let Some(external_id) = external_ids.get(&key) else {
                    warn!("{} confirmed {} which was not in the batch", self.adapter.platform_name(), key);
                    continue;
                };
                self.remote
                    .insert(key.clone(), RemoteEntry::new(remote_item_id, *external_id));
                self.report.added += 1;
                progress.record_done();
                settled.insert(key.clone());
                confirmed_keys.push(key);
            }

            for key in outcome.refused {
                let refusal = SourceError::rejected(format!("{} refused by {}", key, self.adapter.platform_name()));
                self.record_failure(&key, Operation::Add, &refusal);
                progress.record_failed(refusal.category());
                settled.insert(key);
            }

            let mut fatal = None;
            if let Some(e) = outcome.error {
                let unsettled: Vec<&AddRequest> = batch.iter().filter(|item| !settled.contains(&item.key)).collect();
                for item in &unsettled {
                    self.record_failure(&item.key, Operation::Add, &e);
                    progress.record_failed(e.category());
                }
                warn!(
                    "Add batch {} stopped after {} of {} items: {}",
                    index + 1,
                    batch.len() - unsettled.len(),
                    batch.len(),
                    e
                );
                if e.is_fatal() {
                    fatal = Some(e);
                }
            }

            // whatever was confirmed is on the remote list now, fatal or not
            self.checkpoint()?;
            attempted += batch.len();
            progress.log_progress(attempted);

            if let Some(e) = fatal {
                progress.log_summary();
                return Err(e.into());
            }
        }

        progress.log_summary();
        Ok(confirmed_keys)
    }

    /// Issue moves one per call. The first failed move ends the sweep, the
    /// next run recomputes what is still out of place.
    pub async fn reorder_phase(&mut self, steps: &[ReorderStep]) -> Result<(), SyncError> {
        for (index, step) in steps.iter().enumerate() {
            let entry = self.remote.get(&step.key).cloned().ok_or_else(|| {
                SyncError::InvariantViolation(format!("reorder of {} which is not on the remote list", step.key))
            })?;
            if index > 0 {
                self.pacing.pause_between_batches().await;
            }

            let request = ReorderMove {
                remote_item_id: entry.remote_item_id.clone(),
                position: step.position,
            };
            match self.adapter.reorder(std::slice::from_ref(&request)).await {
                Ok(()) => {
                    self.remote
                        .insert_at(step.position.saturating_sub(1), step.key.clone(), entry);
                    self.report.reordered += 1;
                    debug!("Moved {} to position {}", step.key, step.position);
                }
                Err(e) => {
                    self.record_failure(&step.key, Operation::Reorder, &e);
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    warn!(
                        "Moving {} failed, skipping the remaining {} moves: {}",
                        step.key,
                        steps.len() - index - 1,
                        e
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Bring the remote list into canonical order. Lists without positional
    /// ordering only get their cached order sorted.
    async fn align_order(&mut self, canonical: &[TitleKey]) -> Result<(), SyncError> {
        if !self.adapter.supports_reorder() {
            self.remote.sort_by_order(&CanonicalOrder::new(canonical));
            debug!("{} has no positional order, sorted the cache instead", self.adapter.platform_name());
            return Ok(());
        }

        let current: Vec<TitleKey> = self.remote.keys().cloned().collect();
        let steps = plan_reorder(canonical, &current);
        if !steps.is_empty() {
            info!(operation = "reorder", catalog = %self.catalog, moves = steps.len(), "Reordering remote list");
        }
        self.reorder_phase(&steps).await
    }

    pub fn persist(&mut self) -> Result<(), SyncError> {
        self.enter(SyncPhase::Persisting);
        self.checkpoint()?;
        debug!("Persisted {} remote entries for {}", self.remote.len(), self.catalog);
        Ok(())
    }

    /// Record a fatal error. Nothing else is sent after this.
    pub fn abort(&mut self, e: SyncError) {
        error!(
            operation = "sync_aborted",
            catalog = %self.catalog,
            category = e.category(),
            phase = ?self.phase,
            "{} sync aborted: {}",
            self.catalog,
            e
        );
        self.report.fatal = Some(e.to_string());
    }

    pub fn finish(&mut self) -> SyncReport {
        self.phase = SyncPhase::Idle;
        self.report.duration = self.started.elapsed();
        info!(
            operation = "sync_complete",
            catalog = %self.catalog,
            added = self.report.added,
            removed = self.report.removed,
            reordered = self.report.reordered,
            failed = self.report.failed.len(),
            duplicates = self.report.duplicates,
            "{}",
            self.report.summary_line()
        );
        self.report.clone()
    }

    fn enter(&mut self, phase: SyncPhase) {
        debug!(catalog = %self.catalog, "Phase {:?}", phase);
        self.phase = phase;
    }

    fn checkpoint(&mut self) -> Result<(), SyncError> {
        self.sink.checkpoint(&self.remote).map_err(SyncError::Store)
    }

    fn record_failure(&mut self, key: &TitleKey, operation: Operation, e: &SourceError) {
        self.report.failed.push(FailedItem {
            key: key.clone(),
            operation,
            category: e.category(),
            message: e.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::store::Untracked;
    use crate::testing::{MemoryList, RecordingSink};
    use catalog_sync_models::{LookupRecord, OrderedCache};

    fn local(entries: &[(&str, &str)]) -> OrderedCache<LookupRecord> {
        entries
            .iter()
            .map(|(key, id)| (TitleKey::from(*key), LookupRecord::with_id(*id)))
            .collect()
    }

    fn order(remote: &RemoteIdCache) -> Vec<&str> {
        remote.keys().map(|k| k.as_str()).collect()
    }

    #[tokio::test]
    async fn test_new_title_is_added_and_cached() {
        let local = local(&[("Movie|2020", "tt1"), ("Movie2|2021", "tt2")]);
        let mut list = MemoryList::with_items(&[("li1", "tt1")]);
        let mut remote = RemoteIdCache::new();
        remote.insert(TitleKey::from("Movie|2020"), RemoteEntry::new("li1", "tt1"));

        let plan = reconcile(&local, &remote);
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(Untracked));
        let report = executor.execute_sync(&plan).await;

        assert!(report.is_success());
        assert_eq!(report.added, 1);
        assert_eq!(
            executor.remote().get(&TitleKey::from("Movie2|2021")),
            Some(&RemoteEntry::new("li2", "tt2"))
        );
        assert_eq!(executor.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_removed_title_is_deleted_by_item_id() {
        let local = local(&[("B|2020", "tt2")]);
        let mut list = MemoryList::with_items(&[("li1", "tt1"), ("li2", "tt2")]);
        let remote: RemoteIdCache = [
            (TitleKey::from("A|2019"), RemoteEntry::new("li1", "tt1")),
            (TitleKey::from("B|2020"), RemoteEntry::new("li2", "tt2")),
        ]
        .into_iter()
        .collect();

        let plan = reconcile(&local, &remote);
        let report = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(Untracked))
            .execute_sync(&plan)
            .await;

        assert_eq!(report.removed, 1);
        assert_eq!(list.delete_calls, vec![vec!["li1".to_string()]]);
        assert_eq!(list.external_ids(), vec!["tt2"]);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let local = local(&[("A|", "tt1"), ("B|", "tt2"), ("C|", "tt3"), ("D|", "tt4"), ("E|", "tt5"), ("F|", "tt6")]);
        let mut list = MemoryList::new();
        list.fail_add_calls.insert(2);
        let sink = RecordingSink::default();
        let checkpoints = sink.snapshots.clone();

        let plan = reconcile(&local, &RemoteIdCache::new());
        let mut executor =
            SyncExecutor::new(CatalogId::Imdb, &mut list, RemoteIdCache::new(), Box::new(sink)).with_batch_size(2);
        let report = executor.execute_sync(&plan).await;

        assert_eq!(report.added, 4);
        assert!(report.fatal.is_none());
        let failed: Vec<&str> = report.failed.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(failed, vec!["C|", "D|"]);
        assert!(report.failed.iter().all(|f| f.category == "transient" && f.operation == Operation::Add));
        assert_eq!(order(executor.remote()), vec!["A|", "B|", "E|", "F|"]);

        // one checkpoint per batch plus the final save
        let snapshots = checkpoints.lock().unwrap();
        assert_eq!(snapshots.len(), 4);
        assert_eq!(snapshots[0].len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_run_after_checkpoint() {
        let local = local(&[("A|", "tt1"), ("B|", "tt2"), ("C|", "tt3"), ("D|", "tt4")]);
        let mut list = MemoryList::new();
        list.lose_session_on_add_call = Some(2);
        let sink = RecordingSink::default();
        let checkpoints = sink.snapshots.clone();

        let plan = reconcile(&local, &RemoteIdCache::new());
        let mut executor =
            SyncExecutor::new(CatalogId::Imdb, &mut list, RemoteIdCache::new(), Box::new(sink)).with_batch_size(2);
        let report = executor.execute_sync(&plan).await;

        assert!(report.fatal.is_some());
        assert_eq!(report.added, 2);
        assert_eq!(report.failed.len(), 2);
        let snapshots = checkpoints.lock().unwrap();
        let last = snapshots.last().unwrap();
        assert_eq!(order(last), vec!["A|", "B|"]);
        drop(snapshots);
        drop(executor);
        assert_eq!(list.add_calls, 2);
    }

    #[tokio::test]
    async fn test_partial_batch_keeps_confirmed_items() {
        let local = local(&[("A|", "tt1"), ("B|", "tt2"), ("C|", "tt3")]);
        let mut list = MemoryList::new();
        list.refuse.insert("tt2".to_string());

        let plan = reconcile(&local, &RemoteIdCache::new());
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, RemoteIdCache::new(), Box::new(Untracked));
        let report = executor.execute_sync(&plan).await;

        assert_eq!(report.added, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].category, "rejected");
        assert_eq!(order(executor.remote()), vec!["A|", "C|"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_diverted_not_added() {
        let local = local(&[("Original|2001", "tt5"), ("Dubbed|2001", "tt5"), ("Other|2002", "tt6")]);
        let mut list = MemoryList::new();

        let plan = reconcile(&local, &RemoteIdCache::new());
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, RemoteIdCache::new(), Box::new(Untracked))
            .with_guard(DedupGuard::from_cache(&local));
        let report = executor.execute_sync(&plan).await;

        assert_eq!(report.added, 2);
        assert_eq!(report.duplicates, 1);
        assert!(report.is_success());
        let entry = executor.duplicates().get(&TitleKey::from("Dubbed|2001")).unwrap();
        assert_eq!(entry.owner, TitleKey::from("Original|2001"));
        drop(executor);
        assert_eq!(list.external_ids(), vec!["tt5", "tt6"]);
    }

    #[tokio::test]
    async fn test_changed_title_is_deleted_before_it_is_added() {
        let local = local(&[("A|2019", "tt9"), ("B|2020", "tt2")]);
        let mut list = MemoryList::with_items(&[("li1", "tt1"), ("li2", "tt2")]);
        let remote: RemoteIdCache = [
            (TitleKey::from("A|2019"), RemoteEntry::new("li1", "tt1")),
            (TitleKey::from("B|2020"), RemoteEntry::new("li2", "tt2")),
        ]
        .into_iter()
        .collect();

        let plan = reconcile(&local, &remote);
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(Untracked));
        let report = executor.execute_sync(&plan).await;

        assert!(report.is_success());
        assert_eq!((report.removed, report.added, report.reordered), (1, 1, 1));
        assert_eq!(order(executor.remote()), vec!["A|2019", "B|2020"]);
        drop(executor);
        assert_eq!(list.calls, vec!["delete", "add", "reorder"]);
        assert_eq!(list.external_ids(), vec!["tt9", "tt2"]);
    }

    #[tokio::test]
    async fn test_failed_delete_blocks_changed_readd() {
        let local = local(&[("A|2019", "tt9")]);
        let mut list = MemoryList::with_items(&[("li1", "tt1")]);
        list.fail_delete = true;
        let remote: RemoteIdCache = [(TitleKey::from("A|2019"), RemoteEntry::new("li1", "tt1"))]
            .into_iter()
            .collect();

        let plan = reconcile(&local, &remote);
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(Untracked));
        let report = executor.execute_sync(&plan).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].operation, Operation::Delete);
        assert_eq!(report.added, 0);
        assert_eq!(executor.remote().get(&TitleKey::from("A|2019")), Some(&RemoteEntry::new("li1", "tt1")));
    }

    #[tokio::test]
    async fn test_partial_delete_forgets_only_confirmed_items() {
        let local = local(&[("Changed|2001", "tt22"), ("Kept|2002", "tt3"), ("Renamed|2003", "tt1")]);
        let mut list = MemoryList::with_items(&[("li1", "tt1"), ("li2", "tt2"), ("li3", "tt3")]);
        list.keep.insert("li2".to_string());
        let remote: RemoteIdCache = [
            (TitleKey::from("Gone|2000"), RemoteEntry::new("li1", "tt1")),
            (TitleKey::from("Changed|2001"), RemoteEntry::new("li2", "tt2")),
            (TitleKey::from("Kept|2002"), RemoteEntry::new("li3", "tt3")),
        ]
        .into_iter()
        .collect();

        let plan = reconcile(&local, &remote);
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(Untracked))
            .with_guard(DedupGuard::from_cache(&local));
        let report = executor.execute_sync(&plan).await;

        assert_eq!((report.removed, report.added), (1, 1));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, TitleKey::from("Changed|2001"));
        assert_eq!(report.failed[0].operation, Operation::Delete);
        assert_eq!(report.failed[0].category, "rejected");
        assert!(executor.remote().get(&TitleKey::from("Gone|2000")).is_none());
        assert_eq!(
            executor.remote().get(&TitleKey::from("Changed|2001")),
            Some(&RemoteEntry::new("li2", "tt2"))
        );
        drop(executor);
        assert_eq!(list.external_ids(), vec!["tt2", "tt3", "tt1"]);
    }

    #[tokio::test]
    async fn test_undeleted_item_keeps_its_id() {
        let local = local(&[("Renamed|2003", "tt1")]);
        let mut list = MemoryList::with_items(&[("li1", "tt1")]);
        list.keep.insert("li1".to_string());
        let remote: RemoteIdCache = [(TitleKey::from("Gone|2000"), RemoteEntry::new("li1", "tt1"))]
            .into_iter()
            .collect();

        let plan = reconcile(&local, &remote);
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(Untracked))
            .with_guard(DedupGuard::from_cache(&local));
        let report = executor.execute_sync(&plan).await;

        assert_eq!((report.removed, report.added, report.duplicates), (0, 0, 1));
        assert_eq!(
            executor.duplicates().get(&TitleKey::from("Renamed|2003")).unwrap().owner,
            TitleKey::from("Gone|2000")
        );
        drop(executor);
        assert_eq!(list.add_calls, 0);
    }

    #[tokio::test]
    async fn test_reorder_failure_stops_remaining_moves() {
        let mut list = MemoryList::with_items(&[("li1", "tt1"), ("li2", "tt2"), ("li3", "tt3")]);
        list.fail_reorder_call = Some(1);
        let remote: RemoteIdCache = [
            (TitleKey::from("A|"), RemoteEntry::new("li1", "tt1")),
            (TitleKey::from("B|"), RemoteEntry::new("li2", "tt2")),
            (TitleKey::from("C|"), RemoteEntry::new("li3", "tt3")),
        ]
        .into_iter()
        .collect();

        let steps = vec![
            ReorderStep {
                key: TitleKey::from("C|"),
                position: 1,
            },
            ReorderStep {
                key: TitleKey::from("B|"),
                position: 2,
            },
        ];
        let mut executor = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(Untracked));
        executor.reorder_phase(&steps).await.unwrap();
        let report = executor.finish();

        assert_eq!(report.reordered, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].operation, Operation::Reorder);
        drop(executor);
        assert_eq!(list.reorder_calls, 1);
    }

    #[tokio::test]
    async fn test_list_without_reorder_sorts_the_cache() {
        let local = local(&[("New|2024", "movie:9"), ("A|2019", "movie:1")]);
        let mut list = MemoryList::with_items(&[("movie:1", "movie:1")]);
        list.reorderable = false;
        let remote: RemoteIdCache = [(TitleKey::from("A|2019"), RemoteEntry::new("movie:1", "movie:1"))]
            .into_iter()
            .collect();

        let plan = reconcile(&local, &remote);
        let mut executor = SyncExecutor::new(CatalogId::Tmdb, &mut list, remote, Box::new(Untracked));
        let report = executor.execute_sync(&plan).await;

        assert!(report.is_success());
        assert_eq!(report.reordered, 0);
        assert_eq!(order(executor.remote()), vec!["New|2024", "A|2019"]);
        drop(executor);
        assert_eq!(list.reorder_calls, 0);
    }

    #[tokio::test]
    async fn test_plan_for_other_cache_aborts_before_any_call() {
        let local = local(&[("B|2020", "tt2")]);
        let remote: RemoteIdCache = [(TitleKey::from("A|2019"), RemoteEntry::new("li1", "tt1"))]
            .into_iter()
            .collect();
        let plan = reconcile(&local, &remote);

        let mut list = MemoryList::new();
        let report = SyncExecutor::new(CatalogId::Imdb, &mut list, RemoteIdCache::new(), Box::new(Untracked))
            .execute_sync(&plan)
            .await;

        assert!(report.fatal.as_deref().unwrap_or_default().contains("invariant"));
        assert!(list.calls.is_empty());
    }

    #[tokio::test]
    async fn test_empty_plan_only_persists() {
        let local = local(&[("A|", "tt1")]);
        let remote: RemoteIdCache = [(TitleKey::from("A|"), RemoteEntry::new("li1", "tt1"))].into_iter().collect();
        let mut list = MemoryList::with_items(&[("li1", "tt1")]);
        let sink = RecordingSink::default();
        let checkpoints = sink.snapshots.clone();

        let plan = reconcile(&local, &remote);
        let report = SyncExecutor::new(CatalogId::Imdb, &mut list, remote, Box::new(sink))
            .execute_sync(&plan)
            .await;

        assert!(report.is_success());
        assert!(list.calls.is_empty());
        assert_eq!(checkpoints.lock().unwrap().len(), 1);
    }
}

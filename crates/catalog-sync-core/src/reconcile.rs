//! Pure diff of the local catalog view against the remote id cache.
//!
//! Nothing here touches the network or the filesystem: the plan is computed
//! from the two caches alone and handed to the executor.

use crate::error::SyncError;
use catalog_sync_models::{CatalogRecord, OrderedCache, RemoteIdCache, TitleKey};
use catalog_sync_sources::AddRequest;
use std::collections::HashSet;
use tracing::debug;

/// A remote item to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOp {
    pub key: TitleKey,
    pub remote_item_id: String,
    /// The key stays local under a different external id and is re-added
    pub changed: bool,
}

/// Move `key` to the 1-based `position`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderStep {
    pub key: TitleKey,
    pub position: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Removed keys in remote order, then changed keys
    pub to_remove: Vec<RemoveOp>,
    /// Changed and missing keys in local order
    pub to_add: Vec<AddRequest>,
    /// Moves expected if every delete and add succeeds
    pub to_reorder: Vec<ReorderStep>,
    /// Local keys with no external id; they cannot be added
    pub unresolved: Vec<TitleKey>,
    /// Every local key, in local order
    pub canonical: Vec<TitleKey>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty() && self.to_reorder.is_empty()
    }

    pub fn changed_keys(&self) -> impl Iterator<Item = &TitleKey> {
        self.to_remove.iter().filter(|op| op.changed).map(|op| &op.key)
    }

    /// Check the plan against the remote cache it is about to run on. Every
    /// delete must name a cached remote item and every add a local key.
    pub fn validate(&self, remote: &RemoteIdCache) -> Result<(), SyncError> {
        if let Some(op) = self.to_remove.iter().find(|op| !remote.contains_key(&op.key)) {
            return Err(SyncError::InvariantViolation(format!(
                "delete of {} which is not in the remote id cache",
                op.key
            )));
        }

        let local: HashSet<&TitleKey> = self.canonical.iter().collect();
        if let Some(item) = self.to_add.iter().find(|item| !local.contains(&item.key)) {
            return Err(SyncError::InvariantViolation(format!(
                "add of {} which is not in the local catalog",
                item.key
            )));
        }
        if let Some(step) = self.to_reorder.iter().find(|step| !local.contains(&step.key)) {
            return Err(SyncError::InvariantViolation(format!(
                "reorder of {} which is not in the local catalog",
                step.key
            )));
        }
        Ok(())
    }
}

/// Diff `local` (already in canonical order) against `remote`.
///
/// Keys only on the remote side are removed; keys whose external id differs
/// are removed and re-added; keys only on the local side are added. A local
/// record without an external id never reaches the remote list.
pub fn reconcile<R: CatalogRecord>(local: &OrderedCache<R>, remote: &RemoteIdCache) -> SyncPlan {
    let mut plan = SyncPlan {
        canonical: local.keys().cloned().collect(),
        ..SyncPlan::default()
    };

    for (key, entry) in remote.iter() {
        if !local.contains_key(key) {
            plan.to_remove.push(RemoveOp {
                key: key.clone(),
                remote_item_id: entry.remote_item_id.clone(),
                changed: false,
            });
        }
    }

    let mut changed = HashSet::new();
    for (key, record) in local.iter() {
        if let Some(entry) = remote.get(key) {
            if record.external_id().as_deref() != Some(entry.external_id.as_str()) {
                plan.to_remove.push(RemoveOp {
                    key: key.clone(),
                    remote_item_id: entry.remote_item_id.clone(),
                    changed: true,
                });
                changed.insert(key);
            }
        }
    }

    for (key, record) in local.iter() {
        if remote.contains_key(key) && !changed.contains(key) {
            continue;
        }
        match record.external_id() {
            Some(external_id) => plan.to_add.push(AddRequest {
                key: key.clone(),
                external_id,
            }),
            None => plan.unresolved.push(key.clone()),
        }
    }

    let removed: HashSet<&TitleKey> = plan.to_remove.iter().map(|op| &op.key).collect();
    let mut projected: Vec<TitleKey> = remote.keys().filter(|k| !removed.contains(k)).cloned().collect();
    projected.extend(plan.to_add.iter().map(|item| item.key.clone()));
    plan.to_reorder = plan_reorder(&plan.canonical, &projected);

    debug!(
        remove = plan.to_remove.len(),
        add = plan.to_add.len(),
        reorder = plan.to_reorder.len(),
        unresolved = plan.unresolved.len(),
        "Reconciled {} local keys against {} remote entries",
        local.len(),
        remote.len()
    );
    plan
}

/// Moves that bring `current` into `canonical` order.
///
/// Walks the canonical keys present in `current`; whenever the list holds a
/// different key at that position, the canonical key is moved there. Keys of
/// `current` unknown to `canonical` drift to the end. Matching order yields no
/// moves.
pub fn plan_reorder(canonical: &[TitleKey], current: &[TitleKey]) -> Vec<ReorderStep> {
    let present: HashSet<&TitleKey> = current.iter().collect();
    let mut simulated = current.to_vec();
    let mut steps = Vec::new();

    for (index, key) in canonical.iter().filter(|k| present.contains(k)).enumerate() {
        if simulated.get(index) == Some(key) {
            continue;
        }
        if let Some(from) = simulated.iter().position(|k| k == key) {
            let moved = simulated.remove(from);
            simulated.insert(index, moved);
            steps.push(ReorderStep {
                key: key.clone(),
                position: index + 1,
            });
        }
    }
    steps
}

#[cfg(test)]
mod tests;

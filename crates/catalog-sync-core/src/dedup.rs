use catalog_sync_models::{CatalogRecord, DuplicateEntry, DuplicateRegister, OrderedCache, TitleKey};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The id already belongs to this other key
    Duplicate(TitleKey),
}

/// External id → owning key, consulted before anything is added.
///
/// The first key to claim an id owns it; a later key with the same id is
/// diverted into the duplicate register instead of being added.
#[derive(Debug, Default)]
pub struct DedupGuard {
    owners: HashMap<String, TitleKey>,
    diverted: DuplicateRegister,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed ownership from a cache in its iteration order
    pub fn from_cache<R: CatalogRecord>(cache: &OrderedCache<R>) -> Self {
        let mut guard = Self::new();
        guard.claim_all(cache);
        guard
    }

    /// Claim every external id of `cache` that is not owned yet. Ids already
    /// owned by another key are left alone; seeding never diverts.
    pub fn claim_all<R: CatalogRecord>(&mut self, cache: &OrderedCache<R>) {
        for (key, record) in cache.iter() {
            if let Some(id) = record.external_id() {
                self.owners.entry(id).or_insert_with(|| key.clone());
            }
        }
    }

    /// `key` holds `external_id` on the remote list and owns it whoever claimed it first
    pub fn hold(&mut self, key: &TitleKey, external_id: &str) {
        self.owners.insert(external_id.to_string(), key.clone());
    }

    pub fn owner(&self, external_id: &str) -> Option<&TitleKey> {
        self.owners.get(external_id)
    }

    /// Check `key` against the id's owner. A new id is claimed by `key`; an id
    /// owned by a different key is recorded as a duplicate of that owner.
    pub fn admit(&mut self, key: &TitleKey, external_id: &str) -> Admission {
        match self.owners.get(external_id) {
            Some(owner) if owner != key => {
                let owner = owner.clone();
                warn!(
                    operation = "duplicate_diverted",
                    key = %key,
                    owner = %owner,
                    external_id,
                    "{} resolves to {} which already belongs to {}",
                    key,
                    external_id,
                    owner
                );
                self.diverted
                    .insert(key.clone(), DuplicateEntry::new(external_id, owner.clone()));
                Admission::Duplicate(owner)
            }
            Some(_) => Admission::Admitted,
            None => {
                self.owners.insert(external_id.to_string(), key.clone());
                Admission::Admitted
            }
        }
    }

    pub fn diverted(&self) -> &DuplicateRegister {
        &self.diverted
    }

    pub fn duplicate_count(&self) -> usize {
        self.diverted.len()
    }

    pub fn into_diverted(self) -> DuplicateRegister {
        self.diverted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_sync_models::LookupRecord;

    #[test]
    fn test_first_claim_wins() {
        let mut cache = OrderedCache::new();
        cache.insert(TitleKey::from("Movie|2020"), LookupRecord::new("Movie", "2020", "tt1"));
        cache.insert(TitleKey::from("Movie Again|2020"), LookupRecord::new("Movie", "2020", "tt1"));

        let guard = DedupGuard::from_cache(&cache);
        assert_eq!(guard.owner("tt1"), Some(&TitleKey::from("Movie|2020")));
        assert_eq!(guard.duplicate_count(), 0);
    }

    #[test]
    fn test_admit_diverts_id_owned_by_other_key() {
        let mut guard = DedupGuard::new();
        let owner = TitleKey::from("Original|2001");
        let other = TitleKey::from("Dub Title|2001");

        assert_eq!(guard.admit(&owner, "tt5"), Admission::Admitted);
        assert_eq!(guard.admit(&owner, "tt5"), Admission::Admitted);
        assert_eq!(guard.admit(&other, "tt5"), Admission::Duplicate(owner.clone()));

        let entry = guard.diverted().get(&other).unwrap();
        assert_eq!(entry.external_id, "tt5");
        assert_eq!(entry.owner, owner);
    }

    #[test]
    fn test_held_id_beats_earlier_claim() {
        let mut cache = OrderedCache::new();
        cache.insert(TitleKey::from("Dub|2021"), LookupRecord::with_id("tt1"));
        cache.insert(TitleKey::from("Orig|2020"), LookupRecord::with_id("tt1"));
        let mut guard = DedupGuard::from_cache(&cache);

        let holder = TitleKey::from("Orig|2020");
        guard.hold(&holder, "tt1");
        assert_eq!(guard.admit(&TitleKey::from("Dub|2021"), "tt1"), Admission::Duplicate(holder.clone()));
        assert_eq!(guard.admit(&holder, "tt1"), Admission::Admitted);
    }

    #[test]
    fn test_records_without_id_are_not_indexed() {
        let mut cache = OrderedCache::new();
        cache.insert(TitleKey::from("Lost|"), LookupRecord::default());
        let mut guard = DedupGuard::from_cache(&cache);
        assert_eq!(guard.admit(&TitleKey::from("Found|"), "tt2"), Admission::Admitted);
    }
}

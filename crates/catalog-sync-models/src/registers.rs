use crate::{CanonicalOrder, OrderedCache, TitleKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A record diverted because its external id is already owned by another key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub external_id: String,
    /// Key that already holds the external id
    pub owner: TitleKey,
    pub detected_at: DateTime<Utc>,
}

impl DuplicateEntry {
    pub fn new(external_id: impl Into<String>, owner: TitleKey) -> Self {
        Self {
            external_id: external_id.into(),
            owner,
            detected_at: Utc::now(),
        }
    }
}

/// Side register of diverted duplicates, keyed by the key that lost
pub type DuplicateRegister = OrderedCache<DuplicateEntry>;

/// Titles permanently excluded from lookups until removed by hand.
///
/// Stored as a JSON array of keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnavailableRegister {
    keys: Vec<TitleKey>,
}

impl UnavailableRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &TitleKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns false when the key was already registered
    pub fn insert(&mut self, key: TitleKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn remove(&mut self, key: &TitleKey) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        before != self.keys.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TitleKey> {
        self.keys.iter()
    }

    pub fn as_set(&self) -> HashSet<&TitleKey> {
        self.keys.iter().collect()
    }

    pub fn sort_by_order(&mut self, order: &CanonicalOrder) {
        order.sort_keys(&mut self.keys);
    }
}

impl FromIterator<TitleKey> for UnavailableRegister {
    fn from_iter<T: IntoIterator<Item = TitleKey>>(iter: T) -> Self {
        let mut register = UnavailableRegister::new();
        for key in iter {
            register.insert(key);
        }
        register
    }
}

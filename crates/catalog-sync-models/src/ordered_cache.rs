use crate::{CanonicalOrder, TitleKey};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Key→value mapping with an explicit iteration order.
///
/// Lookups go through the hash index; iteration, serialization and
/// [`OrderedCache::position`] follow the key sequence. Catalog files are
/// JSON objects whose key order is meaningful, so the order survives a
/// load/save cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedCache<V> {
    keys: Vec<TitleKey>,
    entries: HashMap<TitleKey, V>,
}

impl<V> Default for OrderedCache<V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<V> OrderedCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains_key(&self, key: &TitleKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &TitleKey) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &TitleKey) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Insert or replace. A replaced key keeps its position, a new key is appended.
    pub fn insert(&mut self, key: TitleKey, value: V) -> Option<V> {
        let previous = self.entries.insert(key.clone(), value);
        if previous.is_none() {
            self.keys.push(key);
        }
        previous
    }

    /// Insert a new key at `index` (clamped), or move an existing key there.
    pub fn insert_at(&mut self, index: usize, key: TitleKey, value: V) {
        if self.entries.insert(key.clone(), value).is_some() {
            self.keys.retain(|k| k != &key);
        }
        let index = index.min(self.keys.len());
        self.keys.insert(index, key);
    }

    pub fn remove(&mut self, key: &TitleKey) -> Option<V> {
        let removed = self.entries.remove(key)?;
        self.keys.retain(|k| k != key);
        Some(removed)
    }

    /// Zero-based position in iteration order
    pub fn position(&self, key: &TitleKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &TitleKey> {
        self.keys.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.keys.iter().filter_map(|k| self.entries.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TitleKey, &V)> {
        self.keys.iter().filter_map(|k| self.entries.get(k).map(|v| (k, v)))
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&TitleKey, &V) -> bool,
    {
        let entries = &mut self.entries;
        self.keys.retain(|key| {
            let keep_key = entries.get(key).map(|value| keep(key, value)).unwrap_or(false);
            if !keep_key {
                entries.remove(key);
            }
            keep_key
        });
    }

    /// Stable re-sort by the canonical comparator
    pub fn sort_by_order(&mut self, order: &CanonicalOrder) {
        order.sort_keys(&mut self.keys);
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&TitleKey, &TitleKey) -> std::cmp::Ordering,
    {
        self.keys.sort_by(compare);
    }
}

impl<V: Clone> OrderedCache<V> {
    /// Right-biased shallow merge: overrides win, base keys keep their
    /// position and new override keys append in override order.
    pub fn merge(&self, overrides: &OrderedCache<V>) -> OrderedCache<V> {
        let mut merged = self.clone();
        for (key, value) in overrides.iter() {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Copy restricted to (and ordered by) the given keys
    pub fn select<'a, I>(&self, keys: I) -> OrderedCache<V>
    where
        I: IntoIterator<Item = &'a TitleKey>,
    {
        let mut selected = OrderedCache::new();
        for key in keys {
            if let Some(value) = self.entries.get(key) {
                selected.insert(key.clone(), value.clone());
            }
        }
        selected
    }
}

impl<V> FromIterator<(TitleKey, V)> for OrderedCache<V> {
    fn from_iter<T: IntoIterator<Item = (TitleKey, V)>>(iter: T) -> Self {
        let mut cache = OrderedCache::new();
        for (key, value) in iter {
            cache.insert(key, value);
        }
        cache
    }
}

impl<V: Serialize> Serialize for OrderedCache<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct OrderedCacheVisitor<V> {
    marker: PhantomData<V>,
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedCacheVisitor<V> {
    type Value = OrderedCache<V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of title keys")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let mut cache = OrderedCache::new();
        while let Some((key, value)) = access.next_entry::<TitleKey, V>()? {
            cache.insert(key, value);
        }
        Ok(cache)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedCache<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedCacheVisitor { marker: PhantomData })
    }
}

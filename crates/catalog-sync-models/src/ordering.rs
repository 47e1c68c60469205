use crate::TitleKey;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Canonical title order taken from the source catalog's scrape order.
///
/// Keys unknown to the source catalog sort after every known key and compare
/// equal to each other, so a stable sort keeps their relative order.
#[derive(Debug, Clone, Default)]
pub struct CanonicalOrder {
    positions: HashMap<TitleKey, usize>,
}

impl CanonicalOrder {
    pub fn new<'a, I>(source: I) -> Self
    where
        I: IntoIterator<Item = &'a TitleKey>,
    {
        let mut positions = HashMap::new();
        for (index, key) in source.into_iter().enumerate() {
            positions.entry(key.clone()).or_insert(index);
        }
        Self { positions }
    }

    pub fn position(&self, key: &TitleKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn contains(&self, key: &TitleKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn compare(&self, a: &TitleKey, b: &TitleKey) -> Ordering {
        match (self.position(a), self.position(b)) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Stable sort of a key list
    pub fn sort_keys(&self, keys: &mut [TitleKey]) {
        keys.sort_by(|a, b| self.compare(a, b));
    }
}

//! Precinct-keyed partial totals with an associative combine.
//!
//! Input arrives in chunks of arbitrary size; each chunk is reduced to a
//! `KeyedAggregate` and the partials are merged. Merge is associative and
//! commutative, so the result does not depend on chunking.

use std::collections::BTreeMap;

/// Associative in-place combine.
pub trait Combine {
    fn combine(&mut self, other: Self);
}

impl Combine for u64 {
    fn combine(&mut self, other: Self) {
        *self = self.saturating_add(other);
    }
}

impl Combine for f64 {
    fn combine(&mut self, other: Self) {
        *self += other;
    }
}

/// Element-wise sum; the shorter vector is zero-extended.
impl Combine for Vec<f64> {
    fn combine(&mut self, other: Self) {
        if other.len() > self.len() {
            self.resize(other.len(), 0.0);
        }
        for (a, b) in self.iter_mut().zip(other) {
            *a += b;
        }
    }
}

/// Ordered map from precinct key to a combinable partial total.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedAggregate<V> {
    entries: BTreeMap<String, V>,
}

impl<V> Default for KeyedAggregate<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V: Combine> KeyedAggregate<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `key`, combining with any existing total.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        use std::collections::btree_map::Entry;
        match self.entries.entry(key.into()) {
            Entry::Occupied(mut slot) => slot.get_mut().combine(value),
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }

    /// Merge another partial aggregate into this one.
    pub fn merge(&mut self, other: Self) {
        for (key, value) in other.entries {
            self.add(key, value);
        }
    }

    /// Reduce a sequence of chunk aggregates.
    pub fn fold_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        chunks.into_iter().fold(Self::new(), |mut acc, chunk| {
            acc.merge(chunk);
            acc
        })
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> BTreeMap<String, V> {
        self.entries
    }
}

impl<V: Combine, K: Into<String>> FromIterator<(K, V)> for KeyedAggregate<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut agg = Self::new();
        for (k, v) in iter {
            agg.add(k, v);
        }
        agg
    }
}

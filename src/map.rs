use std::{
    borrow::Borrow,
    cmp::Ordering,
    collections::{HashMap, HashSet},
    hash::Hash,
    slice,
};

use tracing::{trace, warn};

use crate::{Pair, sort::merge_sort_by_less};

/// A map that remembers the order keys were first inserted in, and lets the
/// caller reorder them.
///
/// Lookups and inserts are O(1) through a `HashMap`. The key order lives in a
/// separate `Vec`, so [`SortMap::remove`] is O(n): it shifts the later keys
/// down rather than swapping the last key into the hole.
#[derive(Clone, Debug)]
pub struct SortMap<K, V> {
    order: Vec<K>,
    table: HashMap<K, V>,
    escape_html: bool,
}

impl<K, V> Default for SortMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SortMap<K, V> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            table: HashMap::new(),
            escape_html: true,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: Vec::with_capacity(capacity),
            table: HashMap::with_capacity(capacity),
            escape_html: true,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in their current order.
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.table.clear();
    }

    /// Whether `<`, `>`, `&`, U+2028 and U+2029 are escaped in encoded strings.
    pub fn escape_html(&self) -> bool {
        self.escape_html
    }

    /// Turns markup escaping on or off for later encodes. On by default.
    pub fn set_escape_html(&mut self, on: bool) {
        self.escape_html = on;
    }
}

impl<K: Eq + Hash + Clone, V> SortMap<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get_mut(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains_key(key)
    }

    /// Inserts at the back, or replaces the value in place if the key exists.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let old = self.table.insert(key.clone(), value);
        if old.is_none() {
            self.order.push(key);
        }
        old
    }

    /// Removes `key`, keeping the relative order of the remaining keys.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.table.remove(key)?;

        if let Some(position) = self.order.iter().position(|k| k.borrow() == key) {
            self.order.remove(position);
            trace!(position, remaining = self.order.len(), "removed key");
        }

        Some(value)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            keys: self.order.iter(),
            table: &self.table,
        }
    }

    /// Iterate values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.table.get(k))
    }

    fn pairs(&self) -> Vec<Pair<'_, K, V>> {
        self.iter().map(|(k, v)| Pair::new(k, v)).collect()
    }

    /// Hands the key order to `sort_fn` to rearrange in place.
    ///
    /// `sort_fn` must leave a permutation of the keys behind. If it writes a
    /// key the map doesn't hold or duplicates one, the previous order is kept.
    /// Checking this costs O(n) on top of the sort: the key order is cloned
    /// beforehand and the result is checked against a `HashSet`.
    pub fn sort_keys<F>(&mut self, sort_fn: F)
    where
        F: FnOnce(&mut [K]),
    {
        let previous = self.order.clone();
        sort_fn(self.order.as_mut_slice());

        if !self.order_is_permutation() {
            warn!(
                len = self.order.len(),
                "sort_keys produced keys that are not a permutation of the map's keys, keeping previous order"
            );
            self.order = previous;
        }
    }

    fn order_is_permutation(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.order.len());
        self.order
            .iter()
            .all(|k| self.table.contains_key(k) && seen.insert(k))
    }

    /// Reorders the keys by comparing entries with `less`, which returns
    /// `true` when `a` must come before `b`.
    ///
    /// The sort is stable. Values stay attached to their keys. A `less` that
    /// is not a strict weak ordering yields an unspecified order but never
    /// loses or duplicates a key.
    pub fn sort<F>(&mut self, mut less: F)
    where
        F: FnMut(&Pair<'_, K, V>, &Pair<'_, K, V>) -> bool,
    {
        let order: Vec<K> = merge_sort_by_less(self.pairs(), &mut less)
            .into_iter()
            .map(|pair| pair.key().clone())
            .collect();

        self.order = order;
        trace!(len = self.order.len(), "sorted map");
    }

    /// Like [`SortMap::sort`], with a three-way comparator.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Pair<'_, K, V>, &Pair<'_, K, V>) -> Ordering,
    {
        self.sort(|a, b| compare(a, b) == Ordering::Less);
    }
}

/// Entries of a [`SortMap`] in key order, from [`SortMap::iter`].
#[derive(Debug)]
pub struct Iter<'a, K, V> {
    keys: slice::Iter<'a, K>,
    table: &'a HashMap<K, V>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            table: self.table,
        }
    }
}

impl<'a, K: Eq + Hash, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let table = self.table;
        self.keys.find_map(|k| table.get(k).map(|v| (k, v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.keys.size_hint().1)
    }
}

impl<'a, K: Eq + Hash + Clone, V> IntoIterator for &'a SortMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Eq + Hash + Clone, V> FromIterator<(K, V)> for SortMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = SortMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Eq + Hash + Clone, V> Extend<(K, V)> for SortMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

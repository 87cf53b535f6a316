/// A borrowed entry of a [`SortMap`](crate::SortMap), handed to sort comparators.
#[derive(Debug)]
pub struct Pair<'a, K, V> {
    key: &'a K,
    value: &'a V,
}

impl<'a, K, V> Pair<'a, K, V> {
    pub(crate) fn new(key: &'a K, value: &'a V) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &'a K {
        self.key
    }

    pub fn value(&self) -> &'a V {
        self.value
    }
}

impl<K, V> Clone for Pair<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Pair<'_, K, V> {}

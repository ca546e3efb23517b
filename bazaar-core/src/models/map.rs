use std::hash::Hash;

/// An insertion-ordered hash map, defaulting to values of f64.
///
/// Every round of the market must be reproducible from its inputs: the same bids,
/// prices and balances have to yield the same allocation and the same trades, in
/// the same order. `std::collections::HashMap` iterates in a randomized order, so
/// we use `indexmap::IndexMap` with a fixed hasher instead and wrap it in a newtype
/// to keep that choice an implementation detail.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Map<K: Eq + Hash, V = f64>(indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>);

impl<K: Eq + Hash, V> Map<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Eq + Hash> Map<K, f64> {
    /// Look up a quantity, treating a missing key as zero
    pub fn value_or_zero<Q>(&self, key: &Q) -> f64
    where
        Q: ?Sized + Hash + indexmap::Equivalent<K>,
    {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    /// Add `amount` to the entry for `key`, inserting it if necessary
    pub fn accumulate(&mut self, key: K, amount: f64) {
        *self.0.entry(key).or_insert(0.0) += amount;
    }
}

impl<K: Eq + Hash, V> Default for Map<K, V> {
    fn default() -> Self {
        Self(indexmap::IndexMap::default())
    }
}

impl<K: Eq + Hash, V> std::ops::Deref for Map<K, V> {
    type Target = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Eq + Hash, V> std::ops::DerefMut for Map<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Eq + Hash, V> IntoIterator for Map<K, V> {
    type Item = (K, V);
    type IntoIter = indexmap::map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, K: Eq + Hash, V> IntoIterator for &'a Map<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = indexmap::map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for Map<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(indexmap::IndexMap::from_iter(iter))
    }
}

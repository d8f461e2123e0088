use std::hash::Hash;

use dashmap::DashMap;

/// In-memory set of interest keys a store keeps fresh
///
/// Each key shows up once in the fetch request no matter how many holders
/// registered it. Holders are counted so a key is pruned only when the last
/// holder lets go.
#[derive(Debug)]
pub struct RequestLedger<K: Eq + Hash> {
    holders: DashMap<K, usize>, // key -> number of holders
}

impl<K> RequestLedger<K>
where
    K: Eq + Hash + Ord + Clone,
{
    pub fn new() -> Self {
        Self {
            holders: DashMap::new(),
        }
    }

    /// Add a hold on `key`; returns true when the key was not present before
    pub fn register(&self, key: K) -> bool {
        let mut entry = self.holders.entry(key).or_insert(0);
        *entry += 1;
        *entry == 1
    }

    /// Release one hold on `key`; returns true when the key left the ledger
    pub fn unregister(&self, key: &K) -> bool {
        let removed = self.holders.remove_if_mut(key, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
        removed.is_some()
    }

    /// Drop `key` regardless of how many holders it has
    pub fn forget(&self, key: &K) -> bool {
        self.holders.remove(key).is_some()
    }

    /// Drop every key matching `pred`; returns how many were removed
    pub fn forget_where<F>(&self, mut pred: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let before = self.holders.len();
        self.holders.retain(|key, _| !pred(key));
        before - self.holders.len()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.holders.contains_key(key)
    }

    pub fn holders(&self, key: &K) -> usize {
        self.holders.get(key).map(|c| *c).unwrap_or(0)
    }

    /// Current keys, sorted so request bodies are stable
    pub fn keys(&self) -> Vec<K> {
        let mut keys: Vec<K> = self.holders.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    pub fn clear(&self) {
        self.holders.clear();
    }
}

impl<K> Default for RequestLedger<K>
where
    K: Eq + Hash + Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

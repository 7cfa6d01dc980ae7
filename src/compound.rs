//! Compound entries: `(item, count)` for bags and `(key, value)` for
//! dictionaries, stored in a [`HashEngine`] whose projection only looks at
//! the first component.
//!
//! `CountedTable` is the counting layer: it adds per-entry multiplicities on
//! top of the structural engine and unlinks an entry eagerly when its count
//! reaches zero, so a stored count is always at least one.

use crate::error::{ensure_invariant, CollectionError, InvariantViolation};
use crate::hash_engine::{DefaultBuildHasher, EngineConfig, HashEngine, Iter, Projection};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

/// Bag entry: a representative item and how many copies of it are held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counted<T> {
    pub item: T,
    pub count: usize,
}

impl<T> Counted<T> {
    pub fn new(item: T, count: usize) -> Self {
        Self { item, count }
    }
}

/// Projects a [`Counted`] entry onto its item.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByItem;

impl<T: Hash + Eq> Projection<Counted<T>> for ByItem {
    type Key = T;
    #[inline]
    fn key(entry: &Counted<T>) -> &T {
        &entry.item
    }
}

/// Dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Pair<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

/// Projects a [`Pair`] onto its key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByKey;

impl<K: Hash + Eq, V> Projection<Pair<K, V>> for ByKey {
    type Key = K;
    #[inline]
    fn key(entry: &Pair<K, V>) -> &K {
        &entry.key
    }
}

/// Result of taking copies away from a counted entry.
#[derive(Debug, PartialEq, Eq)]
pub enum Decrement<T> {
    /// No entry matched.
    Absent,
    /// Copies were removed and `remaining` are left.
    Live { removed: usize, remaining: usize },
    /// The last copies were removed and the entry unlinked.
    Removed { item: T, removed: usize },
}

/// Multiplicity layer over [`HashEngine`].
#[derive(Clone)]
pub struct CountedTable<T, S = DefaultBuildHasher> {
    pub(crate) inner: HashEngine<Counted<T>, ByItem, S>,
}

impl<T> CountedTable<T>
where
    T: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: HashEngine::new(),
        }
    }
}

impl<T> Default for CountedTable<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> CountedTable<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            inner: HashEngine::with_hasher(hasher),
        }
    }

    pub fn with_config(config: EngineConfig, hasher: S) -> Result<Self, CollectionError> {
        Ok(Self {
            inner: HashEngine::with_config(config, hasher)?,
        })
    }

    /// Number of distinct items.
    pub fn unique_len(&self) -> usize {
        self.inner.len()
    }

    pub fn count_of<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.find(q).map_or(0, |c| c.count)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&Counted<T>>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.find(q)
    }

    /// Add `copies` of `item`, inserting a fresh entry when absent. Returns
    /// the new multiplicity. An existing representative is kept.
    pub fn add_copies(&mut self, item: T, copies: usize) -> usize {
        self.add_copies_entry(item, copies).count
    }

    /// Like [`add_copies`](Self::add_copies) but hands back the stored entry.
    pub fn add_copies_entry(&mut self, item: T, copies: usize) -> &Counted<T> {
        debug_assert!(copies > 0);
        if self.inner.contains(&item) {
            self.inner.touch();
            let c = self
                .inner
                .find_mut(&item)
                .expect("entry must exist after successful lookup");
            c.count += copies;
            return c;
        }
        self.inner.insert_unique(Counted::new(item, copies))
    }

    /// Remove up to `copies` copies of `q`, unlinking the entry at zero.
    pub fn remove_copies<Q>(&mut self, q: &Q, copies: usize) -> Decrement<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some(c) = self.inner.find_mut(q) else {
            return Decrement::Absent;
        };
        if c.count > copies {
            c.count -= copies;
            let remaining = c.count;
            self.inner.touch();
            return Decrement::Live {
                removed: copies,
                remaining,
            };
        }
        match self.inner.remove(q) {
            Some(c) => Decrement::Removed {
                removed: c.count,
                item: c.item,
            },
            None => Decrement::Absent,
        }
    }

    /// Swap the stored representative for `item`, keeping its count.
    /// Returns the old representative and the count.
    pub fn replace_item(&mut self, item: T) -> Option<(T, usize)> {
        let c = self.inner.find_mut(&item)?;
        let old = core::mem::replace(&mut c.item, item);
        let count = c.count;
        self.inner.touch();
        Some((old, count))
    }

    /// Lower every multiplicity to `limit(item)`, unlinking entries that drop
    /// to zero. `lowered` sees each entry that stays live with the number of
    /// copies shaved off it. Returns the unlinked `(item, count)` entries.
    pub fn cap_counts<F, G>(&mut self, mut limit: F, mut lowered: G) -> Vec<(T, usize)>
    where
        F: FnMut(&T) -> usize,
        G: FnMut(&T, usize),
    {
        let mut any_live_change = false;
        for c in self.inner.iter_mut() {
            let cap = limit(&c.item);
            if cap > 0 && c.count > cap {
                lowered(&c.item, c.count - cap);
                c.count = cap;
                any_live_change = true;
            }
        }
        if any_live_change {
            self.inner.touch();
        }
        self.inner
            .remove_where(|c| limit(&c.item) == 0)
            .into_iter()
            .map(|c| (c.item, c.count))
            .collect()
    }

    pub fn iter(&self) -> Iter<'_, Counted<T>> {
        self.inner.iter()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn stamp(&self) -> u64 {
        self.inner.stamp()
    }

    /// Engine audit plus the positive-count invariant. Returns the total
    /// number of copies.
    pub fn check(&self) -> Result<usize, InvariantViolation> {
        self.inner.check()?;
        let mut total = 0usize;
        for c in self.inner.iter() {
            ensure_invariant!(c.count >= 1, "bag entry stored with count 0");
            total += c.count;
        }
        Ok(total)
    }
}

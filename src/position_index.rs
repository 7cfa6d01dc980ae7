//! Item → absolute slot index for [`HashedArrayList`](crate::HashedArrayList).
//!
//! A second [`HashEngine`] whose entries pair a copy of each live item with
//! the backing-array slot it occupies. Because the projection keys on the
//! item alone, an item can be indexed at most once, which is what makes the
//! list reject duplicates.

use crate::error::{ensure_invariant, InvariantViolation};
use crate::hash_engine::{DefaultBuildHasher, HashEngine, Projection};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot<T> {
    pub item: T,
    pub slot: usize,
}

/// Projects a [`Slot`] onto its item.
#[derive(Debug, Clone, Copy, Default)]
pub struct BySlotItem;

impl<T: Hash + Eq> Projection<Slot<T>> for BySlotItem {
    type Key = T;
    #[inline]
    fn key(entry: &Slot<T>) -> &T {
        &entry.item
    }
}

#[derive(Clone, Debug)]
pub struct PositionIndex<T, S = DefaultBuildHasher> {
    table: HashEngine<Slot<T>, BySlotItem, S>,
}

impl<T, S> PositionIndex<T, S> {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

impl<T, S> PositionIndex<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: HashEngine::with_hasher(hasher),
        }
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(q)
    }

    /// Absolute slot of `q`, if indexed.
    pub fn slot_of<Q>(&self, q: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(q).map(|s| s.slot)
    }

    /// The indexed representative equal to `q`.
    pub fn find<Q>(&self, q: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(q).map(|s| &s.item)
    }

    /// Index `item` at `slot`. Returns `false`, leaving the index unchanged,
    /// when an equal item is already indexed.
    pub fn insert(&mut self, item: &T, slot: usize) -> bool {
        if self.table.contains(item) {
            return false;
        }
        self.table.insert_unique(Slot {
            item: item.clone(),
            slot,
        });
        true
    }

    /// Replace the indexed representative of `item`, keeping its slot.
    pub fn replace(&mut self, item: &T) {
        if let Some(s) = self.table.find_mut(item) {
            s.item = item.clone();
        }
    }

    /// Unindex `q`, returning the slot it occupied.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(q).map(|s| s.slot)
    }

    /// Rewrite the recorded slot of every item in `items[range]` to its
    /// current position. Called after the array shifted or reordered.
    pub fn reindex(&mut self, items: &[T], range: Range<usize>) {
        let start = range.start;
        for (i, item) in items[range].iter().enumerate() {
            if let Some(s) = self.table.find_mut(item) {
                s.slot = start + i;
            }
        }
    }

    /// Every slot of `items` is indexed exactly once and every indexed entry
    /// points back at an equal item.
    pub fn check(&self, items: &[T]) -> Result<(), InvariantViolation> {
        self.table.check()?;
        ensure_invariant!(
            self.table.len() == items.len(),
            "position index holds {} entries for {} items",
            self.table.len(),
            items.len()
        );
        let mut seen: hashbrown::HashSet<usize> = hashbrown::HashSet::with_capacity(items.len());
        for s in self.table.iter() {
            ensure_invariant!(
                s.slot < items.len(),
                "indexed slot {} past end {}",
                s.slot,
                items.len()
            );
            ensure_invariant!(
                items[s.slot] == s.item,
                "slot {} indexed for a different item",
                s.slot
            );
            ensure_invariant!(seen.insert(s.slot), "slot {} indexed twice", s.slot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(items: &[u32]) -> PositionIndex<u32> {
        let mut idx = PositionIndex::with_hasher(DefaultBuildHasher::default());
        for (i, x) in items.iter().enumerate() {
            assert!(idx.insert(x, i));
        }
        idx
    }

    /// Invariant: an item is indexed at most once.
    #[test]
    fn insert_rejects_duplicates() {
        let mut idx = index_of(&[4, 16, 28]);
        assert!(!idx.insert(&16, 7));
        assert_eq!(idx.slot_of(&16), Some(1));
        assert_eq!(idx.len(), 3);
    }

    /// Invariant: after a shift, `reindex` restores slot agreement.
    #[test]
    fn reindex_after_removal() {
        let mut items = vec![4u32, 16, 28];
        let mut idx = index_of(&items);
        let gone = items.remove(1);
        assert_eq!(idx.remove(&gone), Some(1));
        assert!(idx.check(&items).is_err());
        idx.reindex(&items, 1..items.len());
        idx.check(&items).unwrap();
        assert_eq!(idx.slot_of(&28), Some(1));
        assert_eq!(idx.slot_of(&16), None);
    }

    #[test]
    fn check_flags_stale_slots() {
        let items = vec![1u32, 2, 3];
        let mut idx = index_of(&items);
        idx.reindex(&[3, 2, 1], 0..3);
        assert!(idx.check(&items).is_err());
    }
}

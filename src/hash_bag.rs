//! HashBag: a multiset built on [`CountedTable`].
//!
//! One representative per distinct item is stored together with its
//! multiplicity. `len()` counts copies; `unique_len()` counts distinct items.

use crate::compound::{Counted, CountedTable, Decrement};
use crate::error::{ensure_invariant, CollectionError, InvariantViolation};
use crate::hash_engine::{DefaultBuildHasher, EngineConfig, Iter};
use crate::infra::{
    unsequenced_hash, CollectionEvent, CollectionValue, EventHooks, HashCache, Speed,
};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

pub struct HashBag<T, S = DefaultBuildHasher> {
    table: CountedTable<T, S>,
    size: usize,
    events: EventHooks<T>,
    hash_cache: HashCache,
}

impl<T: Clone, S: Clone> Clone for HashBag<T, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            size: self.size,
            events: EventHooks::default(),
            hash_cache: self.hash_cache.clone(),
        }
    }
}

impl<T: fmt::Debug, S> fmt::Debug for HashBag<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.inner.iter().map(|c| (&c.item, c.count)))
            .finish()
    }
}

impl<T> HashBag<T>
where
    T: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<T> Default for HashBag<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator yielding every copy of every item.
pub struct Copies<'a, T> {
    entries: Iter<'a, Counted<T>>,
    current: Option<(&'a T, usize)>,
    remaining: usize,
}

impl<'a, T> Iterator for Copies<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some((item, left)) = self.current.as_mut() {
                if *left > 0 {
                    *left -= 1;
                    self.remaining -= 1;
                    return Some(*item);
                }
            }
            let c = self.entries.next()?;
            self.current = Some((&c.item, c.count));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> ExactSizeIterator for Copies<'a, T> {}

impl<T, S> HashBag<T, S> {
    /// Total number of copies.
    pub fn len(&self) -> usize {
        self.size
    }
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn stamp(&self) -> u64 {
        self.table.inner.stamp()
    }

    pub fn iter(&self) -> Copies<'_, T> {
        Copies {
            entries: self.table.inner.iter(),
            current: None,
            remaining: self.size,
        }
    }

    pub fn unique_items(&self) -> impl Iterator<Item = &T> + '_ {
        self.table.inner.iter().map(|c| &c.item)
    }

    pub fn item_multiplicities(&self) -> impl Iterator<Item = (&T, usize)> + '_ {
        self.table.inner.iter().map(|c| (&c.item, c.count))
    }

    pub fn choose(&self) -> Option<&T> {
        self.table.inner.choose().map(|c| &c.item)
    }

    pub fn events(&mut self) -> &mut EventHooks<T> {
        &mut self.events
    }
}

impl<T, S> HashBag<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: CountedTable::with_hasher(hasher),
            size: 0,
            events: EventHooks::default(),
            hash_cache: HashCache::default(),
        }
    }

    pub fn with_config(config: EngineConfig, hasher: S) -> Result<Self, CollectionError> {
        Ok(Self {
            table: CountedTable::with_config(config, hasher)?,
            size: 0,
            events: EventHooks::default(),
            hash_cache: HashCache::default(),
        })
    }

    /// Number of distinct items.
    pub fn unique_len(&self) -> usize {
        self.table.unique_len()
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.count_of(q) > 0
    }

    pub fn contains_count<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.count_of(q)
    }

    /// True when every listed item is present at least as often as listed.
    pub fn contains_all<'a, I>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut wanted: CountedTable<&T> = CountedTable::new();
        for x in items {
            wanted.add_copies(x, 1);
        }
        wanted
            .iter()
            .all(|c| self.table.count_of(c.item) >= c.count)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(q).map(|c| &c.item)
    }

    /// Add one copy. Bags accept duplicates, so this always succeeds.
    pub fn add(&mut self, item: T) -> bool {
        self.add_copies(item, 1);
        true
    }

    /// Add `copies` copies of `item` in one step.
    pub fn add_copies(&mut self, item: T, copies: usize) {
        if copies == 0 {
            return;
        }
        self.size += copies;
        if !self.events.is_active() {
            self.table.add_copies(item, copies);
            return;
        }
        let c = self.table.add_copies_entry(item, copies);
        self.events.added(&c.item, copies);
        self.events.changed();
    }

    pub fn add_all<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut added = 0;
        for item in items {
            self.add(item);
            added += 1;
        }
        added
    }

    /// The stored representative equal to `item`, or `None` after adding
    /// one copy of `item`.
    pub fn find_or_add(&mut self, item: T) -> Option<&T> {
        if self.table.count_of(&item) > 0 {
            return self.table.find(&item).map(|c| &c.item);
        }
        self.add(item);
        None
    }

    /// Swap the stored representative, keeping the multiplicity. Returns the
    /// old representative.
    pub fn update(&mut self, item: T) -> Option<T> {
        let (old, count) = self.table.replace_item(item)?;
        if self.events.is_active() {
            self.events.removed(&old, count);
            if let Some(c) = self.table.find(&old) {
                self.events.added(&c.item, count);
            }
            self.events.changed();
        }
        Some(old)
    }

    pub fn update_or_add(&mut self, item: T) -> Option<T> {
        if self.table.count_of(&item) > 0 {
            self.update(item)
        } else {
            self.add(item);
            None
        }
    }

    /// Remove one copy of `q`.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_copies(q, 1) > 0
    }

    /// Remove all copies of `q`; returns how many there were.
    pub fn remove_all_copies<Q>(&mut self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_copies(q, usize::MAX)
    }

    fn remove_copies<Q>(&mut self, q: &Q, copies: usize) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.table.remove_copies(q, copies) {
            Decrement::Absent => 0,
            Decrement::Live { removed, .. } => {
                self.size -= removed;
                if self.events.is_active() {
                    if let Some(c) = self.table.find(q) {
                        self.events.removed(&c.item, removed);
                    }
                    self.events.changed();
                }
                removed
            }
            Decrement::Removed { item, removed } => {
                self.size -= removed;
                if self.events.is_active() {
                    self.events.removed(&item, removed);
                    self.events.changed();
                }
                removed
            }
        }
    }

    /// Remove one copy per listed occurrence; returns copies removed.
    // TODO: when `items` is itself a bag, subtract multiplicities per
    // distinct item instead of walking every copy.
    pub fn remove_all<'a, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut removed_total = 0;
        for q in items {
            match self.table.remove_copies(q, 1) {
                Decrement::Absent => {}
                Decrement::Live { removed, .. } => {
                    removed_total += removed;
                    if self.events.is_active() {
                        if let Some(c) = self.table.find(q) {
                            self.events.removed(&c.item, removed);
                        }
                    }
                }
                Decrement::Removed { item, removed } => {
                    removed_total += removed;
                    if self.events.is_active() {
                        self.events.removed(&item, removed);
                    }
                }
            }
        }
        self.size -= removed_total;
        if removed_total > 0 && self.events.is_active() {
            self.events.changed();
        }
        removed_total
    }

    /// Keep each item at most as often as it is listed.
    pub fn retain_all<'a, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut keep: CountedTable<&T> = CountedTable::new();
        for x in items {
            keep.add_copies(x, 1);
        }
        let active = self.events.is_active();
        let events = &mut self.events;
        let mut lowered = 0;
        let unlinked = self.table.cap_counts(
            |x| keep.count_of(x),
            |x, n| {
                lowered += n;
                if active {
                    events.removed(x, n);
                }
            },
        );
        let removed_total = lowered + unlinked.iter().map(|(_, n)| n).sum::<usize>();
        self.size -= removed_total;
        if removed_total > 0 && active {
            for (item, n) in &unlinked {
                self.events.removed(item, *n);
            }
            self.events.changed();
        }
        removed_total
    }

    pub fn clear(&mut self) {
        let count = self.size;
        self.table.clear();
        self.size = 0;
        if self.events.is_active() {
            self.events.raise(CollectionEvent::Cleared {
                full: true,
                start: 0,
                count,
            });
            self.events.changed();
        }
    }

    /// Order-independent, multiplicity-aware hash, cached per stamp.
    pub fn unsequenced_hash(&self) -> u64 {
        self.hash_cache.get_or_compute(self.stamp(), || {
            unsequenced_hash(
                self.table.inner.hasher(),
                self.table.iter().map(|c| (&c.item, c.count)),
            )
        })
    }

    /// Same items with the same multiplicities as `other`.
    pub fn unsequenced_equals<C>(&self, other: &C) -> bool
    where
        C: CollectionValue<T> + ?Sized,
    {
        if self.size != other.len() {
            return false;
        }
        let mut counts: CountedTable<&T> = CountedTable::new();
        for x in other.items() {
            counts.add_copies(x, 1);
        }
        counts.unique_len() == self.unique_len()
            && counts.iter().all(|c| self.table.count_of(c.item) == c.count)
    }

    pub fn check(&self) -> Result<(), InvariantViolation> {
        let total = self.table.check()?;
        ensure_invariant!(
            total == self.size,
            "bag size {} disagrees with stored multiplicities {}",
            self.size,
            total
        );
        Ok(())
    }
}

impl<T, S> HashBag<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Remove one copy of `q` and return the stored representative.
    pub fn remove_with_report<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let representative = self.table.find(q)?.item.clone();
        self.remove_copies(q, 1);
        Some(representative)
    }
}

impl<T, S> CollectionValue<T> for HashBag<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn len(&self) -> usize {
        self.size
    }

    fn contains_speed(&self) -> Speed {
        Speed::Constant
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }
}

impl<T, S> PartialEq for HashBag<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.unique_len() == other.unique_len()
            && other
                .item_multiplicities()
                .all(|(x, n)| self.table.count_of(x) == n)
    }
}

impl<T, S> Eq for HashBag<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
}

impl<T> FromIterator<T> for HashBag<T>
where
    T: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut bag = HashBag::new();
        bag.add_all(iter);
        bag
    }
}

impl<T, S> Extend<T> for HashBag<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

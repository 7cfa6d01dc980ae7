//! HashSet: unique items over the chained [`HashEngine`].

use crate::error::{CollectionError, InvariantViolation};
use crate::hash_engine::{
    Cursor, DefaultBuildHasher, EngineConfig, HashEngine, Iter, Lookup, Whole,
};
use crate::infra::{
    unsequenced_hash, CollectionEvent, CollectionValue, EventHooks, HashCache, Speed,
};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

/// An unordered set with constant-time membership.
///
/// Equality between sets is unsequenced: two sets are equal when they hold
/// equal items, regardless of iteration order.
pub struct HashSet<T, S = DefaultBuildHasher> {
    table: HashEngine<T, Whole, S>,
    events: EventHooks<T>,
    hash_cache: HashCache,
}

impl<T: Clone, S: Clone> Clone for HashSet<T, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            events: EventHooks::default(),
            hash_cache: self.hash_cache.clone(),
        }
    }
}

impl<T: fmt::Debug, S> fmt::Debug for HashSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.iter()).finish()
    }
}

impl<T> HashSet<T>
where
    T: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<T> Default for HashSet<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> HashSet<T, S> {
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stamp(&self) -> u64 {
        self.table.stamp()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.table.iter()
    }

    /// Stamp-checked cursor; advance it with [`HashSet::cursor_next`].
    pub fn cursor(&self) -> Cursor {
        self.table.cursor()
    }

    /// Some item of the set, or `None` when empty.
    pub fn choose(&self) -> Option<&T> {
        self.table.choose()
    }

    /// Every item occurs once in a set.
    pub fn unique_items(&self) -> Iter<'_, T> {
        self.table.iter()
    }

    pub fn item_multiplicities(&self) -> impl Iterator<Item = (&T, usize)> + '_ {
        self.table.iter().map(|t| (t, 1))
    }

    pub fn events(&mut self) -> &mut EventHooks<T> {
        &mut self.events
    }
}

impl<T, S> HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: HashEngine::with_hasher(hasher),
            events: EventHooks::default(),
            hash_cache: HashCache::default(),
        }
    }

    pub fn with_config(config: EngineConfig, hasher: S) -> Result<Self, CollectionError> {
        Ok(Self {
            table: HashEngine::with_config(config, hasher)?,
            events: EventHooks::default(),
            hash_cache: HashCache::default(),
        })
    }

    pub fn cursor_next<'a>(&'a self, cursor: &mut Cursor) -> Result<Option<&'a T>, CollectionError> {
        cursor.next(&self.table)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(q)
    }

    /// Multiplicity of `q`: 0 or 1.
    pub fn contains_count<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        usize::from(self.table.contains(q))
    }

    pub fn contains_all<'a, I>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        items.into_iter().all(|x| self.table.contains(x))
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(q)
    }

    /// Add `item`; `false` (dropping `item`) when an equal item is present.
    pub fn add(&mut self, item: T) -> bool {
        match self.table.insert(item) {
            Ok(stored) => {
                if self.events.is_active() {
                    self.events.added(stored, 1);
                    self.events.changed();
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Add every item; returns how many were new.
    pub fn add_all<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut added = 0;
        for item in items {
            if let Ok(stored) = self.table.insert(item) {
                added += 1;
                if self.events.is_active() {
                    self.events.added(stored, 1);
                }
            }
        }
        if added > 0 && self.events.is_active() {
            self.events.changed();
        }
        added
    }

    /// The stored item equal to `item`, or `None` after adding `item`.
    pub fn find_or_add(&mut self, item: T) -> Option<&T> {
        match self.table.insert_or_find(item) {
            Lookup::Found(existing) => Some(existing),
            Lookup::Inserted(stored) => {
                if self.events.is_active() {
                    self.events.added(stored, 1);
                    self.events.changed();
                }
                None
            }
        }
    }

    /// Replace the stored item equal to `item`; returns the old one.
    pub fn update(&mut self, item: T) -> Option<T> {
        let old = self.table.update(item)?;
        if self.events.is_active() {
            self.events.removed(&old, 1);
            if let Some(new) = self.table.find(&old) {
                self.events.added(new, 1);
            }
            self.events.changed();
        }
        Some(old)
    }

    /// Update when present, add otherwise. Returns the replaced item.
    pub fn update_or_add(&mut self, item: T) -> Option<T> {
        if self.table.contains(&item) {
            self.update(item)
        } else {
            self.add(item);
            None
        }
    }

    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_with_report(q).is_some()
    }

    /// Remove and return the stored item equal to `q`.
    pub fn remove_with_report<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let old = self.table.remove(q)?;
        if self.events.is_active() {
            self.events.removed(&old, 1);
            self.events.changed();
        }
        Some(old)
    }

    /// Same as [`HashSet::remove`]; a set holds at most one copy.
    pub fn remove_all_copies<Q>(&mut self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove(q)
    }

    /// Remove every listed item; returns how many were present.
    pub fn remove_all<'a, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut removed = 0;
        for q in items {
            if let Some(old) = self.table.remove(q) {
                removed += 1;
                if self.events.is_active() {
                    self.events.removed(&old, 1);
                }
            }
        }
        if removed > 0 && self.events.is_active() {
            self.events.changed();
        }
        removed
    }

    /// Keep only items also listed in `items`; returns how many were dropped.
    pub fn retain_all<'a, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut keep: HashEngine<&T> = HashEngine::new();
        for x in items {
            let _ = keep.insert(x);
        }
        let dropped = self.table.remove_where(|x| !keep.contains(&&*x));
        self.report_removed(&dropped);
        dropped.len()
    }

    /// Keep only items that `other` contains.
    pub fn retain_in<C>(&mut self, other: &C) -> usize
    where
        C: CollectionValue<T> + ?Sized,
    {
        let dropped = self.table.remove_where(|x| !other.contains_item(x));
        self.report_removed(&dropped);
        dropped.len()
    }

    fn report_removed(&mut self, dropped: &[T]) {
        if !dropped.is_empty() && self.events.is_active() {
            for x in dropped {
                self.events.removed(x, 1);
            }
            self.events.changed();
        }
    }

    pub fn clear(&mut self) {
        let count = self.table.len();
        self.table.clear();
        if self.events.is_active() {
            self.events.raise(CollectionEvent::Cleared {
                full: true,
                start: 0,
                count,
            });
            self.events.changed();
        }
    }

    /// Order-independent hash, cached until the next modification.
    pub fn unsequenced_hash(&self) -> u64 {
        self.hash_cache.get_or_compute(self.table.stamp(), || {
            unsequenced_hash(self.table.hasher(), self.table.iter().map(|t| (t, 1)))
        })
    }

    /// Same items as `other`, in any order.
    pub fn unsequenced_equals<C>(&self, other: &C) -> bool
    where
        C: CollectionValue<T> + ?Sized,
    {
        self.len() == other.len() && other.items().all(|x| self.table.contains(x))
    }

    pub fn check(&self) -> Result<(), InvariantViolation> {
        self.table.check()
    }
}

impl<T, S> CollectionValue<T> for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn len(&self) -> usize {
        self.table.len()
    }

    fn contains_speed(&self) -> Speed {
        Speed::Constant
    }

    fn contains_item(&self, item: &T) -> bool {
        self.table.contains(item)
    }

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.table.iter())
    }
}

impl<T, S> PartialEq for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.unsequenced_equals(other)
    }
}

impl<T, S> Eq for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
}

impl<T> FromIterator<T> for HashSet<T>
where
    T: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = HashSet::new();
        set.add_all(iter);
        set
    }
}

impl<T, S> Extend<T> for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

impl<'a, T, S> IntoIterator for &'a HashSet<T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder<T: fmt::Debug + 'static>(set: &mut HashSet<T>) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        set.events().subscribe(move |e| sink.borrow_mut().push(format!("{:?}", e)));
        log
    }

    /// Invariant: `add` rejects duplicates and `contains_count` is 0 or 1.
    #[test]
    fn add_rejects_duplicates() {
        let mut s: HashSet<i32> = HashSet::new();
        assert!(s.add(3));
        assert!(!s.add(3));
        assert_eq!(s.len(), 1);
        assert_eq!(s.contains_count(&3), 1);
        assert_eq!(s.contains_count(&4), 0);
        s.check().unwrap();
    }

    /// Invariant: `find_or_add` reports the stored representative or adds.
    #[test]
    fn find_or_add_and_update() {
        let mut s: HashSet<String> = HashSet::new();
        assert_eq!(s.find_or_add("a".to_string()), None);
        assert_eq!(s.find_or_add("a".to_string()).map(|x| x.as_str()), Some("a"));
        assert_eq!(s.update("a".to_string()), Some("a".to_string()));
        assert_eq!(s.update("b".to_string()), None);
        assert_eq!(s.update_or_add("b".to_string()), None);
        assert!(s.contains("b"));
        assert_eq!(s.len(), 2);
    }

    /// Invariant: `remove_all` / `retain_all` remove exactly the listed
    /// (respectively unlisted) items.
    #[test]
    fn bulk_removal() {
        let mut s: HashSet<u32> = (0..20).collect();
        assert_eq!(s.remove_all(&[1, 2, 3, 99]), 3);
        assert_eq!(s.len(), 17);
        let keep: Vec<u32> = (0..10).collect();
        assert_eq!(s.retain_all(&keep), 10);
        let mut left: Vec<u32> = s.iter().copied().collect();
        left.sort_unstable();
        assert_eq!(left, vec![0, 4, 5, 6, 7, 8, 9]);
        s.check().unwrap();
    }

    /// Invariant: Unsequenced equality and hash ignore insertion order.
    #[test]
    fn unsequenced_equality() {
        let a: HashSet<u32> = [1, 2, 3].into_iter().collect();
        let b: HashSet<u32> = [3, 1, 2].into_iter().collect();
        let c: HashSet<u32> = [1, 2].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.unsequenced_hash(), b.unsequenced_hash());
        assert_ne!(a.unsequenced_hash(), c.unsequenced_hash());
    }

    /// Invariant: Hooks fire after the change with a closing `Changed`, and
    /// failed operations fire nothing.
    #[test]
    fn events_follow_mutations() {
        let mut s: HashSet<i32> = HashSet::new();
        let log = recorder(&mut s);
        s.add(1);
        s.add(1);
        s.remove(&1);
        s.remove(&1);
        assert_eq!(
            *RefCell::borrow(&log),
            vec![
                "Added { item: 1, count: 1 }",
                "Changed",
                "Removed { item: 1, count: 1 }",
                "Changed",
            ]
        );
    }

    /// Invariant: A cursor fails once the set is modified.
    #[test]
    fn cursor_invalidation() {
        let mut s: HashSet<i32> = (0..4).collect();
        let mut c = s.cursor();
        assert!(s.cursor_next(&mut c).unwrap().is_some());
        s.remove(&0);
        assert_eq!(s.cursor_next(&mut c), Err(CollectionError::CollectionModified));
    }

    /// Invariant: `choose` is `None` only on an empty set.
    #[test]
    fn choose_on_empty() {
        let mut s: HashSet<i32> = HashSet::new();
        assert_eq!(s.choose(), None);
        s.add(5);
        assert_eq!(s.choose(), Some(&5));
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.choose(), None);
    }
}

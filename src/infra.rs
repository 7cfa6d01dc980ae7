//! Bookkeeping shared by every collection: complexity classes, cached
//! aggregate hash codes, sequenced/unsequenced hashing and change hooks.

use core::cell::Cell;
use core::fmt;
use core::hash::{BuildHasher, Hash};

/// Symbolic cost of a query. Ordered from slowest to fastest, so
/// `a.contains_speed() > b.contains_speed()` means `a` answers faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Speed {
    PotentiallyInfinite,
    Linear,
    Log,
    Constant,
}

/// Read-side contract every collection in the crate exposes. Algorithms that
/// combine two collections use the speeds to decide which side to walk.
pub trait CollectionValue<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count_speed(&self) -> Speed {
        Speed::Constant
    }

    fn contains_speed(&self) -> Speed;

    fn contains_item(&self, item: &T) -> bool;

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_>;

    /// Core collections are never read-only; guard wrappers override this.
    fn is_read_only(&self) -> bool {
        false
    }
}

/// True when no item of `a` is contained in `b`. Walks whichever side lets
/// the other answer membership faster, or the shorter one on a tie.
pub fn is_disjoint<T, A, B>(a: &A, b: &B) -> bool
where
    A: CollectionValue<T> + ?Sized,
    B: CollectionValue<T> + ?Sized,
{
    let walk_a = match b.contains_speed().cmp(&a.contains_speed()) {
        core::cmp::Ordering::Greater => true,
        core::cmp::Ordering::Less => false,
        core::cmp::Ordering::Equal => a.len() <= b.len(),
    };
    if walk_a {
        !a.items().any(|x| b.contains_item(x))
    } else {
        !b.items().any(|x| a.contains_item(x))
    }
}

/// Unsequenced hash cached against the stamp it was computed at.
#[derive(Debug, Default)]
pub(crate) struct HashCache {
    cached: Cell<Option<(u64, u64)>>,
}

impl Clone for HashCache {
    fn clone(&self) -> Self {
        Self {
            cached: Cell::new(self.cached.get()),
        }
    }
}

impl HashCache {
    pub(crate) fn get_or_compute<F>(&self, stamp: u64, compute: F) -> u64
    where
        F: FnOnce() -> u64,
    {
        if let Some((at, hash)) = self.cached.get() {
            if at == stamp {
                return hash;
            }
        }
        let hash = compute();
        self.cached.set(Some((stamp, hash)));
        hash
    }
}

#[inline]
fn mix(h: u64) -> u64 {
    // splitmix64 finalizer
    let mut z = h.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Order-independent, multiplicity-aware hash of `(item, count)` pairs.
pub(crate) fn unsequenced_hash<'a, T, S, I>(hasher: &S, items: I) -> u64
where
    T: Hash + 'a,
    S: BuildHasher,
    I: IntoIterator<Item = (&'a T, usize)>,
{
    items.into_iter().fold(0u64, |acc, (item, count)| {
        acc.wrapping_add(mix(hasher.hash_one(item)).wrapping_mul(count as u64))
    })
}

/// Order-sensitive hash of a sequence.
pub(crate) fn sequenced_hash<'a, T, S, I>(hasher: &S, items: I) -> u64
where
    T: Hash + 'a,
    S: BuildHasher,
    I: IntoIterator<Item = &'a T>,
{
    items.into_iter().fold(0u64, |acc, item| {
        acc.wrapping_mul(31).wrapping_add(hasher.hash_one(item))
    })
}

/// Change notification delivered to listeners after the change is applied.
#[derive(Debug, PartialEq, Eq)]
pub enum CollectionEvent<'a, T> {
    Added { item: &'a T, count: usize },
    Removed { item: &'a T, count: usize },
    Inserted { index: usize, item: &'a T },
    RemovedAt { index: usize, item: &'a T },
    /// `full` is false when only a range (`start..start + count`) was cleared.
    Cleared { full: bool, start: usize, count: usize },
    /// Closes every logical operation that raised item-level events.
    Changed,
}

type Listener<T> = Box<dyn FnMut(&CollectionEvent<'_, T>)>;

/// Listener registry. Cloning a collection does not clone its listeners.
pub struct EventHooks<T> {
    listeners: Vec<Listener<T>>,
}

impl<T> Default for EventHooks<T> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<T> Clone for EventHooks<T> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<T> fmt::Debug for EventHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHooks")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T> EventHooks<T> {
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&CollectionEvent<'_, T>) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn is_active(&self) -> bool {
        !self.listeners.is_empty()
    }

    pub(crate) fn raise(&mut self, event: CollectionEvent<'_, T>) {
        for l in self.listeners.iter_mut() {
            l(&event);
        }
    }

    pub(crate) fn added(&mut self, item: &T, count: usize) {
        self.raise(CollectionEvent::Added { item, count });
    }

    pub(crate) fn removed(&mut self, item: &T, count: usize) {
        self.raise(CollectionEvent::Removed { item, count });
    }

    pub(crate) fn changed(&mut self) {
        self.raise(CollectionEvent::Changed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_engine::DefaultBuildHasher;

    #[test]
    fn unsequenced_hash_ignores_order_but_not_counts() {
        let h = DefaultBuildHasher::default();
        let a = unsequenced_hash(&h, [(&1, 1), (&2, 2)]);
        let b = unsequenced_hash(&h, [(&2, 2), (&1, 1)]);
        let c = unsequenced_hash(&h, [(&2, 1), (&1, 1)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sequenced_hash_depends_on_order() {
        let h = DefaultBuildHasher::default();
        assert_ne!(
            sequenced_hash(&h, [&1, &2, &3]),
            sequenced_hash(&h, [&3, &2, &1])
        );
    }

    #[test]
    fn hash_cache_recomputes_on_new_stamp() {
        let cache = HashCache::default();
        let calls = Cell::new(0);
        let f = || {
            calls.set(calls.get() + 1);
            42
        };
        assert_eq!(cache.get_or_compute(1, f), 42);
        assert_eq!(cache.get_or_compute(1, f), 42);
        assert_eq!(calls.get(), 1);
        cache.get_or_compute(2, f);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn speeds_order_slowest_first() {
        assert!(Speed::Constant > Speed::Log);
        assert!(Speed::Log > Speed::Linear);
        assert!(Speed::Linear > Speed::PotentiallyInfinite);
    }
}

//! HashedArrayList: a growable array of distinct items with constant-time
//! membership and any number of live sub-range views.
//!
//! ## Layout
//!
//! - `items`: the backing `Vec<T>` shared by the root and every view.
//! - `index`: a [`PositionIndex`] mapping each item to its absolute slot.
//!   An item can be indexed once, so the list rejects duplicates.
//! - `views`: a [`ViewRegistry`] of `(offset, size)` windows. Handles are
//!   generational keys, so a disposed view is detected rather than misread.
//!
//! Every operation is available on the root ([`HashedArrayList::root_mut`],
//! or the shorthand methods on the list itself) and on any view
//! ([`HashedArrayList::view_mut`]). Indices passed to a view are relative
//! to its offset. A mutation through one view fixes up the offset and size
//! of every other view; see [`crate::view_registry`] for the rules.
//!
//! A structural change bumps the list stamp. [`ListCursor`]s capture the
//! stamp and fail with `CollectionModified` once it moves.

use crate::config::DEFAULT_LIST_CAPACITY;
use crate::error::{ensure_invariant, CollectionError, InvariantViolation};
use crate::hash_engine::{fresh_rng, uniform_below, DefaultBuildHasher, HashEngine};
use crate::infra::{
    sequenced_hash, unsequenced_hash, CollectionEvent, CollectionValue, EventHooks, HashCache,
    Speed,
};
use crate::position_index::PositionIndex;
use crate::view_registry::{ViewKey, ViewRegistry, ViewState};
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Range;
use core::sync::atomic::{self, AtomicU64};
use rand_core::RngCore;
use tracing::{debug, trace};

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

/// Names one view of one list. Copyable; it does not keep the view alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle {
    list: u64,
    key: ViewKey,
}

/// Stamp-checked position over a window; advance with
/// [`HashedArrayList::cursor_next`].
#[derive(Debug, Clone)]
pub struct ListCursor {
    stamp: u64,
    pos: usize,
    end: usize,
}

/// Resolved window: the root (`key == None`) or a registered view.
#[derive(Debug, Clone, Copy)]
struct Window {
    key: Option<ViewKey>,
    offset: usize,
    size: usize,
}

impl Window {
    fn end(&self) -> usize {
        self.offset + self.size
    }
    fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
    fn state(&self) -> ViewState {
        ViewState::new(self.offset, self.size)
    }
}

fn check_range(start: usize, count: usize, len: usize) -> Result<(), CollectionError> {
    if start > len {
        return Err(CollectionError::IndexOutOfRange { index: start, len });
    }
    if count > len - start {
        return Err(CollectionError::ArgumentOutOfRange("count"));
    }
    Ok(())
}

pub struct HashedArrayList<T, S = DefaultBuildHasher> {
    items: Vec<T>,
    index: PositionIndex<T, S>,
    views: ViewRegistry,
    stamp: u64,
    id: u64,
    events: EventHooks<T>,
    sequenced_cache: HashCache,
    unsequenced_cache: HashCache,
}

impl<T: fmt::Debug, S> fmt::Debug for HashedArrayList<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

/// Clones the items only. The clone starts with no views and no listeners,
/// and handles taken on the source list are rejected by it.
impl<T: Clone, S: Clone> Clone for HashedArrayList<T, S> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            index: self.index.clone(),
            views: ViewRegistry::new(),
            stamp: 0,
            id: NEXT_LIST_ID.fetch_add(1, atomic::Ordering::Relaxed),
            events: EventHooks::default(),
            sequenced_cache: HashCache::default(),
            unsequenced_cache: HashCache::default(),
        }
    }
}

impl<T> HashedArrayList<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(DEFAULT_LIST_CAPACITY, Default::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<T> Default for HashedArrayList<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> HashedArrayList<T, S> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Number of live views.
    pub fn views(&self) -> usize {
        self.views.len()
    }

    pub fn events(&mut self) -> &mut EventHooks<T> {
        &mut self.events
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// True when `handle` names a live view of this list.
    pub fn is_valid_view(&self, handle: ViewHandle) -> bool {
        handle.list == self.id && self.views.contains(handle.key)
    }

    /// Dispose one view. Returns `false` when it was already gone or belongs
    /// to another list.
    pub fn dispose_view(&mut self, handle: ViewHandle) -> bool {
        handle.list == self.id && self.views.dispose(handle.key)
    }

    pub fn cursor(&self) -> ListCursor {
        ListCursor {
            stamp: self.stamp,
            pos: 0,
            end: self.items.len(),
        }
    }

    pub fn cursor_next<'a>(
        &'a self,
        cursor: &mut ListCursor,
    ) -> Result<Option<&'a T>, CollectionError> {
        if cursor.stamp != self.stamp {
            return Err(CollectionError::CollectionModified);
        }
        if cursor.pos >= cursor.end {
            return Ok(None);
        }
        let item = &self.items[cursor.pos];
        cursor.pos += 1;
        Ok(Some(item))
    }

    fn touch(&mut self) {
        self.stamp += 1;
    }

    fn handle(&self, key: ViewKey) -> ViewHandle {
        ViewHandle { list: self.id, key }
    }

    fn root_window(&self) -> Window {
        Window {
            key: None,
            offset: 0,
            size: self.items.len(),
        }
    }

    fn resolve(&self, handle: ViewHandle) -> Result<Window, CollectionError> {
        if handle.list != self.id {
            return Err(CollectionError::IncompatibleView);
        }
        let v = self
            .views
            .get(handle.key)
            .ok_or(CollectionError::ViewDisposed)?;
        Ok(Window {
            key: Some(handle.key),
            offset: v.offset,
            size: v.size,
        })
    }

    /// Record a new size for the acting window, in the registry too.
    fn resize_window(&mut self, w: &mut Window, size: usize) {
        w.size = size;
        if let Some(v) = w.key.and_then(|k| self.views.get_mut(k)) {
            v.size = size;
        }
    }

    fn notify_inserted(&mut self, at: usize, count: usize) {
        if !self.events.is_active() {
            return;
        }
        for (j, item) in self.items[at..at + count].iter().enumerate() {
            self.events.raise(CollectionEvent::Inserted {
                index: at + j,
                item,
            });
            self.events.added(item, 1);
        }
        self.events.changed();
    }
}

impl<T, S> HashedArrayList<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_LIST_CAPACITY, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            index: PositionIndex::with_hasher(hasher),
            views: ViewRegistry::new(),
            stamp: 0,
            id: NEXT_LIST_ID.fetch_add(1, atomic::Ordering::Relaxed),
            events: EventHooks::default(),
            sequenced_cache: HashCache::default(),
            unsequenced_cache: HashCache::default(),
        }
    }

    /// Read access to the whole list.
    pub fn root(&self) -> View<'_, T, S> {
        View {
            w: self.root_window(),
            list: self,
        }
    }

    /// Mutable access to the whole list.
    pub fn root_mut(&mut self) -> ViewMut<'_, T, S> {
        ViewMut {
            w: self.root_window(),
            list: self,
        }
    }

    pub fn view(&self, handle: ViewHandle) -> Result<View<'_, T, S>, CollectionError> {
        let w = self.resolve(handle)?;
        Ok(View { list: self, w })
    }

    pub fn view_mut(&mut self, handle: ViewHandle) -> Result<ViewMut<'_, T, S>, CollectionError> {
        let w = self.resolve(handle)?;
        Ok(ViewMut { list: self, w })
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        self.items.get(i)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.contains(q)
    }

    pub fn index_of<Q>(&self, q: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.slot_of(q)
    }

    pub fn add(&mut self, item: T) -> bool {
        self.root_mut().add(item)
    }

    pub fn add_all<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        self.root_mut().add_all(items)
    }

    pub fn insert(&mut self, i: usize, item: T) -> Result<(), CollectionError> {
        self.root_mut().insert(i, item)
    }

    pub fn insert_all<I>(&mut self, i: usize, items: I) -> Result<usize, CollectionError>
    where
        I: IntoIterator<Item = T>,
    {
        self.root_mut().insert_all(i, items)
    }

    pub fn set(&mut self, i: usize, item: T) -> Result<T, CollectionError> {
        self.root_mut().set(i, item)
    }

    pub fn remove_at(&mut self, i: usize) -> Result<T, CollectionError> {
        self.root_mut().remove_at(i)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.root_mut().remove(q)
    }

    pub fn remove_interval(&mut self, start: usize, count: usize) -> Result<(), CollectionError> {
        self.root_mut().remove_interval(start, count)
    }

    pub fn remove_all<'b, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'b T>,
        T: 'b,
    {
        self.root_mut().remove_all(items)
    }

    pub fn retain_all<'b, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'b T>,
        T: 'b,
    {
        self.root_mut().retain_all(items)
    }

    /// Empty the list and dispose every view.
    pub fn clear(&mut self) {
        self.root_mut().clear();
    }

    pub fn reverse(&mut self) {
        self.root_mut().reverse();
    }

    pub fn sort_by<F>(&mut self, cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.root_mut().sort_by(cmp);
    }

    pub fn take_view(&mut self, start: usize, count: usize) -> Result<ViewHandle, CollectionError> {
        self.root_mut().take_view(start, count)
    }

    /// End of life for the list: clears it and disposes every view. The list
    /// itself stays usable.
    pub fn dispose(&mut self) {
        let views = self.views.len();
        self.clear();
        debug!(list = self.id, views, "list disposed");
    }

    pub fn index_of_speed(&self) -> Speed {
        Speed::Constant
    }

    pub fn sequenced_hash(&self) -> u64 {
        self.root().sequenced_hash()
    }

    pub fn unsequenced_hash(&self) -> u64 {
        self.root().unsequenced_hash()
    }

    pub fn unsequenced_equals<C>(&self, other: &C) -> bool
    where
        C: CollectionValue<T> + ?Sized,
    {
        self.root().unsequenced_equals(other)
    }

    /// Audit the backing array against the position index and every view
    /// against the array bounds.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        self.index.check(&self.items)?;
        for (_, v) in self.views.iter() {
            ensure_invariant!(
                v.end() <= self.items.len(),
                "view [{}, {}) past end {}",
                v.offset,
                v.end(),
                self.items.len()
            );
        }
        Ok(())
    }
}

impl<T, S> HashedArrayList<T, S>
where
    T: Eq + Hash + Clone + Ord,
    S: BuildHasher,
{
    pub fn sort(&mut self) {
        self.root_mut().sort();
    }
}

/// Read access to the root or one view.
pub struct View<'a, T, S = DefaultBuildHasher> {
    list: &'a HashedArrayList<T, S>,
    w: Window,
}

impl<'a, T, S> View<'a, T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn len(&self) -> usize {
        self.w.size
    }

    pub fn is_empty(&self) -> bool {
        self.w.size == 0
    }

    /// Absolute offset into the backing array; 0 for the root.
    pub fn offset(&self) -> usize {
        self.w.offset
    }

    /// `None` for the root.
    pub fn handle(&self) -> Option<ViewHandle> {
        self.w.key.map(|k| self.list.handle(k))
    }

    pub fn as_slice(&self) -> &'a [T] {
        &self.list.items[self.w.range()]
    }

    pub fn iter(&self) -> core::slice::Iter<'a, T> {
        self.as_slice().iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    pub fn get(&self, i: usize) -> Option<&'a T> {
        self.as_slice().get(i)
    }

    /// Like [`View::get`] but fails with `IndexOutOfRange`.
    pub fn item(&self, i: usize) -> Result<&'a T, CollectionError> {
        self.get(i).ok_or(CollectionError::IndexOutOfRange {
            index: i,
            len: self.w.size,
        })
    }

    pub fn first(&self) -> Option<&'a T> {
        self.as_slice().first()
    }

    pub fn last(&self) -> Option<&'a T> {
        self.as_slice().last()
    }

    /// Position of `q` relative to this window.
    pub fn index_of<Q>(&self, q: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.list.index.slot_of(q)?;
        self.w.range().contains(&slot).then(|| slot - self.w.offset)
    }

    /// Items are distinct, so this agrees with [`View::index_of`].
    pub fn last_index_of<Q>(&self, q: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index_of(q)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index_of(q).is_some()
    }

    pub fn contains_count<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        usize::from(self.contains(q))
    }

    pub fn contains_all<'b, I>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = &'b T>,
        T: 'b,
    {
        items.into_iter().all(|x| self.contains(x))
    }

    /// The stored item equal to `q`.
    pub fn find<Q>(&self, q: &Q) -> Option<&'a T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index_of(q).map(|i| &self.as_slice()[i])
    }

    pub fn is_sorted_by<F>(&self, mut cmp: F) -> bool
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.as_slice()
            .windows(2)
            .all(|p| cmp(&p[0], &p[1]) != Ordering::Greater)
    }

    pub fn cursor(&self) -> ListCursor {
        ListCursor {
            stamp: self.list.stamp,
            pos: self.w.offset,
            end: self.w.end(),
        }
    }

    /// Order-sensitive hash. Cached for the root.
    pub fn sequenced_hash(&self) -> u64 {
        let compute = || sequenced_hash(self.list.index.hasher(), self.iter());
        match self.w.key {
            None => self
                .list
                .sequenced_cache
                .get_or_compute(self.list.stamp, compute),
            Some(_) => compute(),
        }
    }

    /// Order-independent hash. Cached for the root.
    pub fn unsequenced_hash(&self) -> u64 {
        let compute = || unsequenced_hash(self.list.index.hasher(), self.iter().map(|x| (x, 1)));
        match self.w.key {
            None => self
                .list
                .unsequenced_cache
                .get_or_compute(self.list.stamp, compute),
            Some(_) => compute(),
        }
    }

    pub fn sequenced_equals<'b, I>(&self, other: I) -> bool
    where
        I: IntoIterator<Item = &'b T>,
        T: 'b,
    {
        self.iter().eq(other)
    }

    /// Same items regardless of order, counting multiplicities on the other
    /// side.
    pub fn unsequenced_equals<C>(&self, other: &C) -> bool
    where
        C: CollectionValue<T> + ?Sized,
    {
        other.len() == self.w.size
            && other.items().all(|x| self.contains(x))
            && self.iter().all(|x| other.contains_item(x))
    }
}

impl<'a, T, S> View<'a, T, S>
where
    T: Eq + Hash + Clone + Ord,
    S: BuildHasher,
{
    pub fn is_sorted(&self) -> bool {
        self.is_sorted_by(T::cmp)
    }
}

impl<'a, T, S> CollectionValue<T> for View<'a, T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    fn len(&self) -> usize {
        self.w.size
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

/// Mutable access to the root or one view.
pub struct ViewMut<'a, T, S = DefaultBuildHasher> {
    list: &'a mut HashedArrayList<T, S>,
    w: Window,
}

impl<'a, T, S> ViewMut<'a, T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn as_view(&self) -> View<'_, T, S> {
        View {
            list: &*self.list,
            w: self.w,
        }
    }

    pub fn len(&self) -> usize {
        self.w.size
    }

    pub fn is_empty(&self) -> bool {
        self.w.size == 0
    }

    pub fn offset(&self) -> usize {
        self.w.offset
    }

    pub fn handle(&self) -> Option<ViewHandle> {
        self.w.key.map(|k| self.list.handle(k))
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        self.list.items[self.w.range()].get(i)
    }

    pub fn index_of<Q>(&self, q: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.as_view().index_of(q)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.as_view().contains(q)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_view().to_vec()
    }

    /// Insert `item` at window position `i`. Fails with `IndexOutOfRange`
    /// past the end and `DuplicateNotAllowed` when the item is already
    /// anywhere in the list.
    pub fn insert(&mut self, i: usize, item: T) -> Result<(), CollectionError> {
        if i > self.w.size {
            return Err(CollectionError::IndexOutOfRange {
                index: i,
                len: self.w.size,
            });
        }
        let at = self.w.offset + i;
        let l = &mut *self.list;
        if !l.index.insert(&item, at) {
            return Err(CollectionError::DuplicateNotAllowed);
        }
        l.items.insert(at, item);
        l.index.reindex(&l.items, at + 1..l.items.len());
        l.views.on_insert(self.w.key, at, 1);
        let size = self.w.size + 1;
        l.resize_window(&mut self.w, size);
        l.touch();
        l.notify_inserted(at, 1);
        Ok(())
    }

    pub fn insert_first(&mut self, item: T) -> Result<(), CollectionError> {
        self.insert(0, item)
    }

    pub fn insert_last(&mut self, item: T) -> Result<(), CollectionError> {
        self.insert(self.w.size, item)
    }

    /// Insert every item of `items` at window position `i`, in order. When
    /// any item is a duplicate nothing is inserted.
    pub fn insert_all<I>(&mut self, i: usize, items: I) -> Result<usize, CollectionError>
    where
        I: IntoIterator<Item = T>,
    {
        if i > self.w.size {
            return Err(CollectionError::IndexOutOfRange {
                index: i,
                len: self.w.size,
            });
        }
        let batch: Vec<T> = items.into_iter().collect();
        let count = batch.len();
        if count == 0 {
            return Ok(0);
        }
        let at = self.w.offset + i;
        let l = &mut *self.list;
        for (j, x) in batch.iter().enumerate() {
            if !l.index.insert(x, at + j) {
                for y in &batch[..j] {
                    l.index.remove(y);
                }
                return Err(CollectionError::DuplicateNotAllowed);
            }
        }
        let tail = l.items.split_off(at);
        l.items.extend(batch);
        l.items.extend(tail);
        l.index.reindex(&l.items, at + count..l.items.len());
        l.views.on_insert(self.w.key, at, count);
        let size = self.w.size + count;
        l.resize_window(&mut self.w, size);
        l.touch();
        l.notify_inserted(at, count);
        Ok(count)
    }

    /// Append `item`; `false` when it is already in the list.
    pub fn add(&mut self, item: T) -> bool {
        self.insert(self.w.size, item).is_ok()
    }

    /// Append every item not already present; returns how many were added.
    pub fn add_all<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut added = 0;
        for item in items {
            if self.add(item) {
                added += 1;
            }
        }
        added
    }

    /// Replace the item at window position `i`, returning the old one.
    pub fn set(&mut self, i: usize, item: T) -> Result<T, CollectionError> {
        if i >= self.w.size {
            return Err(CollectionError::IndexOutOfRange {
                index: i,
                len: self.w.size,
            });
        }
        let at = self.w.offset + i;
        let l = &mut *self.list;
        match l.index.slot_of(&item) {
            Some(slot) if slot != at => return Err(CollectionError::DuplicateNotAllowed),
            _ => {}
        }
        let old = core::mem::replace(&mut l.items[at], item);
        if old == l.items[at] {
            l.index.replace(&l.items[at]);
        } else {
            l.index.remove(&old);
            l.index.insert(&l.items[at], at);
        }
        l.touch();
        if l.events.is_active() {
            l.events.raise(CollectionEvent::RemovedAt {
                index: at,
                item: &old,
            });
            l.events.removed(&old, 1);
            l.events.raise(CollectionEvent::Inserted {
                index: at,
                item: &l.items[at],
            });
            l.events.added(&l.items[at], 1);
            l.events.changed();
        }
        Ok(old)
    }

    /// The stored item equal to `item` when it is in this window; otherwise
    /// appends `item` and returns `None`. Fails with `DuplicateNotAllowed`
    /// when an equal item sits outside the window.
    pub fn find_or_add(&mut self, item: T) -> Result<Option<&T>, CollectionError> {
        if let Some(i) = self.index_of(&item) {
            return Ok(Some(&self.list.items[self.w.offset + i]));
        }
        self.insert(self.w.size, item)?;
        Ok(None)
    }

    /// Swap in `item` for the equal item in this window, returning the old
    /// one. `None` when there is none.
    pub fn update(&mut self, item: T) -> Option<T> {
        let at = self.w.offset + self.index_of(&item)?;
        let l = &mut *self.list;
        let old = core::mem::replace(&mut l.items[at], item);
        l.index.replace(&l.items[at]);
        l.touch();
        if l.events.is_active() {
            l.events.removed(&old, 1);
            l.events.added(&l.items[at], 1);
            l.events.changed();
        }
        Some(old)
    }

    pub fn update_or_add(&mut self, item: T) -> Result<Option<T>, CollectionError> {
        if self.contains(&item) {
            return Ok(self.update(item));
        }
        self.insert(self.w.size, item)?;
        Ok(None)
    }

    pub fn remove_at(&mut self, i: usize) -> Result<T, CollectionError> {
        if i >= self.w.size {
            return Err(CollectionError::IndexOutOfRange {
                index: i,
                len: self.w.size,
            });
        }
        let at = self.w.offset + i;
        let l = &mut *self.list;
        let item = l.items.remove(at);
        l.index.remove(&item);
        l.index.reindex(&l.items, at..l.items.len());
        l.views.on_remove_at(self.w.key, at);
        let size = self.w.size - 1;
        l.resize_window(&mut self.w, size);
        l.touch();
        if l.events.is_active() {
            l.events.raise(CollectionEvent::RemovedAt {
                index: at,
                item: &item,
            });
            l.events.removed(&item, 1);
            l.events.changed();
        }
        Ok(item)
    }

    pub fn remove_first(&mut self) -> Result<T, CollectionError> {
        if self.w.size == 0 {
            return Err(CollectionError::NoSuchItem);
        }
        self.remove_at(0)
    }

    pub fn remove_last(&mut self) -> Result<T, CollectionError> {
        if self.w.size == 0 {
            return Err(CollectionError::NoSuchItem);
        }
        self.remove_at(self.w.size - 1)
    }

    /// Remove `q` if it is in this window.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.index_of(q)?;
        self.remove_at(i).ok()
    }

    /// Remove `count` items starting at window position `start`. Other views
    /// inside or straddling the removed range are disposed.
    pub fn remove_interval(&mut self, start: usize, count: usize) -> Result<(), CollectionError> {
        check_range(start, count, self.w.size)?;
        self.cut(start, count);
        Ok(())
    }

    fn cut(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let at = self.w.offset + start;
        let l = &mut *self.list;
        let removed: Vec<T> = l.items.drain(at..at + count).collect();
        for x in &removed {
            l.index.remove(x);
        }
        l.index.reindex(&l.items, at..l.items.len());
        let disposed = l.views.on_remove_interval(self.w.key, ViewState::new(at, count));
        let size = self.w.size - count;
        l.resize_window(&mut self.w, size);
        l.touch();
        if disposed > 0 {
            debug!(disposed, start = at, count, "views disposed by interval removal");
        }
        if l.events.is_active() {
            l.events.raise(CollectionEvent::Cleared {
                full: false,
                start: at,
                count,
            });
            l.events.changed();
        }
    }

    /// Remove each listed item that lies in this window. Other views shrink
    /// or shift; none are disposed.
    pub fn remove_all<'b, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'b T>,
        T: 'b,
    {
        let range = self.w.range();
        let mut positions: Vec<usize> = items
            .into_iter()
            .filter_map(|q| self.list.index.slot_of(q))
            .filter(|p| range.contains(p))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        self.remove_positions(positions)
    }

    /// Keep only the items of this window that are listed.
    pub fn retain_all<'b, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'b T>,
        T: 'b,
    {
        let mut keep: HashEngine<&T> = HashEngine::new();
        for x in items {
            let _ = keep.insert(x);
        }
        let positions: Vec<usize> = self
            .w
            .range()
            .filter(|&p| !keep.contains(&self.list.items[p]))
            .collect();
        self.remove_positions(positions)
    }

    /// `positions` are sorted, distinct and absolute.
    fn remove_positions(&mut self, positions: Vec<usize>) -> usize {
        let count = positions.len();
        let Some(&first) = positions.first() else {
            return 0;
        };
        let l = &mut *self.list;
        let old = core::mem::take(&mut l.items);
        l.items.reserve(old.len() - count);
        let mut removed = Vec::with_capacity(count);
        let mut next = positions.iter().copied().peekable();
        for (i, x) in old.into_iter().enumerate() {
            if next.peek() == Some(&i) {
                next.next();
                removed.push(x);
            } else {
                l.items.push(x);
            }
        }
        for x in &removed {
            l.index.remove(x);
        }
        l.index.reindex(&l.items, first..l.items.len());
        l.views.on_remove_positions(self.w.key, &positions);
        let size = self.w.size - count;
        l.resize_window(&mut self.w, size);
        l.touch();
        trace!(count, "bulk removal");
        if l.events.is_active() {
            for x in &removed {
                l.events.removed(x, 1);
            }
            l.events.changed();
        }
        count
    }

    /// On the root: empty the list and dispose every view. On a view: remove
    /// the view's items, as `remove_interval(0, len)`.
    pub fn clear(&mut self) {
        if self.w.key.is_some() {
            self.cut(0, self.w.size);
            return;
        }
        let l = &mut *self.list;
        let count = l.items.len();
        l.items.clear();
        l.index.clear();
        let disposed = l.views.dispose_all();
        self.w.size = 0;
        l.touch();
        if disposed > 0 {
            debug!(disposed, "views disposed by clear");
        }
        if l.events.is_active() {
            l.events.raise(CollectionEvent::Cleared {
                full: true,
                start: 0,
                count,
            });
            l.events.changed();
        }
    }

    /// Reverse this window. Views it covers are mirrored so they still
    /// denote the same items.
    pub fn reverse(&mut self) {
        if self.w.size < 2 {
            return;
        }
        self.list.items[self.w.range()].reverse();
        self.reordered(true);
    }

    pub fn sort_by<F>(&mut self, cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if self.w.size < 2 {
            return;
        }
        self.list.items[self.w.range()].sort_by(cmp);
        self.reordered(false);
    }

    /// Shuffle with a freshly seeded generator.
    pub fn shuffle(&mut self) {
        let mut rng = fresh_rng();
        self.shuffle_with(&mut rng);
    }

    /// Fisher-Yates shuffle driven by `rng`.
    pub fn shuffle_with<R>(&mut self, rng: &mut R)
    where
        R: RngCore + ?Sized,
    {
        if self.w.size < 2 {
            return;
        }
        let slice = &mut self.list.items[self.w.range()];
        for i in (1..slice.len()).rev() {
            let j = uniform_below(rng, i as u64 + 1) as usize;
            slice.swap(i, j);
        }
        self.reordered(false);
    }

    fn reordered(&mut self, mirror: bool) {
        let l = &mut *self.list;
        l.index.reindex(&l.items, self.w.range());
        let disposed = l.views.on_reorder(self.w.key, self.w.state(), mirror);
        l.touch();
        if disposed > 0 {
            debug!(disposed, mirror, "views disposed by reorder");
        }
        if l.events.is_active() {
            l.events.changed();
        }
    }

    /// Register a view of `count` items at window position `start`.
    pub fn take_view(&mut self, start: usize, count: usize) -> Result<ViewHandle, CollectionError> {
        check_range(start, count, self.w.size)?;
        let offset = self.w.offset + start;
        let key = self.list.views.register(ViewState::new(offset, count));
        trace!(offset, count, "view taken");
        Ok(self.list.handle(key))
    }

    /// A one-item view on `q`, if it is in this window.
    pub fn view_of<Q>(&mut self, q: &Q) -> Option<ViewHandle>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.index_of(q)?;
        self.take_view(i, 1).ok()
    }

    pub fn last_view_of<Q>(&mut self, q: &Q) -> Option<ViewHandle>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.view_of(q)
    }

    /// Move this view by `offset` and resize it to `size`. `Ok(false)` when
    /// the result would not fit the list; `NotAView` on the root.
    pub fn try_slide(&mut self, offset: isize, size: usize) -> Result<bool, CollectionError> {
        let key = self.w.key.ok_or(CollectionError::NotAView)?;
        let Some(start) = self.w.offset.checked_add_signed(offset) else {
            return Ok(false);
        };
        if start.checked_add(size).map_or(true, |end| end > self.list.items.len()) {
            return Ok(false);
        }
        if let Some(v) = self.list.views.get_mut(key) {
            *v = ViewState::new(start, size);
        }
        self.w.offset = start;
        self.w.size = size;
        Ok(true)
    }

    pub fn slide_with(&mut self, offset: isize, size: usize) -> Result<(), CollectionError> {
        if self.try_slide(offset, size)? {
            Ok(())
        } else {
            Err(CollectionError::ArgumentOutOfRange("offset"))
        }
    }

    pub fn slide(&mut self, offset: isize) -> Result<(), CollectionError> {
        self.slide_with(offset, self.w.size)
    }

    /// A new view from the start of this window to the end of `other`.
    /// `None` when `other` ends before this window starts.
    pub fn span(&mut self, other: ViewHandle) -> Result<Option<ViewHandle>, CollectionError> {
        let other = self.list.resolve(other)?;
        if other.end() < self.w.offset {
            return Ok(None);
        }
        let state = ViewState::new(self.w.offset, other.end() - self.w.offset);
        let key = self.list.views.register(state);
        Ok(Some(self.list.handle(key)))
    }

    /// Dispose this view. On the root this disposes the whole list.
    pub fn dispose(self) {
        match self.w.key {
            Some(key) => {
                self.list.views.dispose(key);
            }
            None => self.list.dispose(),
        }
    }
}

impl<'a, T, S> ViewMut<'a, T, S>
where
    T: Eq + Hash + Clone + Ord,
    S: BuildHasher,
{
    pub fn sort(&mut self) {
        self.sort_by(T::cmp);
    }
}

impl<T, S> CollectionValue<T> for HashedArrayList<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    fn len(&self) -> usize {
        self.items.len()
    }

    fn contains_speed(&self) -> Speed {
        Speed::Constant
    }

    fn contains_item(&self, item: &T) -> bool {
        self.index.contains(item)
    }

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.items.iter())
    }
}

/// Sequenced equality: same items in the same order.
impl<T: PartialEq, S> PartialEq for HashedArrayList<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Eq, S> Eq for HashedArrayList<T, S> {}

impl<T> FromIterator<T> for HashedArrayList<T>
where
    T: Eq + Hash + Clone,
{
    /// Duplicates after the first occurrence are skipped.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = HashedArrayList::new();
        list.add_all(iter);
        list
    }
}

impl<T, S> Extend<T> for HashedArrayList<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

impl<'a, T, S> IntoIterator for &'a HashedArrayList<T, S> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

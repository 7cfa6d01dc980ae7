//! HashDictionary: key/value pairs over the chained [`HashEngine`].

use crate::compound::{ByKey, Pair};
use crate::error::{CollectionError, InvariantViolation};
use crate::hash_engine::{Cursor, DefaultBuildHasher, EngineConfig, HashEngine, Iter, Lookup};
use crate::infra::{CollectionEvent, EventHooks};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

/// Map from unique keys to values. Adding an existing key fails; use
/// [`HashDictionary::set`] to upsert.
///
/// Listeners see whole pairs. Overwriting a value reports the old pair as
/// removed and the new pair as added.
pub struct HashDictionary<K, V, S = DefaultBuildHasher> {
    table: HashEngine<Pair<K, V>, ByKey, S>,
    events: EventHooks<Pair<K, V>>,
}

impl<K: Clone, V: Clone, S: Clone> Clone for HashDictionary<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            events: EventHooks::default(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for HashDictionary<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.iter().map(|p| (&p.key, &p.value)))
            .finish()
    }
}

impl<K, V> HashDictionary<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for HashDictionary<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashDictionary<K, V, S> {
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stamp(&self) -> u64 {
        self.table.stamp()
    }

    pub fn events(&mut self) -> &mut EventHooks<Pair<K, V>> {
        &mut self.events
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &V)> + '_ {
        self.table.iter().map(|p| (&p.key, &p.value))
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.table.iter().map(|p| &p.key)
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.table.iter().map(|p| &p.value)
    }

    /// Stamp-checked cursor over the stored pairs.
    pub fn cursor(&self) -> Cursor {
        self.table.cursor()
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

    pub(crate) fn pairs(&self) -> Iter<'_, Pair<K, V>> {
        self.table.iter()
    }
}

impl<K, V, S> HashDictionary<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: HashEngine::with_hasher(hasher),
            events: EventHooks::default(),
        }
    }

    pub fn with_config(config: EngineConfig, hasher: S) -> Result<Self, CollectionError> {
        Ok(Self {
            table: HashEngine::with_config(config, hasher)?,
            events: EventHooks::default(),
        })
    }

    pub fn cursor_next<'a>(
        &'a self,
        cursor: &mut Cursor,
    ) -> Result<Option<(&'a K, &'a V)>, CollectionError> {
        Ok(cursor.next(&self.table)?.map(|p| (&p.key, &p.value)))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(key).map(|p| &p.value)
    }

    /// In-place value access. Does not advance the stamp.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_mut(key).map(|p| &mut p.value)
    }

    /// Indexer read: fails with `NoSuchItem` when `key` is absent.
    pub fn item<Q>(&self, key: &Q) -> Result<&V, CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).ok_or(CollectionError::NoSuchItem)
    }

    /// The stored key and its value.
    pub fn find<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(key).map(|p| (&p.key, &p.value))
    }

    /// Insert a new pair. Fails with `DuplicateNotAllowed` when the key is
    /// already present; the stored value is left untouched.
    pub fn add(&mut self, key: K, value: V) -> Result<(), CollectionError> {
        let stored = self
            .table
            .insert(Pair::new(key, value))
            .map_err(|_| CollectionError::DuplicateNotAllowed)?;
        if self.events.is_active() {
            self.events.added(stored, 1);
            self.events.changed();
        }
        Ok(())
    }

    /// Indexer write: insert or overwrite.
    pub fn set(&mut self, key: K, value: V) {
        self.update_or_add(key, value);
    }

    /// Replace the value of an existing key. Returns the old value, or
    /// `None` (and changes nothing) when the key is absent.
    pub fn update(&mut self, key: K, value: V) -> Option<V> {
        let old = self.table.update(Pair::new(key, value))?;
        if self.events.is_active() {
            self.events.removed(&old, 1);
            if let Some(new) = self.table.find(&old.key) {
                self.events.added(new, 1);
            }
            self.events.changed();
        }
        Some(old.value)
    }

    pub fn update_or_add(&mut self, key: K, value: V) -> Option<V> {
        match self.table.insert(Pair::new(key, value)) {
            Ok(stored) => {
                if self.events.is_active() {
                    self.events.added(stored, 1);
                    self.events.changed();
                }
                None
            }
            Err(pair) => self.update(pair.key, pair.value),
        }
    }

    /// The existing value for `key`, or `None` after inserting `value`.
    pub fn find_or_add(&mut self, key: K, value: V) -> Option<&V> {
        match self.table.insert_or_find(Pair::new(key, value)) {
            Lookup::Found(p) => Some(&p.value),
            Lookup::Inserted(stored) => {
                if self.events.is_active() {
                    self.events.added(stored, 1);
                    self.events.changed();
                }
                None
            }
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.take(key).map(|p| p.value)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.take(key).map(|p| (p.key, p.value))
    }

    fn take<Q>(&mut self, key: &Q) -> Option<Pair<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let old = self.table.remove(key)?;
        if self.events.is_active() {
            self.events.removed(&old, 1);
            self.events.changed();
        }
        Some(old)
    }

    pub fn check(&self) -> Result<(), InvariantViolation> {
        self.table.check()
    }
}

impl<K, V, S> PartialEq for HashDictionary<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && other
                .pairs()
                .all(|p| self.get(&p.key).is_some_and(|v| *v == p.value))
    }
}

impl<K, V> FromIterator<(K, V)> for HashDictionary<K, V>
where
    K: Eq + Hash,
{
    /// Later pairs overwrite earlier ones with the same key.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut d = HashDictionary::new();
        for (k, v) in iter {
            d.set(k, v);
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: adding an existing key fails and keeps the first value.
    #[test]
    fn add_rejects_existing_key() {
        let mut d: HashDictionary<&'static str, &'static str> = HashDictionary::new();
        d.add("A", "B").unwrap();
        assert_eq!(d.add("A", "B"), Err(CollectionError::DuplicateNotAllowed));
        assert_eq!(d.add("A", "C"), Err(CollectionError::DuplicateNotAllowed));
        assert_eq!(d.item("A"), Ok(&"B"));
        assert_eq!(d.len(), 1);
        d.check().unwrap();
    }

    #[test]
    fn indexer_read_of_absent_key_fails() {
        let d: HashDictionary<String, i32> = HashDictionary::new();
        assert_eq!(d.item("nope"), Err(CollectionError::NoSuchItem));
        assert_eq!(d.get("nope"), None);
    }

    #[test]
    fn set_upserts() {
        let mut d: HashDictionary<String, i32> = HashDictionary::new();
        d.set("x".to_string(), 1);
        d.set("x".to_string(), 2);
        assert_eq!(d.get("x"), Some(&2));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn update_only_touches_existing_keys() {
        let mut d: HashDictionary<u32, &'static str> = HashDictionary::new();
        assert_eq!(d.update(1, "a"), None);
        assert!(d.is_empty());
        d.add(1, "a").unwrap();
        let before = d.stamp();
        assert_eq!(d.update(1, "b"), Some("a"));
        assert!(d.stamp() > before);
        assert_eq!(d.update_or_add(2, "c"), None);
        assert_eq!(d.update_or_add(2, "d"), Some("c"));
        assert_eq!(d.get(&2), Some(&"d"));
    }

    #[test]
    fn find_or_add_returns_existing_value() {
        let mut d: HashDictionary<u32, u32> = HashDictionary::new();
        assert_eq!(d.find_or_add(7, 70), None);
        assert_eq!(d.find_or_add(7, 71), Some(&70));
        assert_eq!(d.find(&7), Some((&7, &70)));
    }

    #[test]
    fn remove_variants() {
        let mut d: HashDictionary<u32, u32> = (0..10).map(|i| (i, i * i)).collect();
        assert_eq!(d.remove(&3), Some(9));
        assert_eq!(d.remove(&3), None);
        assert_eq!(d.remove_entry(&4), Some((4, 16)));
        assert_eq!(d.len(), 8);
        let mut keys: Vec<_> = d.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![0, 1, 2, 5, 6, 7, 8, 9]);
        assert_eq!(d.values().sum::<u32>(), 285 - 9 - 16);
        d.check().unwrap();
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut d: HashDictionary<u32, Vec<u32>> = HashDictionary::new();
        d.add(1, vec![]).unwrap();
        d.get_mut(&1).unwrap().push(5);
        assert_eq!(d.get(&1), Some(&vec![5]));
    }

    #[test]
    fn cursor_fails_after_add() {
        let mut d: HashDictionary<u32, u32> = (0..3).map(|i| (i, i)).collect();
        let mut c = d.cursor();
        assert!(d.cursor_next(&mut c).unwrap().is_some());
        d.add(10, 10).unwrap();
        assert_eq!(d.cursor_next(&mut c), Err(CollectionError::CollectionModified));
    }

    /// Invariant: every mutation reports its pairs, then one `Changed`; a
    /// rejected add or a miss reports nothing.
    #[test]
    fn events_follow_mutations() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let log: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = Rc::clone(&log);
        let mut d: HashDictionary<u32, char> = HashDictionary::new();
        d.events().subscribe(move |e| {
            let line = match e {
                CollectionEvent::Added { item, .. } => format!("+{}{}", item.key, item.value),
                CollectionEvent::Removed { item, .. } => format!("-{}{}", item.key, item.value),
                CollectionEvent::Cleared { count, .. } => format!("clear{count}"),
                CollectionEvent::Changed => "!".to_string(),
                other => format!("{other:?}"),
            };
            sink.borrow_mut().push(line);
        });

        d.add(1, 'a').unwrap();
        assert!(d.add(1, 'z').is_err());
        d.set(1, 'b');
        d.set(2, 'c');
        assert_eq!(d.update(9, 'x'), None);
        assert_eq!(d.find_or_add(2, 'y'), Some(&'c'));
        assert_eq!(d.find_or_add(3, 'd'), None);
        assert_eq!(d.remove(&3), Some('d'));
        assert_eq!(d.remove_entry(&7), None);
        d.clear();
        assert_eq!(
            *RefCell::borrow(&log),
            vec![
                "+1a", "!", "-1a", "+1b", "!", "+2c", "!", "+3d", "!", "-3d", "!", "clear2", "!"
            ]
        );

        let c = d.clone();
        assert!(!c.events.is_active());
    }

    #[test]
    fn equality_ignores_order() {
        let a: HashDictionary<u32, u32> = (0..50).map(|i| (i, i)).collect();
        let b: HashDictionary<u32, u32> = (0..50).rev().map(|i| (i, i)).collect();
        let c: HashDictionary<u32, u32> = (0..50).map(|i| (i, i + 1)).collect();
        assert!(a == b);
        assert!(a != c);
    }
}

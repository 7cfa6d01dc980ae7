#![cfg(test)]

// Property tests kept inside the crate so they can reach crate-private
// helpers and the `check()` audits without feature gates.

use crate::error::CollectionError;
use crate::hash_dictionary::HashDictionary;
use crate::hash_engine::EngineConfig;
use crate::hash_set::HashSet;
use crate::hashed_array_list::{HashedArrayList, ViewHandle};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum DictOp {
    Add(usize, i32),
    Set(usize, i32),
    Update(usize, i32),
    FindOrAdd(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_dict_scenario() -> impl Strategy<Value = (Vec<String>, Vec<DictOp>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| DictOp::Add(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| DictOp::Set(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| DictOp::Update(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| DictOp::FindOrAdd(i, v)),
            idx.clone().prop_map(DictOp::Remove),
            idx.clone().prop_map(DictOp::Get),
            prop_oneof![contains_pool, "[a-z]{0,5}".prop_map(|s| s)].prop_map(DictOp::Contains),
            Just(DictOp::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_dictionary<S: BuildHasher>(
    mut sut: HashDictionary<Key, i32, S>,
    pool: &[String],
    ops: Vec<DictOp>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        match op {
            DictOp::Add(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                match sut.add(k.clone(), v) {
                    Ok(()) => {
                        prop_assert!(!already, "add must fail on duplicate");
                        model.insert(k, v);
                    }
                    Err(e) => {
                        prop_assert!(already, "duplicate error only when key exists");
                        prop_assert_eq!(e, CollectionError::DuplicateNotAllowed);
                    }
                }
            }
            DictOp::Set(i, v) => {
                let k = key_from(pool, i);
                sut.set(k.clone(), v);
                model.insert(k, v);
            }
            DictOp::Update(i, v) => {
                let k = key_from(pool, i);
                let old = sut.update(k.clone(), v);
                let expected = model.get_mut(&k).map(|m| std::mem::replace(m, v));
                prop_assert_eq!(old, expected);
            }
            DictOp::FindOrAdd(i, v) => {
                let k = key_from(pool, i);
                let found = sut.find_or_add(k.clone(), v).copied();
                match model.get(&k) {
                    Some(&m) => prop_assert_eq!(found, Some(m)),
                    None => {
                        prop_assert_eq!(found, None);
                        model.insert(k, v);
                    }
                }
            }
            DictOp::Remove(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
            }
            DictOp::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                match model.get(&k) {
                    Some(m) => prop_assert_eq!(sut.item(&k), Ok(m)),
                    None => prop_assert_eq!(sut.item(&k), Err(CollectionError::NoSuchItem)),
                }
            }
            DictOp::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            DictOp::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert!(sut.check().is_ok());
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Duplicate keys are rejected by `add`; `set` upserts.
// - `update` only touches existing keys and returns the replaced value.
// - `get`/`item`/`contains_key` parity; key sets agree on iteration.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_dictionary_state_machine((pool, ops) in arb_dict_scenario()) {
        run_dictionary(HashDictionary::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress chain walking.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same invariants as above when every key lands in one chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_dictionary_state_machine_with_collisions((pool, ops) in arb_dict_scenario()) {
        run_dictionary(HashDictionary::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}

// Property: round trip across forced growth. A tiny table with a low fill
// factor grows many times; every still-present item is found and every
// removed item is not.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_set_round_trip_across_growth(
        ops in proptest::collection::vec((any::<bool>(), 0u16..200), 1..300)
    ) {
        let config = EngineConfig::new().capacity(1).fill_factor(0.25);
        let mut sut: HashSet<u16> = HashSet::with_config(config, Default::default()).unwrap();
        let mut model: BTreeSet<u16> = BTreeSet::new();
        for (add, x) in ops {
            if add {
                prop_assert_eq!(sut.add(x), model.insert(x));
            } else {
                prop_assert_eq!(sut.remove(&x), model.remove(&x));
            }
        }
        for x in 0u16..200 {
            prop_assert_eq!(sut.contains(&x), model.contains(&x));
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert!(sut.check().is_ok());
    }
}

#[derive(Clone, Debug)]
enum ListOp {
    Insert(usize, u8),
    RemoveAt(usize),
    RemoveAll(Vec<u8>),
    RemoveInterval(usize, usize),
    Reverse,
    TakeView(usize, usize),
}

fn arb_list_ops() -> impl Strategy<Value = Vec<ListOp>> {
    let op = prop_oneof![
        4 => (any::<usize>(), 0u8..40).prop_map(|(p, x)| ListOp::Insert(p, x)),
        1 => any::<usize>().prop_map(ListOp::RemoveAt),
        1 => proptest::collection::vec(0u8..40, 0..6).prop_map(ListOp::RemoveAll),
        1 => (any::<usize>(), 0usize..4).prop_map(|(s, c)| ListOp::RemoveInterval(s, c)),
        1 => Just(ListOp::Reverse),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| ListOp::TakeView(a, b)),
    ];
    proptest::collection::vec(op, 1..80)
}

// A non-empty view tracked by the items it covers.
struct Tracked {
    handle: ViewHandle,
    items: Vec<u8>,
}

impl Tracked {
    fn offset_in(&self, model: &[u8]) -> usize {
        model
            .iter()
            .position(|x| *x == self.items[0])
            .unwrap_or(usize::MAX)
    }
}

// Property: the list and its views track a plain Vec model.
// - Root content equals the model; the position index agrees (`check`).
// - Every live view keeps covering the same items: inserted items join a
//   view only when inserted strictly inside it, removed items leave it.
// - Interval removal disposes views inside or straddling the interval.
// - Reverse keeps each view on its items, mirrored.
// - Empty views sit between items: they move past removals before them,
//   stay put on an insert at their offset, and mirror on reverse.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_list_views_track_model(ops in arb_list_ops()) {
        let mut sut: HashedArrayList<u8> = HashedArrayList::new();
        let mut model: Vec<u8> = Vec::new();
        let mut views: Vec<Tracked> = Vec::new();
        let mut empties: Vec<(ViewHandle, usize)> = Vec::new();
        let mut disposed: Vec<ViewHandle> = Vec::new();

        for op in ops {
            match op {
                ListOp::Insert(p, x) => {
                    let p = p % (model.len() + 1);
                    let r = sut.insert(p, x);
                    if model.contains(&x) {
                        prop_assert_eq!(r, Err(CollectionError::DuplicateNotAllowed));
                    } else {
                        prop_assert_eq!(r, Ok(()));
                        for v in views.iter_mut() {
                            let o = v.offset_in(&model);
                            if o < p && p < o + v.items.len() {
                                v.items.insert(p - o, x);
                            }
                        }
                        model.insert(p, x);
                        for (_, o) in empties.iter_mut() {
                            if p < *o {
                                *o += 1;
                            }
                        }
                    }
                }
                ListOp::RemoveAt(p) => {
                    if model.is_empty() {
                        prop_assert!(sut.remove_at(p).is_err());
                    } else {
                        let p = p % model.len();
                        let y = model.remove(p);
                        prop_assert_eq!(sut.remove_at(p), Ok(y));
                        for v in views.iter_mut() {
                            v.items.retain(|i| *i != y);
                        }
                        for (_, o) in empties.iter_mut() {
                            if p < *o {
                                *o -= 1;
                            }
                        }
                    }
                }
                ListOp::RemoveAll(xs) => {
                    let expected = model.iter().filter(|x| xs.contains(x)).count();
                    prop_assert_eq!(sut.remove_all(&xs), expected);
                    let gone: Vec<usize> = (0..model.len()).filter(|&i| xs.contains(&model[i])).collect();
                    for (_, o) in empties.iter_mut() {
                        *o -= gone.iter().filter(|&&i| i < *o).count();
                    }
                    model.retain(|x| !xs.contains(x));
                    for v in views.iter_mut() {
                        v.items.retain(|x| !xs.contains(x));
                    }
                }
                ListOp::RemoveInterval(s, c) => {
                    let s = s % (model.len() + 1);
                    let c = c.min(model.len() - s);
                    prop_assert_eq!(sut.remove_interval(s, c), Ok(()));
                    if c > 0 {
                        let end = s + c;
                        let mut kept = Vec::new();
                        for mut v in views.drain(..) {
                            let o = v.offset_in(&model);
                            let e = o + v.items.len();
                            if e <= s || o >= end {
                                kept.push(v);
                            } else if o <= s && e >= end && !(o == s && e == end) {
                                v.items.retain(|x| !model[s..end].contains(x));
                                kept.push(v);
                            } else {
                                disposed.push(v.handle);
                            }
                        }
                        views = kept;
                        let mut kept = Vec::new();
                        for (h, o) in empties.drain(..) {
                            if o <= s {
                                kept.push((h, o));
                            } else if o >= end {
                                kept.push((h, o - c));
                            } else {
                                disposed.push(h);
                            }
                        }
                        empties = kept;
                        model.drain(s..end);
                    }
                }
                ListOp::Reverse => {
                    sut.reverse();
                    if model.len() > 1 {
                        model.reverse();
                        for v in views.iter_mut() {
                            v.items.reverse();
                        }
                        let n = model.len();
                        for (_, o) in empties.iter_mut() {
                            if 0 < *o && *o < n {
                                *o = n - *o;
                            }
                        }
                    }
                }
                ListOp::TakeView(a, b) => {
                    let a = a % (model.len() + 1);
                    let b = b % (model.len() - a + 1);
                    let handle = sut.take_view(a, b).unwrap();
                    if b > 0 {
                        views.push(Tracked { handle, items: model[a..a + b].to_vec() });
                    } else {
                        empties.push((handle, a));
                    }
                }
            }
            views.retain(|v| !v.items.is_empty());

            prop_assert_eq!(sut.as_slice(), model.as_slice());
            prop_assert!(sut.check().is_ok());
            for v in &views {
                let got = sut.view(v.handle).map(|view| view.to_vec());
                prop_assert_eq!(got, Ok(v.items.clone()));
            }
            for &(h, o) in &empties {
                let got = sut.view(h).map(|view| (view.offset(), view.len()));
                prop_assert_eq!(got, Ok((o, 0)));
            }
            for &h in &disposed {
                prop_assert!(!sut.is_valid_view(h));
            }
        }
    }
}

//! HashEngine: chained hash table with per-instance randomized slot mixing.
//!
//! Entries are stored in singly linked buckets hanging off a power-of-two
//! slot vector. The slot of an entry is the top `bits` bits of
//! `hash * multiplier`, where `multiplier` is an odd number drawn once per
//! table. A caller who can pick hash codes but not the multiplier cannot
//! steer entries into one chain, which keeps lookups cheap under
//! adversarial keys.
//!
//! The engine only ever grows. Deleting entries never shrinks the slot
//! vector.
//!
//! Equality and hashing are projected through a [`Projection`], so the same
//! engine stores plain items (sets), `(item, count)` pairs (bags) and
//! `(key, value)` pairs (dictionaries) while comparing only the key part.

use crate::config::{
    DEFAULT_BITS, DEFAULT_FILL_FACTOR, FIXED_MULTIPLIER, MAX_BITS, MAX_FILL_FACTOR,
    MAX_INITIAL_BITS, MIN_FILL_FACTOR,
};
use crate::error::{ensure_invariant, CollectionError, InvariantViolation};
use core::borrow::Borrow;
use core::hash::{BuildHasher, BuildHasherDefault, Hash};
use core::iter::FusedIterator;
use core::marker::PhantomData;
use rand_core::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::hash_map::{DefaultHasher, RandomState};
use tracing::trace;

/// Hasher used when none is given. Deterministic, so that two collections
/// agree on item hash codes; flooding resistance comes from the per-table
/// multiplier instead.
pub type DefaultBuildHasher = BuildHasherDefault<DefaultHasher>;

/// Extracts the part of a stored entry that equality and hashing look at.
pub trait Projection<E> {
    type Key: ?Sized + Hash + Eq;
    fn key(entry: &E) -> &Self::Key;
}

/// Projection that compares whole entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whole;

impl<T: Hash + Eq> Projection<T> for Whole {
    type Key = T;
    #[inline]
    fn key(entry: &T) -> &T {
        entry
    }
}

type Link<E> = Option<Box<Bucket<E>>>;

#[derive(Debug, Clone)]
struct Bucket<E> {
    entry: E,
    hash: u64,
    next: Link<E>,
}

/// Construction parameters for a [`HashEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    capacity: usize,
    fill_factor: f64,
    multiplier: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            fill_factor: DEFAULT_FILL_FACTOR,
            multiplier: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries the table should hold before its first growth.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Occupancy ratio that triggers doubling. Must lie in `[0.1, 0.9]`.
    pub fn fill_factor(mut self, fill_factor: f64) -> Self {
        self.fill_factor = fill_factor;
        self
    }

    /// Pin the slot multiplier instead of drawing a random one. Must be odd.
    pub fn multiplier(mut self, multiplier: u64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    fn validate(&self) -> Result<(), CollectionError> {
        if !(MIN_FILL_FACTOR..=MAX_FILL_FACTOR).contains(&self.fill_factor) {
            return Err(CollectionError::ArgumentOutOfRange(
                "fill factor must lie in [0.1, 0.9]",
            ));
        }
        if matches!(self.multiplier, Some(m) if m % 2 == 0) {
            return Err(CollectionError::ArgumentOutOfRange(
                "hash multiplier must be odd",
            ));
        }
        Ok(())
    }

    /// Smallest table width holding `capacity` entries under the fill factor.
    fn initial_bits(&self) -> Result<u32, CollectionError> {
        let wanted = (self.capacity as f64 / self.fill_factor).ceil();
        let mut bits = DEFAULT_BITS;
        while ((1u64 << bits) as f64) < wanted {
            if bits == MAX_INITIAL_BITS {
                return Err(CollectionError::ArgumentOutOfRange(
                    "capacity exceeds the largest initial table",
                ));
            }
            bits += 1;
        }
        Ok(bits)
    }
}

/// Draw a fresh odd multiplier for one table.
fn random_multiplier() -> u64 {
    if cfg!(feature = "fixed-multiplier") {
        return FIXED_MULTIPLIER;
    }
    fresh_rng().next_u64() | 1
}

/// Generator seeded from the process's per-instance hashing entropy.
pub(crate) fn fresh_rng() -> Xoshiro256PlusPlus {
    let seed = RandomState::new().hash_one(0x5eed_u64);
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

/// Uniform draw from `0..bound`. Rejects the top `2^64 mod bound` values so
/// that every result is equally likely.
pub(crate) fn uniform_below<R: RngCore + ?Sized>(rng: &mut R, bound: u64) -> u64 {
    debug_assert!(bound > 0);
    let zone = u64::MAX - (u64::MAX - bound + 1) % bound;
    loop {
        let r = rng.next_u64();
        if r <= zone {
            return r % bound;
        }
    }
}

/// Chained hash table storing entries of type `E`, keyed by `X::key(entry)`.
pub struct HashEngine<E, X = Whole, S = DefaultBuildHasher> {
    hasher: S,
    slots: Vec<Link<E>>,
    bits: u32,
    threshold: usize,
    fill_factor: f64,
    multiplier: u64,
    len: usize,
    stamp: u64,
    _projection: PhantomData<fn() -> X>,
}

impl<E: Clone, X, S: Clone> Clone for HashEngine<E, X, S> {
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            slots: self.slots.clone(),
            bits: self.bits,
            threshold: self.threshold,
            fill_factor: self.fill_factor,
            multiplier: self.multiplier,
            len: self.len,
            stamp: self.stamp,
            _projection: PhantomData,
        }
    }
}

impl<E, X, S> core::fmt::Debug for HashEngine<E, X, S>
where
    E: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Outcome of [`HashEngine::insert_or_find`].
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a, E> {
    Inserted(&'a E),
    Found(&'a E),
}

impl<E, X> HashEngine<E, X>
where
    X: Projection<E>,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<E, X> Default for HashEngine<E, X>
where
    X: Projection<E>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, X, S> HashEngine<E, X, S> {
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots in the table; always a power of two.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    /// Modification counter, bumped on every structural change.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Record a change made through `find_mut` that callers must observe as
    /// structural (bag multiplicities, dictionary values).
    pub(crate) fn touch(&mut self) {
        self.stamp = self.stamp.wrapping_add(1);
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    fn bucket_at(&self, slot: usize, depth: usize) -> Option<&Bucket<E>> {
        let mut cur = self.slots[slot].as_deref();
        for _ in 0..depth {
            cur = cur?.next.as_deref();
        }
        cur
    }

    /// Any entry; `None` on an empty table.
    pub fn choose(&self) -> Option<&E> {
        self.iter().next()
    }

    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            slots: self.slots.iter(),
            chain: None,
            remaining: self.len,
        }
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, E> {
        IterMut {
            slots: self.slots.iter_mut(),
            chain: None,
            remaining: self.len,
        }
    }

    /// Detached cursor; see [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        Cursor {
            stamp: self.stamp,
            slot: 0,
            depth: 0,
        }
    }

    /// Length of the longest collision chain.
    pub fn longest_chain(&self) -> usize {
        self.slots.iter().map(chain_len).max().unwrap_or(0)
    }

    /// Remove every entry for which `pred` returns true, keeping chain order
    /// of the survivors. Returns the removed entries in table order.
    pub(crate) fn remove_where<F>(&mut self, mut pred: F) -> Vec<E>
    where
        F: FnMut(&mut E) -> bool,
    {
        let mut removed = Vec::new();
        for slot in self.slots.iter_mut() {
            let mut rest = slot.take();
            let mut tail = slot;
            while let Some(mut b) = rest {
                rest = b.next.take();
                if pred(&mut b.entry) {
                    removed.push(b.entry);
                } else {
                    tail = &mut tail.insert(b).next;
                }
            }
        }
        if !removed.is_empty() {
            self.len -= removed.len();
            self.touch();
        }
        removed
    }

    /// Drop every entry. The slot vector keeps its current width.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            // Unlink iteratively so long chains cannot overflow the stack.
            let mut rest = slot.take();
            while let Some(mut b) = rest {
                rest = b.next.take();
            }
        }
        self.len = 0;
        self.touch();
    }
}

impl<E, X, S> HashEngine<E, X, S>
where
    X: Projection<E>,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(EngineConfig::default(), DEFAULT_BITS, hasher)
    }

    /// Build a table from explicit parameters; fails on an out-of-range fill
    /// factor, an even multiplier, or a capacity beyond the largest initial
    /// table.
    pub fn with_config(config: EngineConfig, hasher: S) -> Result<Self, CollectionError> {
        config.validate()?;
        let bits = config.initial_bits()?;
        Ok(Self::build(config, bits, hasher))
    }

    fn build(config: EngineConfig, bits: u32, hasher: S) -> Self {
        let multiplier = config.multiplier.unwrap_or_else(random_multiplier);
        Self {
            hasher,
            slots: empty_slots(bits),
            bits,
            threshold: threshold_for(bits, config.fill_factor),
            fill_factor: config.fill_factor,
            multiplier,
            len: 0,
            stamp: 0,
            _projection: PhantomData,
        }
    }

    #[inline]
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    #[inline]
    fn slot_of(&self, hash: u64) -> usize {
        (hash.wrapping_mul(self.multiplier) >> (64 - self.bits)) as usize
    }

    /// Position `(slot, depth)` of the entry matching `q`, or the chain
    /// length of its slot as the error when absent.
    fn locate<Q>(&self, hash: u64, q: &Q) -> (usize, Result<usize, usize>)
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let slot = self.slot_of(hash);
        let mut depth = 0;
        let mut cur = self.slots[slot].as_deref();
        while let Some(b) = cur {
            if b.hash == hash && X::key(&b.entry).borrow() == q {
                return (slot, Ok(depth));
            }
            depth += 1;
            cur = b.next.as_deref();
        }
        (slot, Err(depth))
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    /// Stored representative equal to `q`; not necessarily identical to it.
    pub fn find<Q>(&self, q: &Q) -> Option<&E>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let (slot, found) = self.locate(hash, q);
        let depth = found.ok()?;
        self.bucket_at(slot, depth).map(|b| &b.entry)
    }

    /// Mutable access to a stored entry. Callers must not change the
    /// projected key.
    pub(crate) fn find_mut<Q>(&mut self, q: &Q) -> Option<&mut E>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let (slot, found) = self.locate(hash, q);
        let depth = found.ok()?;
        link_at(&mut self.slots[slot], depth)
            .as_deref_mut()
            .map(|b| &mut b.entry)
    }

    /// Insert `entry` unless an equal one exists, in which case the entry is
    /// handed back unchanged. On success returns the stored entry.
    pub fn insert(&mut self, entry: E) -> Result<&E, E> {
        let hash = self.make_hash(X::key(&entry));
        let (slot, found) = self.locate(hash, X::key(&entry));
        match found {
            Ok(_) => Err(entry),
            Err(chain_len) => Ok(self.link_new(slot, chain_len, hash, entry)),
        }
    }

    /// Insert `entry`, or report the stored equal entry (dropping `entry`).
    pub fn insert_or_find(&mut self, entry: E) -> Lookup<'_, E> {
        let hash = self.make_hash(X::key(&entry));
        let (mut slot, found) = self.locate(hash, X::key(&entry));
        let mut depth = match found {
            Ok(depth) | Err(depth) => depth,
        };
        if found.is_err() && self.len >= self.threshold {
            // Grow before linking so the new bucket lands in its final chain.
            self.grow();
            slot = self.slot_of(hash);
            depth = chain_len(&self.slots[slot]);
        }
        // The matching link, or the empty tail of the chain.
        let link = link_at(&mut self.slots[slot], depth);
        match link {
            Some(b) => Lookup::Found(&b.entry),
            None => {
                self.len += 1;
                self.stamp = self.stamp.wrapping_add(1);
                let b = link.insert(Box::new(Bucket {
                    entry,
                    hash,
                    next: None,
                }));
                Lookup::Inserted(&b.entry)
            }
        }
    }

    /// Insert `entry` knowing no equal entry is present.
    pub(crate) fn insert_unique(&mut self, entry: E) -> &E {
        let hash = self.make_hash(X::key(&entry));
        let slot = self.slot_of(hash);
        let chain_len = chain_len(&self.slots[slot]);
        self.link_new(slot, chain_len, hash, entry)
    }

    /// Append a bucket to the chain of `slot` and grow if needed. The new
    /// entry stays the tail of its chain across growth, since doubling only
    /// splits chains and keeps relative order.
    fn link_new(&mut self, slot: usize, chain_len: usize, hash: u64, entry: E) -> &E {
        let tail = link_at(&mut self.slots[slot], chain_len);
        debug_assert!(tail.is_none());
        *tail = Some(Box::new(Bucket {
            entry,
            hash,
            next: None,
        }));
        self.len += 1;
        self.touch();
        if self.len > self.threshold {
            self.grow();
        }
        let slot = self.slot_of(hash);
        let mut cur = self.slots[slot].as_deref();
        let mut last = None;
        while let Some(b) = cur {
            last = Some(&b.entry);
            cur = b.next.as_deref();
        }
        last.expect("entry must exist immediately after successful insert")
    }

    /// Replace the stored entry equal to `entry`; returns the old one, or
    /// `None` (leaving the table untouched) when absent.
    pub fn update(&mut self, entry: E) -> Option<E> {
        let stored = self.find_mut(X::key(&entry))?;
        let old = core::mem::replace(stored, entry);
        self.touch();
        Some(old)
    }

    /// Unlink and return the entry equal to `q`.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<E>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let (slot, found) = self.locate(hash, q);
        let depth = found.ok()?;
        let link = link_at(&mut self.slots[slot], depth);
        let mut bucket = link.take()?;
        *link = bucket.next.take();
        self.len -= 1;
        self.touch();
        Some(bucket.entry)
    }

    /// Double the slot vector and relink every bucket, preserving relative
    /// chain order.
    pub fn grow(&mut self) {
        if self.bits >= MAX_BITS {
            self.threshold = usize::MAX;
            return;
        }
        let old_slots = core::mem::take(&mut self.slots);
        let mut buckets: Vec<Box<Bucket<E>>> = Vec::with_capacity(self.len);
        for slot in old_slots {
            let mut rest = slot;
            while let Some(mut b) = rest {
                rest = b.next.take();
                buckets.push(b);
            }
        }
        self.bits += 1;
        self.slots = empty_slots(self.bits);
        self.threshold = threshold_for(self.bits, self.fill_factor);
        // Pushing in reverse onto chain heads leaves every chain in forward order.
        while let Some(mut b) = buckets.pop() {
            let slot = self.slot_of(b.hash);
            b.next = self.slots[slot].take();
            self.slots[slot] = Some(b);
        }
        self.touch();
        trace!(
            slots = self.slots.len(),
            len = self.len,
            threshold = self.threshold,
            "hash table grown"
        );
    }

    /// Audit table shape, chain placement and cached hashes.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        ensure_invariant!(
            self.slots.len() == 1usize << self.bits,
            "slot count {} is not 2^{}",
            self.slots.len(),
            self.bits
        );
        ensure_invariant!(self.multiplier % 2 == 1, "multiplier is even");
        ensure_invariant!(
            self.len <= self.threshold,
            "{} entries exceed threshold {}",
            self.len,
            self.threshold
        );
        let mut seen = 0usize;
        for (slot, head) in self.slots.iter().enumerate() {
            let mut cur = head.as_deref();
            while let Some(b) = cur {
                let recomputed = self.make_hash(X::key(&b.entry));
                ensure_invariant!(
                    recomputed == b.hash,
                    "cached hash {:#x} differs from recomputed {:#x} in slot {}",
                    b.hash,
                    recomputed,
                    slot
                );
                ensure_invariant!(
                    self.slot_of(b.hash) == slot,
                    "bucket with hash {:#x} chained in slot {} instead of {}",
                    b.hash,
                    slot,
                    self.slot_of(b.hash)
                );
                seen += 1;
                cur = b.next.as_deref();
            }
        }
        ensure_invariant!(
            seen == self.len,
            "counted {} buckets but len is {}",
            seen,
            self.len
        );
        Ok(())
    }
}

fn empty_slots<E>(bits: u32) -> Vec<Link<E>> {
    core::iter::repeat_with(|| None).take(1usize << bits).collect()
}

fn threshold_for(bits: u32, fill_factor: f64) -> usize {
    ((1usize << bits) as f64 * fill_factor) as usize
}

fn chain_len<E>(head: &Link<E>) -> usize {
    let mut n = 0;
    let mut cur = head.as_deref();
    while let Some(b) = cur {
        n += 1;
        cur = b.next.as_deref();
    }
    n
}

/// The link `depth` steps down the chain starting at `link`.
fn link_at<E>(mut link: &mut Link<E>, depth: usize) -> &mut Link<E> {
    for _ in 0..depth {
        match link {
            Some(b) => link = &mut b.next,
            None => break,
        }
    }
    link
}

/// Iterator over entries in table order.
pub struct Iter<'a, E> {
    slots: core::slice::Iter<'a, Link<E>>,
    chain: Option<&'a Bucket<E>>,
    remaining: usize,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(b) = self.chain {
                self.chain = b.next.as_deref();
                self.remaining -= 1;
                return Some(&b.entry);
            }
            self.chain = self.slots.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, E> ExactSizeIterator for Iter<'a, E> {}
impl<'a, E> FusedIterator for Iter<'a, E> {}

/// Mutable iterator over entries in table order.
pub(crate) struct IterMut<'a, E> {
    slots: core::slice::IterMut<'a, Link<E>>,
    chain: Option<&'a mut Bucket<E>>,
    remaining: usize,
}

impl<'a, E> Iterator for IterMut<'a, E> {
    type Item = &'a mut E;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(b) = self.chain.take() {
                let Bucket { entry, next, .. } = b;
                self.chain = next.as_deref_mut();
                self.remaining -= 1;
                return Some(entry);
            }
            self.chain = self.slots.next()?.as_deref_mut();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Stamp-checked position in a table that does not borrow it.
///
/// Each call to [`Cursor::next`] re-validates the stamp captured at
/// creation; once the table is structurally modified every further call
/// fails with [`CollectionError::CollectionModified`]. Detection only: this
/// is meant for single-threaded misuse such as mutating while walking.
#[derive(Debug, Clone)]
pub struct Cursor {
    stamp: u64,
    slot: usize,
    depth: usize,
}

impl Cursor {
    pub fn next<'a, E, X, S>(
        &mut self,
        engine: &'a HashEngine<E, X, S>,
    ) -> Result<Option<&'a E>, CollectionError>
    where
        X: Projection<E>,
        S: BuildHasher,
    {
        if engine.stamp != self.stamp {
            return Err(CollectionError::CollectionModified);
        }
        while self.slot < engine.slots.len() {
            if let Some(b) = engine.bucket_at(self.slot, self.depth) {
                self.depth += 1;
                return Ok(Some(&b.entry));
            }
            self.slot += 1;
            self.depth = 0;
        }
        Ok(None)
    }
}

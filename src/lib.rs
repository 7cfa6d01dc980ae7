//! chained-collections: hash-based sets, bags and dictionaries on one
//! chained hash engine, plus a duplicate-free array list whose sub-range
//! views stay consistent while the list is mutated through any of them.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the two algorithmic cores (the hash engine and the
//!   view-consistent list) small and independently checkable, and build
//!   every collection as composition on top of them.
//! - Layers:
//!   - HashEngine<E, X, S>: chained hash table. Buckets hang off a
//!     power-of-two slot vector; the slot is the top bits of
//!     `hash * multiplier` with an odd multiplier drawn per table. Grows by
//!     doubling, never shrinks.
//!   - Projections: the engine compares entries through `X::key`, so
//!     `Counted<T>` (bag) and `Pair<K, V>` (dictionary) entries are keyed
//!     on their first field only. `CountedTable` adds multiplicities.
//!   - HashSet, HashBag, HashDictionary: thin adapters adding events,
//!     cached unsequenced hashes and the collection contracts.
//!   - PositionIndex: a second engine mapping item → absolute slot.
//!   - ViewRegistry: slotmap of `(offset, size)` windows and the fixup
//!     rules that keep them correct under insert, removal and reorder.
//!   - HashedArrayList: `Vec<T>` + PositionIndex + ViewRegistry, with
//!     `View`/`ViewMut` accessors addressing the root or one view.
//!
//! Constraints
//! - Single-threaded. Stamps detect mutation during a detached walk; they
//!   do not synchronize anything.
//! - Each bucket stores its `u64` hash; growth and `check()` never call
//!   `Hash` on user items again.
//! - Lookup misses are `Option`/`bool`. `CollectionError` is reserved for
//!   contract violations and is returned at the offending call.
//! - Bulk list inserts validate first and never leave a half-applied tail.
//!
//! Hash flooding
//! - The default `BuildHasher` is deterministic so that collections agree on
//!   item hash codes (unsequenced equality across collections depends on
//!   it). Resistance comes from the per-table random multiplier instead.
//!   The `fixed-multiplier` feature pins the multiplier for reproducible
//!   runs.
//!
//! Views
//! - A view is a key into the owning list's registry; a `ViewHandle` does
//!   not keep anything alive. Disposal removes the key, so any later use of
//!   the handle fails with `ViewDisposed`, and a handle from another list
//!   fails with `IncompatibleView`.
//!
//! Notes and non-goals
//! - No cross-thread sharing, persistence or serialization.
//! - The list rejects duplicate items; it doubles as a positional set.
//! - `check()` audits exist for tests and debugging, not for production
//!   call paths.

pub mod compound;
pub mod config;
pub mod error;
pub mod hash_bag;
pub mod hash_dictionary;
pub mod hash_engine;
pub mod hash_set;
pub mod hashed_array_list;
pub mod infra;
pub mod position_index;
pub mod view_registry;

mod collections_proptest;

// Public surface
pub use compound::{ByItem, ByKey, Counted, CountedTable, Decrement, Pair};
pub use error::{CollectionError, InvariantViolation};
pub use hash_bag::HashBag;
pub use hash_dictionary::HashDictionary;
pub use hash_engine::{Cursor, DefaultBuildHasher, EngineConfig, HashEngine, Lookup, Projection, Whole};
pub use hash_set::HashSet;
pub use hashed_array_list::{HashedArrayList, ListCursor, View, ViewHandle, ViewMut};
pub use infra::{is_disjoint, CollectionEvent, CollectionValue, EventHooks, Speed};

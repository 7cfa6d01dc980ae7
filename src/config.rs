//! Compile-time tunables shared by the hash engine and the array list.

/// Fraction of slots that may be occupied before the table doubles.
pub(crate) const DEFAULT_FILL_FACTOR: f64 = 0.66;

/// Accepted range for a caller supplied fill factor.
pub(crate) const MIN_FILL_FACTOR: f64 = 0.1;
pub(crate) const MAX_FILL_FACTOR: f64 = 0.9;

/// A fresh table starts with `1 << DEFAULT_BITS` slots.
pub(crate) const DEFAULT_BITS: u32 = 4;

/// Upper bound on table width; past this the table stops growing and chains
/// simply get longer.
pub(crate) const MAX_BITS: u32 = 60;

/// Widest table `with_config` will allocate up front. Larger capacities are
/// rejected instead of reserving an unallocatable slot array.
pub(crate) const MAX_INITIAL_BITS: u32 = 32;

/// Multiplier used by every table when the `fixed-multiplier` feature is on.
// Odd, and the 64-bit golden ratio so the top bits stay well mixed.
pub const FIXED_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// Initial backing array capacity of a hashed array list.
pub(crate) const DEFAULT_LIST_CAPACITY: usize = 8;

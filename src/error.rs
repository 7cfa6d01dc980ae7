//! Error taxonomy shared by every collection in the crate.
//!
//! Ordinary negative outcomes (a lookup that misses, removing an absent
//! item) are `Option`/`bool` returns. `CollectionError` is reserved for
//! contract violations raised synchronously at the offending call.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The item (or dictionary key) is already present where uniqueness is required.
    #[error("duplicate item not allowed")]
    DuplicateNotAllowed,
    /// Keyed lookup of an absent key, or removal from an empty collection.
    #[error("no such item")]
    NoSuchItem,
    /// A cursor observed a structural change since it was created.
    #[error("collection was modified")]
    CollectionModified,
    /// The view handle refers to a view that has been disposed.
    #[error("view has been disposed")]
    ViewDisposed,
    /// A view-only operation was attempted on the root list.
    #[error("not a view")]
    NotAView,
    /// The view handles do not belong to the same root list.
    #[error("views do not share an underlying list")]
    IncompatibleView,
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("argument out of range: {0}")]
    ArgumentOutOfRange(&'static str),
    /// Mutation attempted through a collection that reports `is_read_only()`.
    #[error("collection is read-only")]
    ReadOnlyCollection,
}

/// Failure reported by the `check()` self-audits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violated: {0}")]
pub struct InvariantViolation(pub String);

impl InvariantViolation {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        InvariantViolation(msg.into())
    }
}

/// Bail out of a `check()` with a formatted `InvariantViolation`.
macro_rules! ensure_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::InvariantViolation::new(format!($($arg)+)));
        }
    };
}
pub(crate) use ensure_invariant;

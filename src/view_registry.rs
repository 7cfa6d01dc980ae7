//! Non-owning registry of the views over one backing array.
//!
//! Views are plain `(offset, size)` windows stored in a [`SlotMap`]. A
//! caller holds only the generational key, so dropping a handle never leaks
//! state and a disposed key is detectably stale. The registry applies the
//! offset/size fixups every structural change of the backing array needs.
//!
//! ## Fixup rules
//!
//! For a view `[o, o + s)` that is not the one performing the change:
//!
//! - insert of `n` items at `p`: grows by `n` when `o < p < o + s`; shifts
//!   right by `n` when `p < o`, or `p == o` and the view is non-empty.
//! - removal of slot `p`: shrinks when `o <= p < o + s`; shifts left when
//!   `p < o`.
//! - removal of an interval: views that lie inside it (an exact match
//!   included) or straddle one of its ends are disposed; views strictly
//!   containing it shrink; views after it shift left.
//! - removal of a scattered set of slots: a sorted endpoint sweep moves each
//!   endpoint left by the number of removed slots before it. Nothing is
//!   disposed.
//! - reorder of a range: see [`ViewRegistry::on_reorder`].

use slotmap::{new_key_type, SecondaryMap, SlotMap};

new_key_type! {
    /// Generational key of a registered view.
    pub struct ViewKey;
}

/// Absolute window `[offset, offset + size)` over the backing array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub offset: usize,
    pub size: usize,
}

impl ViewState {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Where this view sits relative to `range`. An empty view strictly
    /// inside a non-empty range is contained in it; an empty range strictly
    /// inside a view is contained by the view.
    pub fn relation_to(&self, range: &ViewState) -> Relation {
        let end = self.end();
        let range_end = range.end();
        if range.offset >= end || range_end <= self.offset {
            Relation::NonOverlapping
        } else if range.size == 0 || (self.offset <= range.offset && range_end <= end) {
            Relation::Contains
        } else if range.offset <= self.offset && end <= range_end {
            Relation::ContainedIn
        } else {
            Relation::Overlapping
        }
    }
}

/// Mutual position of a view and a range of the backing array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// No shared slot.
    NonOverlapping,
    /// The view covers the whole range.
    Contains,
    /// The range covers the whole view.
    ContainedIn,
    /// The two share some slots but neither covers the other.
    Overlapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Endpoint {
    // Left endpoints sort before right endpoints at the same position.
    Left,
    Right,
}

#[derive(Debug, Default, Clone)]
pub struct ViewRegistry {
    views: SlotMap<ViewKey, ViewState>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn register(&mut self, state: ViewState) -> ViewKey {
        self.views.insert(state)
    }

    pub fn get(&self, key: ViewKey) -> Option<ViewState> {
        self.views.get(key).copied()
    }

    pub fn get_mut(&mut self, key: ViewKey) -> Option<&mut ViewState> {
        self.views.get_mut(key)
    }

    pub fn contains(&self, key: ViewKey) -> bool {
        self.views.contains_key(key)
    }

    /// Returns `false` when the view was already gone.
    pub fn dispose(&mut self, key: ViewKey) -> bool {
        self.views.remove(key).is_some()
    }

    /// Dispose every view; returns how many were live.
    pub fn dispose_all(&mut self) -> usize {
        let n = self.views.len();
        self.views.clear();
        n
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewKey, ViewState)> + '_ {
        self.views.iter().map(|(k, v)| (k, *v))
    }

    fn others(&mut self, except: Option<ViewKey>) -> impl Iterator<Item = &mut ViewState> + '_ {
        self.views
            .iter_mut()
            .filter(move |(k, _)| Some(*k) != except)
            .map(|(_, v)| v)
    }

    /// `added` items were inserted at absolute position `at`.
    pub fn on_insert(&mut self, except: Option<ViewKey>, at: usize, added: usize) {
        for v in self.others(except) {
            if v.offset < at && at < v.end() {
                v.size += added;
            }
            if v.offset > at || (v.offset == at && v.size > 0) {
                v.offset += added;
            }
        }
    }

    /// The item at absolute position `at` was removed.
    pub fn on_remove_at(&mut self, except: Option<ViewKey>, at: usize) {
        for v in self.others(except) {
            if v.offset <= at && at < v.end() {
                v.size -= 1;
            }
            if v.offset > at {
                v.offset -= 1;
            }
        }
    }

    /// `removed` (absolute) was cut out of the array. Returns the number of
    /// views disposed.
    pub fn on_remove_interval(&mut self, except: Option<ViewKey>, removed: ViewState) -> usize {
        if removed.size == 0 {
            return 0;
        }
        let (start, end) = (removed.offset, removed.end());
        let mut doomed = Vec::new();
        for (k, v) in self.views.iter_mut() {
            if Some(k) == except {
                continue;
            }
            if v.end() <= start {
                continue;
            }
            if v.offset >= end {
                v.offset -= removed.size;
            } else if v.offset <= start && v.end() >= end && *v != removed {
                v.size -= removed.size;
            } else {
                doomed.push(k);
            }
        }
        for k in &doomed {
            self.views.remove(*k);
        }
        doomed.len()
    }

    /// The sorted, distinct absolute slots in `removed` were cut out of the
    /// array. Sweeps view endpoints in position order, moving each left by the
    /// number of removed slots that precede it.
    pub fn on_remove_positions(&mut self, except: Option<ViewKey>, removed: &[usize]) {
        if removed.is_empty() {
            return;
        }
        debug_assert!(removed.windows(2).all(|w| w[0] < w[1]));
        let mut endpoints: Vec<(usize, Endpoint, ViewKey)> = Vec::with_capacity(2 * self.len());
        for (k, v) in self.views.iter() {
            if Some(k) == except {
                continue;
            }
            endpoints.push((v.offset, Endpoint::Left, k));
            endpoints.push((v.end(), Endpoint::Right, k));
        }
        endpoints.sort_unstable_by_key(|&(pos, side, _)| (pos, side));

        let mut before = 0usize;
        let mut left: SecondaryMap<ViewKey, usize> = SecondaryMap::with_capacity(endpoints.len() / 2);
        for (pos, side, k) in endpoints {
            while before < removed.len() && removed[before] < pos {
                before += 1;
            }
            match side {
                Endpoint::Left => {
                    left.insert(k, pos - before);
                }
                Endpoint::Right => {
                    if let (Some(offset), Some(v)) = (left.remove(k), self.views.get_mut(k)) {
                        *v = ViewState::new(offset, pos - before - offset);
                    }
                }
            }
        }
    }

    /// The absolute `range` was reordered in place. Views partially
    /// overlapping it are disposed. Views it covers are mirrored when
    /// `mirror` is set (reverse) and disposed otherwise (sort, shuffle).
    /// Views covering the whole range and disjoint views are untouched.
    /// Returns the number of views disposed.
    pub fn on_reorder(&mut self, except: Option<ViewKey>, range: ViewState, mirror: bool) -> usize {
        let mut doomed = Vec::new();
        for (k, v) in self.views.iter_mut() {
            if Some(k) == except {
                continue;
            }
            match v.relation_to(&range) {
                Relation::NonOverlapping | Relation::Contains => {}
                Relation::ContainedIn if mirror => {
                    v.offset = 2 * range.offset + range.size - v.size - v.offset;
                }
                Relation::ContainedIn | Relation::Overlapping => doomed.push(k),
            }
        }
        for k in &doomed {
            self.views.remove(*k);
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(views: &[(usize, usize)]) -> (ViewRegistry, Vec<ViewKey>) {
        let mut r = ViewRegistry::new();
        let keys = views
            .iter()
            .map(|&(o, s)| r.register(ViewState::new(o, s)))
            .collect();
        (r, keys)
    }

    fn state(r: &ViewRegistry, k: ViewKey) -> Option<(usize, usize)> {
        r.get(k).map(|v| (v.offset, v.size))
    }

    /// Invariant: inserting before, inside and after a view shifts, grows or
    /// leaves it.
    #[test]
    fn insert_propagation() {
        let after = |view: (usize, usize), at: usize| {
            let (mut r, k) = registry(&[view]);
            r.on_insert(None, at, 1);
            state(&r, k[0]).unwrap()
        };
        assert_eq!(after((3, 4), 1), (4, 4));
        assert_eq!(after((3, 4), 3), (4, 4));
        assert_eq!(after((3, 4), 5), (3, 5));
        assert_eq!(after((3, 4), 7), (3, 4));
        assert_eq!(after((3, 0), 3), (3, 0));
        assert_eq!(after((3, 0), 2), (4, 0));
    }

    #[test]
    fn insert_skips_the_acting_view() {
        let (mut r, k) = registry(&[(0, 2), (0, 2)]);
        r.on_insert(Some(k[0]), 0, 1);
        assert_eq!(state(&r, k[0]), Some((0, 2)));
        assert_eq!(state(&r, k[1]), Some((1, 2)));
    }

    #[test]
    fn remove_at_shrinks_or_shifts() {
        let (mut r, k) = registry(&[(0, 2), (2, 3), (6, 1)]);
        r.on_remove_at(None, 3);
        assert_eq!(state(&r, k[0]), Some((0, 2)));
        assert_eq!(state(&r, k[1]), Some((2, 2)));
        assert_eq!(state(&r, k[2]), Some((5, 1)));
    }

    /// Invariant: an exact match and a straddling view are both disposed.
    #[test]
    fn remove_interval_disposes_inside_and_straddling() {
        let (mut r, k) = registry(&[(1, 2), (2, 2), (0, 5), (3, 2), (0, 1), (2, 0)]);
        let disposed = r.on_remove_interval(None, ViewState::new(1, 2));
        assert_eq!(disposed, 3);
        assert!(!r.contains(k[0]));
        assert!(!r.contains(k[1]));
        assert_eq!(state(&r, k[2]), Some((0, 3)));
        assert_eq!(state(&r, k[3]), Some((1, 2)));
        assert_eq!(state(&r, k[4]), Some((0, 1)));
        assert!(!r.contains(k[5]));
    }

    /// Invariant: the endpoint sweep shrinks and shifts without disposing.
    #[test]
    fn remove_positions_sweep() {
        let (mut r, k) = registry(&[(0, 2), (3, 3), (8, 2), (4, 0)]);
        r.on_remove_positions(None, &[3, 5]);
        assert_eq!(state(&r, k[0]), Some((0, 2)));
        assert_eq!(state(&r, k[1]), Some((3, 1)));
        assert_eq!(state(&r, k[2]), Some((6, 2)));
        assert_eq!(state(&r, k[3]), Some((3, 0)));
    }

    #[test]
    fn reverse_mirrors_contained_views() {
        let (mut r, k) = registry(&[(1, 2), (0, 10), (8, 2), (3, 4)]);
        let disposed = r.on_reorder(None, ViewState::new(0, 5), true);
        assert_eq!(disposed, 1);
        assert_eq!(state(&r, k[0]), Some((2, 2)));
        assert_eq!(state(&r, k[1]), Some((0, 10)));
        assert_eq!(state(&r, k[2]), Some((8, 2)));
        assert!(!r.contains(k[3]));
    }

    #[test]
    fn sort_disposes_contained_views() {
        let (mut r, k) = registry(&[(1, 2), (0, 10)]);
        assert_eq!(r.on_reorder(None, ViewState::new(0, 5), false), 1);
        assert!(!r.contains(k[0]));
        assert!(r.contains(k[1]));
    }

    /// Invariant: an empty view strictly inside a reordered range follows
    /// the mirror on reverse and is disposed on sort; empty views on the
    /// range boundary stay put.
    #[test]
    fn reorder_handles_empty_views_inside_range() {
        let (mut r, k) = registry(&[(2, 0), (0, 0), (5, 0)]);
        assert_eq!(r.on_reorder(None, ViewState::new(0, 5), true), 0);
        assert_eq!(state(&r, k[0]), Some((3, 0)));
        assert_eq!(state(&r, k[1]), Some((0, 0)));
        assert_eq!(state(&r, k[2]), Some((5, 0)));

        assert_eq!(r.on_reorder(None, ViewState::new(0, 5), false), 1);
        assert!(!r.contains(k[0]));
        assert!(r.contains(k[1]));
        assert!(r.contains(k[2]));
    }

    #[test]
    fn relation_classification() {
        let range = ViewState::new(2, 4);
        assert_eq!(ViewState::new(0, 2).relation_to(&range), Relation::NonOverlapping);
        assert_eq!(ViewState::new(6, 1).relation_to(&range), Relation::NonOverlapping);
        assert_eq!(ViewState::new(1, 6).relation_to(&range), Relation::Contains);
        assert_eq!(ViewState::new(3, 2).relation_to(&range), Relation::ContainedIn);
        assert_eq!(ViewState::new(1, 3).relation_to(&range), Relation::Overlapping);
        assert_eq!(ViewState::new(4, 0).relation_to(&range), Relation::ContainedIn);
        assert_eq!(ViewState::new(2, 0).relation_to(&range), Relation::NonOverlapping);
        assert_eq!(ViewState::new(6, 0).relation_to(&range), Relation::NonOverlapping);
        assert_eq!(
            ViewState::new(1, 6).relation_to(&ViewState::new(3, 0)),
            Relation::Contains
        );
    }

    #[test]
    fn stale_keys_are_detected() {
        let (mut r, k) = registry(&[(0, 1)]);
        assert!(r.dispose(k[0]));
        assert!(!r.dispose(k[0]));
        let fresh = r.register(ViewState::new(0, 1));
        assert_ne!(fresh, k[0]);
        assert_eq!(r.get(k[0]), None);
        assert_eq!(r.dispose_all(), 1);
    }
}

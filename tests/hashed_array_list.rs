// HashedArrayList integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Index agreement: index_of(item) is the item's current position.
// - View tracking: after any mutation through the root or another view,
//   each live view still covers the items it covered, plus items inserted
//   strictly inside it, minus items removed.
// - Disposal: views swallowed by interval removal or broken by reordering
//   are disposed; every later use of their handle fails.
// - Ownership: a handle only addresses the list that issued it.
use chained_collections::{CollectionError, HashedArrayList, ViewHandle};

fn list(n: u32) -> HashedArrayList<u32> {
    (0..n).collect()
}

fn items(l: &HashedArrayList<u32>, h: ViewHandle) -> Vec<u32> {
    l.view(h).expect("live view").to_vec()
}

// Test: positional removal keeps the index honest.
// Assumes: later items shift down by one.
// Verifies: the removed item is gone from the index, the rest re-indexed.
#[test]
fn remove_at_reindexes_tail() {
    let mut l: HashedArrayList<u32> = [4, 16, 28].into_iter().collect();
    assert_eq!(l.remove_at(1), Ok(16));
    assert_eq!(l.as_slice(), &[4, 28]);
    assert_eq!(l.index_of(&16), None);
    assert_eq!(l.index_of(&28), Some(1));
    assert!(l.check().is_ok());
}

// Test: interval removal swallowing adjacent views.
// Assumes: a view inside the removed interval, or empty strictly inside
// it, cannot be placed afterwards.
// Verifies: both views are disposed and later calls fail with ViewDisposed.
#[test]
fn interval_removal_disposes_covered_views() {
    let mut l = list(5);
    let a = l.take_view(1, 1).unwrap();
    let b = l.take_view(2, 0).unwrap();
    l.remove_interval(1, 2).unwrap();

    assert_eq!(l.as_slice(), &[0, 3, 4]);
    assert!(!l.is_valid_view(a));
    assert!(!l.is_valid_view(b));
    assert_eq!(l.view(a).err(), Some(CollectionError::ViewDisposed));
    assert_eq!(
        l.view_mut(b).and_then(|mut v| v.insert(0, 9)),
        Err(CollectionError::ViewDisposed)
    );
    assert_eq!(l.views(), 0);
}

// Test: bulk removal reshapes views without disposing any.
// Assumes: remove_all never disposes views.
// Verifies: untouched, shrunk and shifted views.
#[test]
fn remove_all_shrinks_and_shifts_views() {
    let mut l = list(10);
    let front = l.take_view(0, 2).unwrap();
    let middle = l.take_view(3, 3).unwrap();
    let back = l.take_view(8, 2).unwrap();

    assert_eq!(l.remove_all(&[3, 5]), 2);

    assert_eq!(items(&l, front), vec![0, 1]);
    assert_eq!(items(&l, middle), vec![4]);
    assert_eq!(l.view(middle).unwrap().offset(), 3);
    assert_eq!(items(&l, back), vec![8, 9]);
    assert_eq!(l.view(back).unwrap().offset(), 6);
    assert!(l.check().is_ok());
}

// Test: inserting through one view updates its siblings.
// Assumes: the acting view always grows; others grow only when the
// insertion lands strictly inside them.
// Verifies: sizes and offsets of overlapping and later views.
#[test]
fn insert_through_view_updates_siblings() {
    let mut l = list(10);
    let acting = l.take_view(2, 3).unwrap();
    let overlapping = l.take_view(1, 6).unwrap();
    let touching = l.take_view(5, 2).unwrap();
    let later = l.take_view(8, 2).unwrap();

    l.view_mut(acting).unwrap().insert_last(100).unwrap();

    assert_eq!(l.as_slice()[5], 100);
    assert_eq!(items(&l, acting), vec![2, 3, 4, 100]);
    assert_eq!(items(&l, overlapping), vec![1, 2, 3, 4, 100, 5, 6]);
    assert_eq!(items(&l, touching), vec![5, 6]);
    assert_eq!(items(&l, later), vec![8, 9]);
    assert!(l.check().is_ok());
}

// Test: duplicate inside a bulk insert.
// Assumes: validation runs before any item is placed.
// Verifies: list, index and views are exactly as before.
#[test]
fn insert_all_with_duplicate_changes_nothing() {
    let mut l = list(6);
    let v = l.take_view(2, 2).unwrap();
    let stamp = l.stamp();

    let r = l.view_mut(v).unwrap().insert_all(1, [40, 41, 4, 42]);
    assert_eq!(r, Err(CollectionError::DuplicateNotAllowed));
    assert_eq!(l.as_slice(), &[0, 1, 2, 3, 4, 5]);
    assert_eq!(l.index_of(&40), None);
    assert_eq!(l.stamp(), stamp);
    assert_eq!(items(&l, v), vec![2, 3]);

    assert_eq!(l.view_mut(v).unwrap().insert_all(1, [40, 41]), Ok(2));
    assert_eq!(items(&l, v), vec![2, 40, 41, 3]);
    assert!(l.check().is_ok());
}

// Test: reversing a view.
// Assumes: views inside the reversed range follow their items; views
// containing it are untouched; partial overlaps are disposed.
// Verifies: mirrored inner view, intact outer view, disposed straddler.
#[test]
fn reverse_mirrors_inner_views() {
    let mut l = list(10);
    let acting = l.take_view(2, 6).unwrap();
    let inner = l.take_view(3, 2).unwrap();
    let outer = l.take_view(1, 8).unwrap();
    let straddling = l.take_view(6, 3).unwrap();

    l.view_mut(acting).unwrap().reverse();

    assert_eq!(l.as_slice(), &[0, 1, 7, 6, 5, 4, 3, 2, 8, 9]);
    assert_eq!(items(&l, inner), vec![4, 3]);
    assert_eq!(items(&l, outer), vec![1, 7, 6, 5, 4, 3, 2, 8]);
    assert!(!l.is_valid_view(straddling));
    assert!(l.check().is_ok());
}

// Test: sorting a view.
// Assumes: a sort cannot keep inner views on their items.
// Verifies: inner views are disposed; the sorted window is ordered.
#[test]
fn sort_disposes_inner_views() {
    let mut l: HashedArrayList<u32> = [9, 4, 7, 1, 8, 2].into_iter().collect();
    let acting = l.take_view(1, 4).unwrap();
    let inner = l.take_view(2, 1).unwrap();
    let whole = l.take_view(0, 6).unwrap();

    l.view_mut(acting).unwrap().sort();

    assert_eq!(l.as_slice(), &[9, 1, 4, 7, 8, 2]);
    assert!(l.view(acting).unwrap().is_sorted());
    assert!(!l.is_valid_view(inner));
    assert_eq!(items(&l, whole), vec![9, 1, 4, 7, 8, 2]);
    assert!(l.check().is_ok());
}

// Test: sliding and spanning views.
// Assumes: slides are relative to the current offset and stay in bounds.
// Verifies: slide, failed slide, span of two views.
#[test]
fn slide_and_span() {
    let mut l = list(10);
    let v = l.take_view(2, 2).unwrap();
    let w = l.take_view(6, 3).unwrap();
    let front = l.take_view(0, 2).unwrap();

    l.view_mut(v).unwrap().slide(3).unwrap();
    assert_eq!(items(&l, v), vec![5, 6]);
    assert_eq!(
        l.view_mut(v).unwrap().slide(5),
        Err(CollectionError::ArgumentOutOfRange("offset"))
    );
    assert_eq!(items(&l, v), vec![5, 6]);

    let joined = l.view_mut(v).unwrap().span(w).unwrap().expect("w ends after v");
    assert_eq!(items(&l, joined), vec![5, 6, 7, 8]);
    assert_eq!(l.view_mut(w).unwrap().span(front).unwrap(), None);
    assert_eq!(l.root_mut().slide(1), Err(CollectionError::NotAView));
}

// Test: handles are bound to their list.
// Assumes: list identity is fixed at creation and not shared by clones.
// Verifies: IncompatibleView for foreign handles, including a clone's.
#[test]
fn foreign_handles_are_rejected() {
    let mut a = list(4);
    let mut b = list(4);
    let h = a.take_view(1, 2).unwrap();
    assert_eq!(b.view(h).err(), Some(CollectionError::IncompatibleView));
    assert_eq!(
        b.view_mut(h).and_then(|mut v| v.remove_first()),
        Err(CollectionError::IncompatibleView)
    );

    let c = a.clone();
    assert_eq!(c.views(), 0);
    assert_eq!(c.view(h).err(), Some(CollectionError::IncompatibleView));
    assert_eq!(items(&a, h), vec![1, 2]);
}

// Test: clearing the root.
// Assumes: clear empties the list and ends every view; the list stays usable.
// Verifies: all handles dead; later adds work.
#[test]
fn clear_disposes_every_view() {
    let mut l = list(6);
    let hs: Vec<ViewHandle> = (0..3).map(|i| l.take_view(i, 2).unwrap()).collect();
    l.clear();
    assert!(l.is_empty());
    assert!(hs.iter().all(|h| !l.is_valid_view(*h)));
    assert!(l.add(7));
    assert!(!l.add(7));
    assert_eq!(l.as_slice(), &[7]);
}

// Test: clearing a view.
// Assumes: clearing a view removes exactly its window.
// Verifies: the view survives empty; siblings shift.
#[test]
fn clear_view_removes_window() {
    let mut l = list(8);
    let v = l.take_view(2, 3).unwrap();
    let after = l.take_view(6, 2).unwrap();
    l.view_mut(v).unwrap().clear();
    assert_eq!(l.as_slice(), &[0, 1, 5, 6, 7]);
    assert!(l.view(v).unwrap().is_empty());
    assert_eq!(items(&l, after), vec![6, 7]);

    l.view_mut(v).unwrap().add(50);
    assert_eq!(l.as_slice(), &[0, 1, 50, 5, 6, 7]);
    assert_eq!(items(&l, after), vec![6, 7]);
}

// Test: locating an item as a view.
// Assumes: view_of returns a one-item view over the item's position.
// Verifies: the new view follows the item through later inserts.
#[test]
fn view_of_follows_item() {
    let mut l = list(5);
    let h = l.root_mut().view_of(&3).expect("present");
    assert!(l.root_mut().view_of(&30).is_none());
    l.insert(0, 100).unwrap();
    assert_eq!(items(&l, h), vec![3]);
    assert_eq!(l.view(h).unwrap().offset(), 4);
}

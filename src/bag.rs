use smallvec::SmallVec;

use crate::{
  identifier::{CombineIdentifier, Identity},
  subscription::Cancellable,
};

/// An unordered collection keyed by [`CombineIdentifier`].
///
/// Membership is decided by identity, never by value equality: inserting an
/// item whose identifier is already present replaces the old entry.
///
/// # Design
///
/// - **SmallVec Optimization**: the common case of one or two members lives
///   inline without a heap allocation.
/// - **Snapshot Dispatch**: callers clone the members out with [`snapshot`]
///   (or move them out with [`take`]) and dispatch after releasing whatever
///   lock guards the bag, so a member that removes itself mid-dispatch never
///   invalidates the iteration.
///
/// [`snapshot`]: Bag::snapshot
/// [`take`]: Bag::take
pub struct Bag<T> {
  items: SmallVec<[(CombineIdentifier, T); 2]>,
}

impl<T> Default for Bag<T> {
  fn default() -> Self { Self { items: SmallVec::new() } }
}

impl<T> Bag<T> {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Inserts `item` under `id`, returning the entry it replaced.
  pub fn insert_with_id(&mut self, id: CombineIdentifier, item: T) -> Option<T> {
    match self.items.iter_mut().find(|(k, _)| *k == id) {
      Some(slot) => Some(std::mem::replace(&mut slot.1, item)),
      None => {
        self.items.push((id, item));
        None
      }
    }
  }

  /// Removes the entry keyed by `id`.
  pub fn remove(&mut self, id: CombineIdentifier) -> Option<T> {
    let pos = self.items.iter().position(|(k, _)| *k == id)?;
    Some(self.items.swap_remove(pos).1)
  }

  #[inline]
  pub fn contains(&self, id: CombineIdentifier) -> bool { self.items.iter().any(|(k, _)| *k == id) }

  #[inline]
  pub fn get(&self, id: CombineIdentifier) -> Option<&T> {
    self.items.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
  }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &T> { self.items.iter().map(|(_, v)| v) }

  /// Moves every member out, leaving the bag empty.
  pub fn take(&mut self) -> Vec<T> { self.items.drain(..).map(|(_, v)| v).collect() }
}

impl<T: Identity> Bag<T> {
  /// Inserts `item` under its own identity.
  #[inline]
  pub fn insert(&mut self, item: T) -> Option<T> { self.insert_with_id(item.combine_identifier(), item) }
}

impl<T: Clone> Bag<T> {
  /// Clones the current members so they can be visited with no lock held.
  pub fn snapshot(&self) -> Vec<T> { self.items.iter().map(|(_, v)| v.clone()).collect() }
}

impl<T: Cancellable> Bag<T> {
  /// Takes every member out and cancels it.
  pub fn cancel_all(&mut self) {
    for item in self.take() {
      item.cancel();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscription::AnyCancellable;

  #[test]
  fn keyed_by_identity_not_value() {
    let mut bag = Bag::new();
    let a = CombineIdentifier::new();
    let b = CombineIdentifier::new();
    assert!(bag.insert_with_id(a, 1).is_none());
    assert!(bag.insert_with_id(b, 1).is_none());
    assert_eq!(bag.len(), 2);
    assert_eq!(bag.insert_with_id(a, 7), Some(1));
    assert_eq!(bag.len(), 2);
    assert_eq!(bag.get(a), Some(&7));
  }

  #[test]
  fn remove_and_contains() {
    let mut bag = Bag::new();
    let ids: Vec<_> = (0..4).map(|_| CombineIdentifier::new()).collect();
    ids.iter().enumerate().for_each(|(i, id)| {
      bag.insert_with_id(*id, i);
    });
    assert_eq!(bag.remove(ids[1]), Some(1));
    assert_eq!(bag.remove(ids[1]), None);
    assert!(!bag.contains(ids[1]));
    assert!(bag.contains(ids[3]));
    let mut rest: Vec<_> = bag.iter().copied().collect();
    rest.sort();
    assert_eq!(rest, vec![0, 2, 3]);
  }

  #[test]
  fn snapshot_is_independent_of_later_mutation() {
    let mut bag = Bag::new();
    let id = CombineIdentifier::new();
    bag.insert_with_id(id, "a");
    let snap = bag.snapshot();
    bag.remove(id);
    assert_eq!(snap, vec!["a"]);
    assert!(bag.is_empty());
  }

  #[test]
  fn cancel_all_empties_the_bag() {
    let mut bag = Bag::new();
    let t1 = AnyCancellable::new(|| {});
    let t2 = AnyCancellable::new(|| {});
    bag.insert(t1.clone());
    bag.insert(t2.clone());
    bag.insert(t1.clone());
    assert_eq!(bag.len(), 2);
    bag.cancel_all();
    assert!(bag.is_empty());
    assert!(t1.is_cancelled() && t2.is_cancelled());
  }
}

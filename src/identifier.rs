//! Stable per-instance identity for subscribers and subscriptions.

use std::{
  fmt::{Debug, Display, Formatter},
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque identifier issued from a process-wide counter.
///
/// Two identifiers compare equal only when they were handed out by the same
/// call to [`CombineIdentifier::new`] (or copied from it), so identity is
/// independent of value equality of the object carrying it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CombineIdentifier(u64);

impl CombineIdentifier {
  #[inline]
  #[allow(clippy::new_without_default)]
  pub fn new() -> Self { CombineIdentifier(NEXT_ID.fetch_add(1, Ordering::Relaxed)) }

  #[inline]
  pub fn value(&self) -> u64 { self.0 }
}

impl Display for CombineIdentifier {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "0x{:x}", self.0) }
}

impl Debug for CombineIdentifier {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "CombineIdentifier({self})")
  }
}

/// Anything that carries a stable [`CombineIdentifier`].
pub trait Identity {
  fn combine_identifier(&self) -> CombineIdentifier;
}

impl<T: Identity + ?Sized> Identity for Arc<T> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { (**self).combine_identifier() }
}

impl<T: Identity + ?Sized> Identity for Box<T> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { (**self).combine_identifier() }
}

#[cfg(test)]
mod tests {
  use std::{collections::HashSet, thread};

  use super::*;

  #[test]
  fn identifiers_are_unique_across_threads() {
    let handles: Vec<_> = (0..4)
      .map(|_| thread::spawn(|| (0..100).map(|_| CombineIdentifier::new()).collect::<Vec<_>>()))
      .collect();
    let mut seen = HashSet::new();
    for h in handles {
      for id in h.join().unwrap() {
        assert!(seen.insert(id));
      }
    }
    assert_eq!(seen.len(), 400);
  }

  #[test]
  fn display_as_hex() {
    let id = CombineIdentifier(255);
    assert_eq!(id.to_string(), "0xff");
    assert_eq!(format!("{id:?}"), "CombineIdentifier(0xff)");
  }

  #[test]
  fn copies_share_identity() {
    let a = CombineIdentifier::new();
    let b = a;
    assert_eq!(a, b);
    assert_ne!(a, CombineIdentifier::new());
  }
}

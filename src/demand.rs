//! Demand: the number of values a subscriber is still willing to receive.
//!
//! Demand is either a bounded count or [`Demand::Unlimited`]. The arithmetic
//! never underflows (results clamp to `max(0)`) and never wraps: any overflow
//! saturates to `Unlimited`, which is absorbing for addition and
//! multiplication.

use std::{
  cmp::Ordering,
  fmt::{Display, Formatter},
  ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign},
};

/// A requested number of items, sent from a subscriber to a publisher through
/// the subscription.
///
/// Variant order matters: the derived ordering places every bounded demand
/// below `Unlimited`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Demand {
  /// At most this many more values.
  Max(usize),
  /// As many values as the publisher can produce.
  Unlimited,
}

impl Demand {
  /// A request for no elements, equivalent to `Demand::max(0)`.
  pub const NONE: Demand = Demand::Max(0);

  /// A request for as many values as the publisher can produce.
  pub const UNLIMITED: Demand = Demand::Unlimited;

  /// Creates a demand for the given maximum number of elements.
  ///
  /// # Panics
  ///
  /// A negative count is a programming error and always panics, in every
  /// build profile. Counts above `isize::MAX` go through [`Demand::Max`] or
  /// `From<usize>`.
  #[inline]
  pub fn max(value: isize) -> Demand {
    assert!(value >= 0, "demand cannot be negative: {value}");
    Demand::Max(value as usize)
  }

  /// The bounded count, or `None` for `Unlimited`.
  #[inline]
  pub fn max_value(&self) -> Option<usize> {
    match self {
      Demand::Max(n) => Some(*n),
      Demand::Unlimited => None,
    }
  }

  /// `true` when no more values may be delivered.
  #[inline]
  pub fn is_none(&self) -> bool { matches!(self, Demand::Max(0)) }

  /// `true` when at least one more value may be delivered.
  #[inline]
  pub fn has_any(&self) -> bool { !self.is_none() }

  #[inline]
  pub fn is_unlimited(&self) -> bool { matches!(self, Demand::Unlimited) }
}

impl Default for Demand {
  fn default() -> Self { Demand::NONE }
}

impl From<usize> for Demand {
  #[inline]
  fn from(value: usize) -> Self { Demand::Max(value) }
}

impl Display for Demand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Demand::Max(n) => write!(f, "max({n})"),
      Demand::Unlimited => f.write_str("unlimited"),
    }
  }
}

impl Add for Demand {
  type Output = Demand;

  #[inline]
  fn add(self, rhs: Demand) -> Demand {
    match (self, rhs) {
      (Demand::Max(a), Demand::Max(b)) => a.checked_add(b).map_or(Demand::Unlimited, Demand::Max),
      _ => Demand::Unlimited,
    }
  }
}

impl Add<usize> for Demand {
  type Output = Demand;

  #[inline]
  fn add(self, rhs: usize) -> Demand { self + Demand::Max(rhs) }
}

impl Sub for Demand {
  type Output = Demand;

  /// `Unlimited - x` stays `Unlimited`; `max(n) - Unlimited` is `max(0)`.
  #[inline]
  fn sub(self, rhs: Demand) -> Demand {
    match (self, rhs) {
      (Demand::Unlimited, _) => Demand::Unlimited,
      (Demand::Max(_), Demand::Unlimited) => Demand::NONE,
      (Demand::Max(a), Demand::Max(b)) => Demand::Max(a.saturating_sub(b)),
    }
  }
}

impl Sub<usize> for Demand {
  type Output = Demand;

  #[inline]
  fn sub(self, rhs: usize) -> Demand { self - Demand::Max(rhs) }
}

impl Mul<usize> for Demand {
  type Output = Demand;

  #[inline]
  fn mul(self, rhs: usize) -> Demand {
    match self {
      Demand::Unlimited => Demand::Unlimited,
      Demand::Max(a) => a.checked_mul(rhs).map_or(Demand::Unlimited, Demand::Max),
    }
  }
}

impl Div<usize> for Demand {
  type Output = Demand;

  /// # Panics
  ///
  /// Dividing a bounded demand by zero panics, like integer division.
  #[inline]
  fn div(self, rhs: usize) -> Demand {
    match self {
      Demand::Unlimited => Demand::Unlimited,
      Demand::Max(a) => Demand::Max(a / rhs),
    }
  }
}

macro_rules! assign_ops {
  ($($tr: ident $method: ident $op: tt $rhs: ty;)*) => {
    $(
      impl $tr<$rhs> for Demand {
        #[inline]
        fn $method(&mut self, rhs: $rhs) { *self = *self $op rhs; }
      }
    )*
  };
}

assign_ops! {
  AddAssign add_assign + Demand;
  AddAssign add_assign + usize;
  SubAssign sub_assign - Demand;
  SubAssign sub_assign - usize;
  MulAssign mul_assign * usize;
  DivAssign div_assign / usize;
}

impl PartialEq<usize> for Demand {
  /// `Unlimited` never equals a count.
  #[inline]
  fn eq(&self, other: &usize) -> bool { matches!(self, Demand::Max(n) if n == other) }
}

impl PartialEq<Demand> for usize {
  #[inline]
  fn eq(&self, other: &Demand) -> bool { other == self }
}

impl PartialOrd<usize> for Demand {
  #[inline]
  fn partial_cmp(&self, other: &usize) -> Option<Ordering> {
    match self {
      Demand::Max(n) => n.partial_cmp(other),
      Demand::Unlimited => Some(Ordering::Greater),
    }
  }
}

impl PartialOrd<Demand> for usize {
  #[inline]
  fn partial_cmp(&self, other: &Demand) -> Option<Ordering> {
    other.partial_cmp(self).map(Ordering::reverse)
  }
}

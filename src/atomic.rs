//! Lock-free atomic cells.
//!
//! [`Atomic<T>`] gives a uniform `load`/`store`/`exchange`/`compare_and_swap`
//! surface over the standard atomic integer and boolean types, and
//! [`AtomicNumber`] adds the arithmetic and bitwise read-modify-write
//! operations. Loads use `Acquire`, stores `Release`, and every
//! read-modify-write `AcqRel`, so a value published by one thread is fully
//! visible to the thread that observes it.

use std::sync::atomic::{self, Ordering};

/// A plain value type with a matching standard atomic.
pub trait AtomicValue: Copy + Send + Sync + 'static {
  type Repr: Send + Sync;

  fn new_repr(value: Self) -> Self::Repr;
  fn load(repr: &Self::Repr) -> Self;
  fn store(repr: &Self::Repr, value: Self);
  fn exchange(repr: &Self::Repr, value: Self) -> Self;
  /// Stores `new` if the current value is `current`; returns the previous
  /// value either way.
  fn compare_and_swap(repr: &Self::Repr, current: Self, new: Self) -> Self;
}

/// Integer values that also support arithmetic and bitwise updates. Every
/// operation returns the value held before the update; arithmetic wraps.
pub trait AtomicNumber: AtomicValue {
  fn add(repr: &Self::Repr, value: Self) -> Self;
  fn sub(repr: &Self::Repr, value: Self) -> Self;
  fn or(repr: &Self::Repr, value: Self) -> Self;
  fn xor(repr: &Self::Repr, value: Self) -> Self;
  fn and(repr: &Self::Repr, value: Self) -> Self;
}

macro_rules! atomic_value {
  ($($ty: ty => $repr: ty),* $(,)?) => {
    $(
      impl AtomicValue for $ty {
        type Repr = $repr;

        #[inline]
        fn new_repr(value: Self) -> Self::Repr { <$repr>::new(value) }
        #[inline]
        fn load(repr: &Self::Repr) -> Self { repr.load(Ordering::Acquire) }
        #[inline]
        fn store(repr: &Self::Repr, value: Self) { repr.store(value, Ordering::Release) }
        #[inline]
        fn exchange(repr: &Self::Repr, value: Self) -> Self {
          repr.swap(value, Ordering::AcqRel)
        }
        #[inline]
        fn compare_and_swap(repr: &Self::Repr, current: Self, new: Self) -> Self {
          match repr.compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire) {
            Ok(prev) | Err(prev) => prev,
          }
        }
      }
    )*
  };
}

macro_rules! atomic_number {
  ($($ty: ty),* $(,)?) => {
    $(
      impl AtomicNumber for $ty {
        #[inline]
        fn add(repr: &Self::Repr, value: Self) -> Self { repr.fetch_add(value, Ordering::AcqRel) }
        #[inline]
        fn sub(repr: &Self::Repr, value: Self) -> Self { repr.fetch_sub(value, Ordering::AcqRel) }
        #[inline]
        fn or(repr: &Self::Repr, value: Self) -> Self { repr.fetch_or(value, Ordering::AcqRel) }
        #[inline]
        fn xor(repr: &Self::Repr, value: Self) -> Self { repr.fetch_xor(value, Ordering::AcqRel) }
        #[inline]
        fn and(repr: &Self::Repr, value: Self) -> Self { repr.fetch_and(value, Ordering::AcqRel) }
      }
    )*
  };
}

atomic_value! {
  bool => atomic::AtomicBool,
  i8 => atomic::AtomicI8,
  i16 => atomic::AtomicI16,
  i32 => atomic::AtomicI32,
  i64 => atomic::AtomicI64,
  isize => atomic::AtomicIsize,
  u8 => atomic::AtomicU8,
  u16 => atomic::AtomicU16,
  u32 => atomic::AtomicU32,
  u64 => atomic::AtomicU64,
  usize => atomic::AtomicUsize,
}

atomic_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// A thread-safe cell holding a `T`.
pub struct Atomic<T: AtomicValue> {
  repr: T::Repr,
}

impl<T: AtomicValue> Atomic<T> {
  #[inline]
  pub fn new(value: T) -> Self { Atomic { repr: T::new_repr(value) } }

  #[inline]
  pub fn load(&self) -> T { T::load(&self.repr) }

  #[inline]
  pub fn store(&self, value: T) { T::store(&self.repr, value) }

  /// Replaces the value, returning the previous one.
  #[inline]
  pub fn exchange(&self, value: T) -> T { T::exchange(&self.repr, value) }

  /// Returns the previous value; the swap happened iff it equals `current`.
  #[inline]
  pub fn compare_and_swap(&self, current: T, new: T) -> T {
    T::compare_and_swap(&self.repr, current, new)
  }
}

impl<T: AtomicNumber> Atomic<T> {
  #[inline]
  pub fn add(&self, value: T) -> T { T::add(&self.repr, value) }
  #[inline]
  pub fn sub(&self, value: T) -> T { T::sub(&self.repr, value) }
  #[inline]
  pub fn or(&self, value: T) -> T { T::or(&self.repr, value) }
  #[inline]
  pub fn xor(&self, value: T) -> T { T::xor(&self.repr, value) }
  #[inline]
  pub fn and(&self, value: T) -> T { T::and(&self.repr, value) }
}

impl<T: AtomicValue + Default> Default for Atomic<T> {
  fn default() -> Self { Atomic::new(T::default()) }
}

impl<T: AtomicValue + std::fmt::Debug> std::fmt::Debug for Atomic<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("Atomic").field(&self.load()).finish()
  }
}

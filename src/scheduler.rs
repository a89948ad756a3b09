//! Schedulers decide where and when work runs.
//!
//! Nothing in this crate switches threads on its own. Operators such as
//! [`subscribe_on`](crate::prelude::Publisher::subscribe_on),
//! [`receive_on`](crate::prelude::Publisher::receive_on),
//! [`collect_by_time`](crate::prelude::Publisher::collect_by_time) and
//! [`measure_interval`](crate::prelude::Publisher::measure_interval) hand work
//! to the scheduler they were given.

use std::{
  fmt::{Debug, Display, Formatter},
  ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
  time::{Duration, Instant},
};

use crate::subscription::AnyCancellable;

mod immediate;
mod test_scheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use immediate::ImmediateScheduler;
pub use test_scheduler::{TestScheduler, VirtualTime};
#[cfg(feature = "futures-scheduler")]
pub use thread_pool_scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A signed distance between two scheduler times, in nanoseconds.
///
/// Arithmetic saturates instead of overflowing.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stride(i64);

impl Stride {
  pub const ZERO: Stride = Stride(0);

  #[inline]
  pub const fn nanoseconds(n: i64) -> Self { Stride(n) }

  #[inline]
  pub const fn microseconds(n: i64) -> Self { Stride(n.saturating_mul(1_000)) }

  #[inline]
  pub const fn milliseconds(n: i64) -> Self { Stride(n.saturating_mul(1_000_000)) }

  #[inline]
  pub const fn seconds(n: i64) -> Self { Stride(n.saturating_mul(1_000_000_000)) }

  /// Fractional seconds, rounded to the nearest nanosecond.
  pub fn seconds_f64(secs: f64) -> Self { Stride((secs * 1e9).round() as i64) }

  #[inline]
  pub const fn as_nanos(self) -> i64 { self.0 }

  #[inline]
  pub const fn is_negative(self) -> bool { self.0 < 0 }

  /// The stride as a `Duration`; negative strides become zero.
  #[inline]
  pub fn to_duration(self) -> Duration { Duration::from_nanos(self.0.max(0) as u64) }
}

impl From<Duration> for Stride {
  fn from(d: Duration) -> Self { Stride(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)) }
}

impl Add for Stride {
  type Output = Stride;

  #[inline]
  fn add(self, rhs: Stride) -> Stride { Stride(self.0.saturating_add(rhs.0)) }
}

impl Sub for Stride {
  type Output = Stride;

  #[inline]
  fn sub(self, rhs: Stride) -> Stride { Stride(self.0.saturating_sub(rhs.0)) }
}

impl Mul<i64> for Stride {
  type Output = Stride;

  #[inline]
  fn mul(self, rhs: i64) -> Stride { Stride(self.0.saturating_mul(rhs)) }
}

impl Neg for Stride {
  type Output = Stride;

  #[inline]
  fn neg(self) -> Stride { Stride(self.0.saturating_neg()) }
}

impl AddAssign for Stride {
  #[inline]
  fn add_assign(&mut self, rhs: Stride) { *self = *self + rhs }
}

impl SubAssign for Stride {
  #[inline]
  fn sub_assign(&mut self, rhs: Stride) { *self = *self - rhs }
}

impl Debug for Stride {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "Stride({}ns)", self.0) }
}

impl Display for Stride {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let abs = Duration::from_nanos(self.0.unsigned_abs());
    if self.is_negative() { write!(f, "-{abs:?}") } else { write!(f, "{abs:?}") }
  }
}

/// A point on a scheduler's clock.
pub trait SchedulerTime: Copy + Ord + Debug + Send + Sync + 'static {
  /// This time moved by `stride`.
  fn advanced(self, stride: Stride) -> Self;

  /// The stride that takes `self` to `other`.
  fn distance_to(self, other: Self) -> Stride;
}

impl SchedulerTime for Instant {
  fn advanced(self, stride: Stride) -> Self {
    let magnitude = Duration::from_nanos(stride.as_nanos().unsigned_abs());
    let moved =
      if stride.is_negative() { self.checked_sub(magnitude) } else { self.checked_add(magnitude) };
    moved.unwrap_or(self)
  }

  fn distance_to(self, other: Self) -> Stride {
    if other >= self { Stride::from(other - self) } else { -Stride::from(self - other) }
  }
}

/// Runs actions now, later, or repeatedly.
///
/// The `_with` methods are the required surface; the shorter forms fill in
/// the scheduler's minimum tolerance and no options.
pub trait Scheduler: Clone + Send + Sync + 'static {
  type Time: SchedulerTime;
  /// Scheduler specific knobs. Every scheduler in this crate uses `()`.
  type Options: Send + Sync + 'static;

  fn now(&self) -> Self::Time;

  /// The smallest tolerance the scheduler honors for timed work.
  fn minimum_tolerance(&self) -> Stride;

  /// Runs `action` at the scheduler's next opportunity.
  fn schedule_with(&self, options: Option<Self::Options>, action: impl FnOnce() + Send + 'static);

  /// Runs `action` no earlier than `date`.
  fn schedule_after_with(
    &self,
    date: Self::Time,
    tolerance: Stride,
    options: Option<Self::Options>,
    action: impl FnOnce() + Send + 'static,
  );

  /// Runs `action` at `date` and every `interval` after it until the returned
  /// token is cancelled.
  fn schedule_repeating_with(
    &self,
    date: Self::Time,
    interval: Stride,
    tolerance: Stride,
    options: Option<Self::Options>,
    action: impl FnMut() + Send + 'static,
  ) -> AnyCancellable;

  #[inline]
  fn schedule(&self, action: impl FnOnce() + Send + 'static) { self.schedule_with(None, action) }

  #[inline]
  fn schedule_after(&self, date: Self::Time, action: impl FnOnce() + Send + 'static) {
    self.schedule_after_with(date, self.minimum_tolerance(), None, action)
  }

  #[inline]
  fn schedule_repeating(
    &self,
    date: Self::Time,
    interval: Stride,
    action: impl FnMut() + Send + 'static,
  ) -> AnyCancellable {
    self.schedule_repeating_with(date, interval, self.minimum_tolerance(), None, action)
  }
}

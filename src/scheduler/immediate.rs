use std::time::Instant;

use super::{Scheduler, Stride};
use crate::subscription::AnyCancellable;

/// Runs every action synchronously on the calling thread, ignoring dates.
///
/// A repeating schedule runs its action once, since there is no later to
/// repeat in.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  type Time = Instant;
  type Options = ();

  #[inline]
  fn now(&self) -> Instant { Instant::now() }

  #[inline]
  fn minimum_tolerance(&self) -> Stride { Stride::ZERO }

  #[inline]
  fn schedule_with(&self, _: Option<()>, action: impl FnOnce() + Send + 'static) { action() }

  #[inline]
  fn schedule_after_with(
    &self,
    _: Instant,
    _: Stride,
    _: Option<()>,
    action: impl FnOnce() + Send + 'static,
  ) {
    action()
  }

  fn schedule_repeating_with(
    &self,
    _: Instant,
    _: Stride,
    _: Stride,
    _: Option<()>,
    mut action: impl FnMut() + Send + 'static,
  ) -> AnyCancellable {
    action();
    AnyCancellable::empty()
  }
}

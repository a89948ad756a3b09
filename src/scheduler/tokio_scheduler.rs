use std::time::Instant;

use tokio::runtime::Handle;

use super::{Scheduler, SchedulerTime, Stride};
use crate::subscription::AnyCancellable;

/// Runs work as tasks on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  handle: Handle,
}

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { TokioScheduler { handle } }

  /// A scheduler for the runtime the caller is running in.
  ///
  /// # Panics
  /// When called outside a tokio runtime.
  pub fn current() -> Self { Self::new(Handle::current()) }
}

impl Scheduler for TokioScheduler {
  type Time = Instant;
  type Options = ();

  #[inline]
  fn now(&self) -> Instant { Instant::now() }

  /// Tokio timers have millisecond granularity.
  #[inline]
  fn minimum_tolerance(&self) -> Stride { Stride::milliseconds(1) }

  fn schedule_with(&self, _: Option<()>, action: impl FnOnce() + Send + 'static) {
    self.handle.spawn(async move { action() });
  }

  fn schedule_after_with(
    &self,
    date: Instant,
    _: Stride,
    _: Option<()>,
    action: impl FnOnce() + Send + 'static,
  ) {
    self.handle.spawn(async move {
      tokio::time::sleep_until(date.into()).await;
      action();
    });
  }

  fn schedule_repeating_with(
    &self,
    date: Instant,
    interval: Stride,
    _: Stride,
    _: Option<()>,
    mut action: impl FnMut() + Send + 'static,
  ) -> AnyCancellable {
    let task = self.handle.spawn(async move {
      let mut next = date;
      loop {
        tokio::time::sleep_until(next.into()).await;
        action();
        next = next.advanced(interval.max(Stride::nanoseconds(1)));
      }
    });
    AnyCancellable::new(move || task.abort())
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, time::Duration};

  use super::*;
  use crate::{atomic::Atomic, subscription::Cancellable};

  #[tokio::test(flavor = "multi_thread")]
  async fn delayed_and_repeating_work() {
    let scheduler = TokioScheduler::current();
    let fired = Arc::new(Atomic::new(false));
    let f = fired.clone();
    scheduler.schedule_after(scheduler.now().advanced(Stride::milliseconds(10)), move || f.store(true));
    assert!(!fired.load());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fired.load());

    let ticks = Arc::new(Atomic::new(0usize));
    let t = ticks.clone();
    let token = scheduler.schedule_repeating(scheduler.now(), Stride::milliseconds(5), move || {
      t.add(1);
    });
    tokio::time::sleep(Duration::from_millis(40)).await;
    token.cancel();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let seen = ticks.load();
    assert!(seen >= 2);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(ticks.load(), seen);
  }
}

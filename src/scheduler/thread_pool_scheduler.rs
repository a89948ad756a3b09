use std::time::{Duration, Instant};

use futures::{executor::ThreadPool, future};
use once_cell::sync::Lazy;
use tracing::debug;

use super::{Scheduler, SchedulerTime, Stride};
use crate::subscription::AnyCancellable;

static DEFAULT_POOL: Lazy<ThreadPool> = Lazy::new(|| {
  debug!("starting the default thread pool");
  ThreadPool::builder()
    .name_prefix("rxpipe-")
    .create()
    .expect("the default thread pool could not start")
});

/// Runs work on a `futures` thread pool.
///
/// [`ThreadPoolScheduler::default`] shares one lazily started process-wide
/// pool; [`ThreadPoolScheduler::new`] runs on a pool of your own.
#[derive(Clone)]
pub struct ThreadPoolScheduler {
  pool: ThreadPool,
}

impl ThreadPoolScheduler {
  pub fn new(pool: ThreadPool) -> Self { ThreadPoolScheduler { pool } }
}

impl Default for ThreadPoolScheduler {
  fn default() -> Self { Self::new(DEFAULT_POOL.clone()) }
}

impl std::fmt::Debug for ThreadPoolScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("ThreadPoolScheduler")
  }
}

async fn sleep(duration: Duration) {
  if duration.is_zero() {
    return;
  }
  #[cfg(feature = "timer")]
  futures_time::task::sleep(duration.into()).await;
  #[cfg(not(feature = "timer"))]
  std::thread::sleep(duration);
}

async fn sleep_until(date: Instant) { sleep(date.saturating_duration_since(Instant::now())).await }

impl Scheduler for ThreadPoolScheduler {
  type Time = Instant;
  type Options = ();

  #[inline]
  fn now(&self) -> Instant { Instant::now() }

  #[inline]
  fn minimum_tolerance(&self) -> Stride { Stride::ZERO }

  fn schedule_with(&self, _: Option<()>, action: impl FnOnce() + Send + 'static) {
    self.pool.spawn_ok(future::lazy(move |_| action()));
  }

  fn schedule_after_with(
    &self,
    date: Instant,
    _: Stride,
    _: Option<()>,
    action: impl FnOnce() + Send + 'static,
  ) {
    self.pool.spawn_ok(async move {
      sleep_until(date).await;
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
    let timer = async move {
      let mut next = date;
      loop {
        sleep_until(next).await;
        action();
        next = next.advanced(interval.max(Stride::nanoseconds(1)));
      }
    };
    let (timer, handle) = future::abortable(timer);
    self.pool.spawn_ok(async move {
      let _ = timer.await;
    });
    AnyCancellable::new(move || handle.abort())
  }
}

//! Virtual-time scheduler for deterministic tests of time-based operators.
//!
//! Time only moves when told to. Scheduled work runs synchronously on the
//! thread that calls [`TestScheduler::advance_by`], [`TestScheduler::advance_to`]
//! or [`TestScheduler::flush`], in order of due time, FIFO among tasks due at
//! the same time.
//!
//! ```rust
//! use rxpipe::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
//! let h = hits.clone();
//! scheduler.schedule_after(scheduler.now().advanced(Stride::milliseconds(100)), move || {
//!   h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
//! });
//! scheduler.advance_by(Stride::milliseconds(99));
//! assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);
//! scheduler.advance_by(Stride::milliseconds(1));
//! assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
//! ```

use std::{cmp::Ordering, collections::BinaryHeap, fmt::Debug, sync::Arc};

use parking_lot::Mutex;

use super::{Scheduler, SchedulerTime, Stride};
use crate::{atomic::Atomic, subscription::AnyCancellable};

/// A point on a [`TestScheduler`] clock: the stride since the clock started.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VirtualTime(Stride);

impl VirtualTime {
  pub const ZERO: VirtualTime = VirtualTime(Stride::ZERO);

  #[inline]
  pub fn since_start(self) -> Stride { self.0 }
}

impl SchedulerTime for VirtualTime {
  #[inline]
  fn advanced(self, stride: Stride) -> Self { VirtualTime(self.0 + stride) }

  #[inline]
  fn distance_to(self, other: Self) -> Stride { other.0 - self.0 }
}

enum Work {
  Once(Box<dyn FnOnce() + Send>),
  Repeating { action: Box<dyn FnMut() + Send>, interval: Stride, cancelled: Arc<Atomic<bool>> },
}

struct ScheduledTask {
  due: VirtualTime,
  seq: u64,
  work: Work,
}

impl ScheduledTask {
  fn is_cancelled(&self) -> bool {
    matches!(&self.work, Work::Repeating { cancelled, .. } if cancelled.load())
  }
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by sequence.
    other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
  }
}

#[derive(Default)]
struct State {
  now: VirtualTime,
  queue: BinaryHeap<ScheduledTask>,
  next_seq: u64,
}

impl State {
  fn push(&mut self, due: VirtualTime, work: Work) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.queue.push(ScheduledTask { due, seq, work });
  }
}

/// A virtual-time scheduler. Clones share one clock and one queue.
#[derive(Clone, Default)]
pub struct TestScheduler(Arc<Mutex<State>>);

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  /// Number of tasks waiting to run, not counting cancelled timers.
  pub fn pending_count(&self) -> usize {
    self.0.lock().queue.iter().filter(|t| !t.is_cancelled()).count()
  }

  #[inline]
  pub fn is_empty(&self) -> bool { self.pending_count() == 0 }

  /// Moves the clock forward by `stride`, running everything that falls due.
  pub fn advance_by(&self, stride: Stride) {
    let target = self.0.lock().now.advanced(stride);
    self.advance_to(target);
  }

  /// Moves the clock to `time`, running everything due at or before it. The
  /// clock never moves backwards.
  pub fn advance_to(&self, time: VirtualTime) {
    self.run_until(Some(time));
    let mut state = self.0.lock();
    if state.now < time {
      state.now = time;
    }
  }

  /// Runs every pending task, moving the clock to each task's due time.
  ///
  /// Does not return while an uncancelled repeating timer is scheduled.
  pub fn flush(&self) { self.run_until(None) }

  fn run_until(&self, limit: Option<VirtualTime>) {
    loop {
      let task = {
        let mut state = self.0.lock();
        let due = match state.queue.peek() {
          Some(next) if limit.map_or(true, |limit| next.due <= limit) => next.due,
          _ => return,
        };
        if state.now < due {
          state.now = due;
        }
        state.queue.pop()
      };
      let Some(task) = task else { return };
      // Tasks run without the lock so they can schedule more work.
      match task.work {
        Work::Once(action) => action(),
        Work::Repeating { mut action, interval, cancelled } => {
          if cancelled.load() {
            continue;
          }
          action();
          if !cancelled.load() {
            let next = task.due.advanced(interval.max(Stride::nanoseconds(1)));
            self.0.lock().push(next, Work::Repeating { action, interval, cancelled });
          }
        }
      }
    }
  }
}

impl Debug for TestScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.0.lock();
    f.debug_struct("TestScheduler").field("now", &state.now).field("pending", &state.queue.len()).finish()
  }
}

impl Scheduler for TestScheduler {
  type Time = VirtualTime;
  type Options = ();

  #[inline]
  fn now(&self) -> VirtualTime { self.0.lock().now }

  #[inline]
  fn minimum_tolerance(&self) -> Stride { Stride::ZERO }

  fn schedule_with(&self, _: Option<()>, action: impl FnOnce() + Send + 'static) {
    let mut state = self.0.lock();
    let now = state.now;
    state.push(now, Work::Once(Box::new(action)));
  }

  fn schedule_after_with(
    &self,
    date: VirtualTime,
    _: Stride,
    _: Option<()>,
    action: impl FnOnce() + Send + 'static,
  ) {
    let mut state = self.0.lock();
    let due = date.max(state.now);
    state.push(due, Work::Once(Box::new(action)));
  }

  fn schedule_repeating_with(
    &self,
    date: VirtualTime,
    interval: Stride,
    _: Stride,
    _: Option<()>,
    action: impl FnMut() + Send + 'static,
  ) -> AnyCancellable {
    let cancelled = Arc::new(Atomic::new(false));
    let mut state = self.0.lock();
    let due = date.max(state.now);
    state.push(due, Work::Repeating { action: Box::new(action), interval, cancelled: cancelled.clone() });
    AnyCancellable::new(move || cancelled.store(true))
  }
}

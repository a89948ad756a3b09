//! CollectByTime operator implementation.
//!
//! Values are buffered and published as a batch every time the window timer
//! fires. With [`TimeGroupingStrategy::ByTimeOrCount`] a batch is also
//! published as soon as it holds `count` values. A batch is only published
//! while the downstream has demand; otherwise it waits for the next request
//! (full batches) or the next tick (partial ones).

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{
  lock::{Lock, MutexLock},
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// How [`Publisher::collect_by_time`] closes a batch.
pub enum TimeGroupingStrategy<S> {
  /// Every `Stride` on the scheduler.
  ByTime(S, Stride),
  /// Every `Stride`, or earlier once the batch holds `usize` values.
  ByTimeOrCount(S, Stride, usize),
}

impl<S: Clone> Clone for TimeGroupingStrategy<S> {
  fn clone(&self) -> Self {
    match self {
      TimeGroupingStrategy::ByTime(s, interval) => TimeGroupingStrategy::ByTime(s.clone(), *interval),
      TimeGroupingStrategy::ByTimeOrCount(s, interval, count) => {
        TimeGroupingStrategy::ByTimeOrCount(s.clone(), *interval, *count)
      }
    }
  }
}

impl<S> TimeGroupingStrategy<S> {
  fn parts(&self) -> (&S, Stride, Option<usize>) {
    match self {
      TimeGroupingStrategy::ByTime(s, interval) => (s, *interval, None),
      TimeGroupingStrategy::ByTimeOrCount(s, interval, count) => (s, *interval, Some(*count)),
    }
  }
}

/// Publisher returned by [`Publisher::collect_by_time`].
#[derive(Clone)]
pub struct CollectByTime<U, S> {
  upstream: U,
  strategy: TimeGroupingStrategy<S>,
}

impl<U, S> CollectByTime<U, S> {
  /// # Panics
  /// When a `ByTimeOrCount` count is zero.
  pub fn new(upstream: U, strategy: TimeGroupingStrategy<S>) -> Self {
    if let TimeGroupingStrategy::ByTimeOrCount(_, _, count) = &strategy {
      assert!(*count > 0, "collect_by_time needs a positive count");
    }
    CollectByTime { upstream, strategy }
  }
}

impl<U: Publisher, S: Scheduler> Publisher for CollectByTime<U, S> {
  type Output = Vec<U::Output>;
  type Failure = U::Failure;

  fn receive<Sub>(&self, subscriber: Sub)
  where
    Sub: Subscriber<Input = Vec<U::Output>, Failure = U::Failure>,
  {
    let (scheduler, interval, count) = self.strategy.parts();
    subscribe_pipe(
      &self.upstream,
      CollectByTimePipe {
        connection: Connection::new("collect_by_time", subscriber),
        scheduler: scheduler.clone(),
        interval,
        count,
        state: Mutex::new(WindowState { buffer: vec![], demand: Demand::NONE, requested: false }),
        delivery: MutexLock::recursive(),
        timer: Mutex::new(None),
      },
    )
  }
}

struct WindowState<T> {
  buffer: Vec<T>,
  /// Batches the downstream still wants.
  demand: Demand,
  requested: bool,
}

struct CollectByTimePipe<T, D, S> {
  connection: Connection<D>,
  scheduler: S,
  interval: Stride,
  count: Option<usize>,
  state: Mutex<WindowState<T>>,
  /// Serializes deliveries from the timer and from upstream.
  delivery: MutexLock,
  timer: Mutex<Option<AnyCancellable>>,
}

impl<T, D, S> CollectByTimePipe<T, D, S>
where
  T: Send + 'static,
  D: Subscriber<Input = Vec<T>>,
  S: Scheduler,
{
  /// Publishes buffered batches while the downstream has demand. Partial
  /// batches only go out when `partial` is set.
  fn emit(&self, partial: bool) {
    self.delivery.locking(|| loop {
      let batch = {
        let mut state = self.state.lock();
        if state.demand.is_none() || state.buffer.is_empty() {
          return;
        }
        let take = match self.count {
          Some(count) if state.buffer.len() >= count => count,
          Some(_) | None if partial => state.buffer.len(),
          _ => return,
        };
        state.demand -= 1;
        let rest = state.buffer.split_off(take);
        std::mem::replace(&mut state.buffer, rest)
      };
      let more = self.connection.forward(batch);
      if more.has_any() {
        self.state.lock().demand += more;
        if let Some(count) = self.count {
          self.connection.request(more * count);
        }
      }
    })
  }

  fn stop_timer(&self) {
    let timer = self.timer.lock().take();
    if let Some(timer) = timer {
      timer.cancel();
    }
  }
}

impl<T, D, S> Pipe for CollectByTimePipe<T, D, S>
where
  T: Send + 'static,
  D: Subscriber<Input = Vec<T>>,
  S: Scheduler,
{
  type Input = T;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn did_subscribe(this: &Arc<Self>) {
    let weak: Weak<Self> = Arc::downgrade(this);
    let first = this.scheduler.now().advanced(this.interval);
    let timer = this.scheduler.schedule_repeating(first, this.interval, move || {
      if let Some(pipe) = weak.upgrade() {
        pipe.emit(true);
      }
    });
    *this.timer.lock() = Some(timer);
    if this.connection.is_stopped() {
      this.stop_timer();
    }
  }

  fn request(&self, demand: Demand) {
    if demand.is_none() || self.connection.is_stopped() {
      return;
    }
    let first = {
      let mut state = self.state.lock();
      state.demand += demand;
      !std::mem::replace(&mut state.requested, true)
    };
    match self.count {
      Some(count) => self.connection.request(demand * count),
      None if first => self.connection.request(Demand::UNLIMITED),
      None => {}
    }
    self.emit(false);
  }

  fn receive_input(&self, input: T) -> Demand {
    self.state.lock().buffer.push(input);
    if self.count.is_some() {
      self.emit(false);
    }
    Demand::NONE
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.stop_timer();
    let mut rest = std::mem::take(&mut self.state.lock().buffer);
    self.delivery.locking(|| {
      if completion.is_finished() {
        while !rest.is_empty() {
          let take = self.count.unwrap_or(rest.len()).min(rest.len());
          let tail = rest.split_off(take);
          self.connection.forward(std::mem::replace(&mut rest, tail));
        }
      }
      self.connection.forward_completion(completion)
    })
  }

  fn cancel(&self) {
    self.stop_timer();
    self.state.lock().buffer.clear();
    self.connection.cancel();
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Manual, Recorder},
  };

  #[test]
  fn batches_per_window() {
    let scheduler = TestScheduler::new();
    let source = Manual::<i32, Never>::new();
    let rec = Recorder::<Vec<i32>, Never>::unlimited();
    source
      .clone()
      .collect_by_time(TimeGroupingStrategy::ByTime(scheduler.clone(), Stride::milliseconds(10)))
      .receive(rec.clone());
    assert_eq!(source.log().requests(), vec![Demand::UNLIMITED]);

    source.send(1);
    source.send(2);
    scheduler.advance_by(Stride::milliseconds(10));
    assert_eq!(rec.values(), vec![vec![1, 2]]);

    scheduler.advance_by(Stride::milliseconds(10));
    assert_eq!(rec.values().len(), 1, "empty windows publish nothing");

    source.send(3);
    source.finish();
    assert_eq!(rec.values(), vec![vec![1, 2], vec![3]]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
    assert!(scheduler.is_empty());
  }

  #[test]
  fn count_closes_a_window_early() {
    let scheduler = TestScheduler::new();
    let source = Manual::<i32, Never>::new();
    let rec = Recorder::<Vec<i32>, Never>::new(Demand::max(2), Demand::NONE);
    source
      .clone()
      .collect_by_time(TimeGroupingStrategy::ByTimeOrCount(scheduler.clone(), Stride::milliseconds(10), 2))
      .receive(rec.clone());
    assert_eq!(source.log().requests(), vec![Demand::max(4)]);

    source.send(1);
    source.send(2);
    assert_eq!(rec.values(), vec![vec![1, 2]]);
    source.send(3);
    scheduler.advance_by(Stride::milliseconds(10));
    assert_eq!(rec.values(), vec![vec![1, 2], vec![3]]);
  }

  #[test]
  fn batches_wait_for_demand() {
    let scheduler = TestScheduler::new();
    let source = Manual::<i32, Never>::new();
    let rec = Recorder::<Vec<i32>, Never>::lazy();
    source
      .clone()
      .collect_by_time(TimeGroupingStrategy::ByTime(scheduler.clone(), Stride::milliseconds(5)))
      .receive(rec.clone());
    rec.request(Demand::max(1));
    source.send(1);
    scheduler.advance_by(Stride::milliseconds(5));
    source.send(2);
    source.send(3);
    scheduler.advance_by(Stride::milliseconds(5));
    assert_eq!(rec.values(), vec![vec![1]]);
    rec.request(Demand::max(1));
    scheduler.advance_by(Stride::milliseconds(5));
    assert_eq!(rec.values(), vec![vec![1], vec![2, 3]]);
  }

  #[test]
  fn cancel_stops_the_timer() {
    let scheduler = TestScheduler::new();
    let source = Manual::<i32, Never>::new();
    let rec = Recorder::<Vec<i32>, Never>::unlimited();
    source
      .clone()
      .collect_by_time(TimeGroupingStrategy::ByTime(scheduler.clone(), Stride::milliseconds(5)))
      .receive(rec.clone());
    assert_eq!(scheduler.pending_count(), 1);
    source.send(1);
    rec.cancel();
    assert_eq!(scheduler.pending_count(), 0);
    scheduler.advance_by(Stride::milliseconds(50));
    assert!(rec.values().is_empty());
    assert_eq!(source.log().cancels(), 1);
  }
}

//! Merge operator implementation.
//!
//! Both upstreams feed one shared [`MergeInner`]. Downstream demand is
//! passed to each upstream in full, so values that arrive while the
//! downstream has no demand left are buffered and released by the next
//! request. Deliveries from both sides are serialized by a recursive lock;
//! the buffer and counters live in a separate mutex that is never held while
//! calling out.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
  atomic::Atomic,
  lock::{Lock, MutexLock},
  pipe::Connection,
  prelude::*,
};

/// Publisher returned by [`Publisher::merge`].
///
/// Finishes once both upstreams finish. The first failure fails the merged
/// stream and cancels the other side.
///
/// # Example
///
/// ```
/// use rxpipe::prelude::*;
///
/// let numbers = PassthroughSubject::<i32, Never>::new();
/// let evens = numbers.clone().filter(|v| v % 2 == 0);
/// let odds = numbers.clone().filter(|v| v % 2 != 0).map(|v| v * 10);
///
/// let _seen = evens.merge(odds).sink_value(|v| println!("{v}"));
/// numbers.send(1);
/// numbers.send(2);
/// ```
#[derive(Clone)]
pub struct Merge<A, B> {
  a: A,
  b: B,
}

impl<A, B> Merge<A, B> {
  pub fn new(a: A, b: B) -> Self { Merge { a, b } }
}

impl<A, B> Publisher for Merge<A, B>
where
  A: Publisher,
  B: Publisher<Output = A::Output, Failure = A::Failure>,
{
  type Output = A::Output;
  type Failure = A::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = A::Output, Failure = A::Failure>,
  {
    let inner = Arc::new(MergeInner {
      connection: Connection::new("merge", subscriber),
      delivery: MutexLock::recursive(),
      state: Mutex::new(MergeState {
        demand: Demand::NONE,
        requested: Demand::NONE,
        buffer: VecDeque::new(),
        finished: 0,
      }),
      children: Mutex::new([None, None]),
    });
    let own = AnySubscription::new(MergeSubscription(inner.clone()));
    inner.connection.downstream().receive_subscription(own);
    self.a.receive(MergeChild::new(inner.clone(), 0));
    self.b.receive(MergeChild::new(inner, 1));
  }
}

struct MergeState<T> {
  /// What the downstream still wants.
  demand: Demand,
  /// Everything the downstream ever asked for, replayed to a late upstream.
  requested: Demand,
  buffer: VecDeque<T>,
  finished: usize,
}

struct MergeInner<D: Subscriber> {
  connection: Connection<D>,
  delivery: MutexLock,
  state: Mutex<MergeState<D::Input>>,
  children: Mutex<[Option<AnySubscription>; 2]>,
}

impl<D: Subscriber> MergeInner<D> {
  fn attach(&self, index: usize, subscription: AnySubscription) {
    let requested = {
      let mut children = self.children.lock();
      if self.connection.is_stopped() || children[index].is_some() {
        drop(children);
        subscription.cancel();
        return;
      }
      children[index] = Some(subscription.clone());
      self.state.lock().requested
    };
    if requested.has_any() {
      subscription.request(requested);
    }
  }

  fn request(&self, demand: Demand) {
    if demand.is_none() || self.connection.is_stopped() {
      return;
    }
    {
      let mut state = self.state.lock();
      state.demand += demand;
      state.requested += demand;
    }
    self.drain();
    let children: Vec<_> = self.children.lock().iter().flatten().cloned().collect();
    for child in children {
      child.request(demand);
    }
  }

  /// Releases buffered values while there is demand, then finishes if both
  /// sides already have.
  fn drain(&self) {
    self.delivery.locking(|| loop {
      let value = {
        let mut state = self.state.lock();
        if state.buffer.is_empty() {
          let done = state.finished == 2;
          drop(state);
          if done {
            self.finish();
          }
          return;
        }
        if state.demand.is_none() {
          return;
        }
        state.demand -= 1;
        state.buffer.pop_front()
      };
      if let Some(value) = value {
        let more = self.connection.forward(value);
        if more.has_any() {
          self.request(more);
        }
      }
    })
  }

  fn receive(&self, value: D::Input) -> Demand {
    self.delivery.locking(|| {
      let value = {
        let mut state = self.state.lock();
        if state.demand.is_none() || !state.buffer.is_empty() {
          state.buffer.push_back(value);
          return Demand::NONE;
        }
        state.demand -= 1;
        value
      };
      let more = self.connection.forward(value);
      if more.has_any() {
        self.request(more);
      }
      Demand::NONE
    })
  }

  fn complete(&self, index: usize, completion: Completion<D::Failure>) {
    match completion {
      Completion::Finished => {
        let done = {
          let mut state = self.state.lock();
          state.finished += 1;
          state.finished == 2 && state.buffer.is_empty()
        };
        self.children.lock()[index] = None;
        if done {
          self.finish();
        }
      }
      Completion::Failure(e) => {
        self.cancel_children();
        self.state.lock().buffer.clear();
        self.delivery.locking(|| self.connection.fail(e));
      }
    }
  }

  fn finish(&self) {
    self.delivery.locking(|| self.connection.finish());
    self.children.lock().iter_mut().for_each(|c| *c = None);
  }

  fn cancel_children(&self) {
    let children = std::mem::take(&mut *self.children.lock());
    for child in children.into_iter().flatten() {
      child.cancel();
    }
  }

  fn cancel(&self) {
    if self.connection.halt() {
      self.state.lock().buffer.clear();
      self.cancel_children();
    }
  }
}

struct MergeChild<D: Subscriber> {
  id: CombineIdentifier,
  index: usize,
  done: Atomic<bool>,
  inner: Arc<MergeInner<D>>,
}

impl<D: Subscriber> MergeChild<D> {
  fn new(inner: Arc<MergeInner<D>>, index: usize) -> Self {
    MergeChild { id: CombineIdentifier::new(), index, done: Atomic::new(false), inner }
  }
}

impl<D: Subscriber> Identity for MergeChild<D> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<D: Subscriber> Subscriber for MergeChild<D> {
  type Input = D::Input;
  type Failure = D::Failure;

  #[inline]
  fn receive_subscription(&self, subscription: AnySubscription) { self.inner.attach(self.index, subscription) }

  fn receive(&self, input: D::Input) -> Demand {
    if self.done.load() || self.inner.connection.is_stopped() {
      return Demand::NONE;
    }
    self.inner.receive(input)
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    if !self.done.exchange(true) && !self.inner.connection.is_stopped() {
      self.inner.complete(self.index, completion)
    }
  }
}

struct MergeSubscription<D: Subscriber>(Arc<MergeInner<D>>);

impl<D: Subscriber> Cancellable for MergeSubscription<D> {
  #[inline]
  fn cancel(&self) { self.0.cancel() }
}

impl<D: Subscriber> Identity for MergeSubscription<D> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.connection.id() }
}

impl<D: Subscriber> Subscription for MergeSubscription<D> {
  #[inline]
  fn request(&self, demand: Demand) { self.0.request(demand) }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::{
    prelude::*,
    test_util::{Manual, Recorder},
  };

  #[test]
  fn interleaves_and_finishes_after_both() {
    let a = Manual::<i32, Never>::new();
    let b = Manual::<i32, Never>::new();
    let rec = Recorder::<i32, Never>::unlimited();
    Arc::clone(&a).merge(Arc::clone(&b)).receive(rec.clone());
    a.send(1);
    b.send(10);
    a.send(2);
    a.finish();
    assert!(rec.completions().is_empty());
    b.send(20);
    b.finish();
    assert_eq!(rec.values(), vec![1, 10, 2, 20]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn demand_goes_to_both_and_excess_is_buffered() {
    let a = Manual::<i32, Never>::new();
    let b = Manual::<i32, Never>::new();
    let rec = Recorder::<i32, Never>::new(Demand::max(1), Demand::NONE);
    Arc::clone(&a).merge(Arc::clone(&b)).receive(rec.clone());
    assert_eq!(a.log().requests(), vec![Demand::max(1)]);
    assert_eq!(b.log().requests(), vec![Demand::max(1)]);

    a.send(1);
    b.send(2);
    b.finish();
    a.finish();
    assert_eq!(rec.values(), vec![1]);
    assert!(rec.completions().is_empty());

    rec.request(Demand::max(1));
    assert_eq!(rec.values(), vec![1, 2]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn failure_cancels_the_other_side() {
    let a = Manual::<i32, &str>::new();
    let b = Manual::<i32, &str>::new();
    let rec = Recorder::<i32, &str>::unlimited();
    Arc::clone(&a).merge(Arc::clone(&b)).receive(rec.clone());
    a.send(1);
    b.fail("broken");
    a.send(2);
    a.finish();
    assert_eq!(rec.values(), vec![1]);
    assert_eq!(rec.completions(), vec![Completion::Failure("broken")]);
    assert_eq!(a.log().cancels(), 1);
  }

  #[test]
  fn synchronous_sources_merge_in_subscription_order() {
    let rec = Recorder::<i32, Never>::unlimited();
    sequence(vec![1, 2]).merge(sequence(vec![3])).receive(rec.clone());
    assert_eq!(rec.values(), vec![1, 2, 3]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn cancel_reaches_both_upstreams_once() {
    let a = Manual::<i32, Never>::new();
    let b = Manual::<i32, Never>::new();
    let rec = Recorder::<i32, Never>::unlimited();
    Arc::clone(&a).merge(Arc::clone(&b)).receive(rec.clone());
    rec.cancel();
    rec.cancel();
    assert_eq!((a.log().cancels(), b.log().cancels()), (1, 1));
    assert_eq!(a.send(1), Demand::NONE);
    assert!(rec.values().is_empty());
  }
}

use std::{iter::Peekable, sync::Arc};

use parking_lot::Mutex;

use crate::{atomic::Atomic, prelude::*};

/// Creates a publisher that emits the elements of `elements`, honoring
/// demand, then finishes.
///
/// Each subscriber iterates its own clone of `elements`. An empty sequence
/// finishes as soon as it is subscribed to.
///
/// # Examples
///
/// ```
/// use rxpipe::prelude::*;
///
/// sequence(vec![1, 2, 3])
///   .map(|v| v * 10)
///   .sink_value(|v| println!("{v}"));
/// ```
pub fn sequence<I: IntoIterator>(elements: I) -> Sequence<I> { Sequence(elements) }

#[derive(Clone, Debug)]
pub struct Sequence<I>(pub I);

impl<I> Publisher for Sequence<I>
where
  I: IntoIterator + Clone + Send + Sync,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  type Output = I::Item;
  type Failure = Never;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = I::Item, Failure = Never>,
  {
    let mut iter = self.0.clone().into_iter().peekable();
    if iter.peek().is_none() {
      subscriber.receive_subscription(Subscriptions::empty());
      subscriber.receive_completion(Completion::Finished);
      return;
    }
    let subscription = Arc::new(SequenceSubscription {
      id: CombineIdentifier::new(),
      stop: Atomic::new(false),
      state: Mutex::new(State { iter, demand: Demand::NONE, emitting: false }),
      downstream: subscriber,
    });
    subscription.downstream.receive_subscription(AnySubscription::new(subscription.clone()));
  }
}

struct State<It: Iterator> {
  iter: Peekable<It>,
  demand: Demand,
  emitting: bool,
}

struct SequenceSubscription<It: Iterator, S> {
  id: CombineIdentifier,
  stop: Atomic<bool>,
  state: Mutex<State<It>>,
  downstream: S,
}

enum Step<T> {
  Emit(T, bool),
  Idle,
}

impl<It, S> SequenceSubscription<It, S>
where
  It: Iterator + Send,
  It::Item: Send + 'static,
  S: Subscriber<Input = It::Item, Failure = Never>,
{
  fn next_step(&self) -> Step<It::Item> {
    let mut state = self.state.lock();
    if self.stop.load() || state.demand.is_none() {
      state.emitting = false;
      return Step::Idle;
    }
    match state.iter.next() {
      Some(value) => {
        state.demand -= 1;
        let exhausted = state.iter.peek().is_none();
        Step::Emit(value, exhausted)
      }
      None => {
        state.emitting = false;
        Step::Idle
      }
    }
  }

  /// Drains demand. Only one caller emits at a time; a request arriving
  /// from inside `receive` just adds to the demand the running loop sees.
  fn drain(&self) {
    while let Step::Emit(value, exhausted) = self.next_step() {
      let more = self.downstream.receive(value);
      if exhausted {
        if !self.stop.exchange(true) {
          self.downstream.receive_completion(Completion::Finished);
        }
        return;
      }
      if more.has_any() {
        self.state.lock().demand += more;
      }
    }
  }
}

impl<It, S> Cancellable for SequenceSubscription<It, S>
where
  It: Iterator + Send,
  It::Item: Send,
  S: Send + Sync,
{
  fn cancel(&self) { self.stop.store(true); }
}

impl<It: Iterator, S> Identity for SequenceSubscription<It, S> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<It, S> Subscription for SequenceSubscription<It, S>
where
  It: Iterator + Send,
  It::Item: Send + 'static,
  S: Subscriber<Input = It::Item, Failure = Never>,
{
  fn request(&self, demand: Demand) {
    if self.stop.load() {
      return;
    }
    {
      let mut state = self.state.lock();
      state.demand += demand;
      if state.emitting {
        return;
      }
      state.emitting = true;
    }
    self.drain();
  }
}

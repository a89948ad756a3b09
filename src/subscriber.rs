//! The consumer side of the protocol.

use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use parking_lot::Mutex;

use crate::{
  atomic::Atomic,
  demand::Demand,
  identifier::{CombineIdentifier, Identity},
  subscription::{AnySubscription, Cancellable, Subscription},
};

/// A failure type with no values, for publishers that cannot fail.
pub type Never = std::convert::Infallible;

/// How a stream ended.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Completion<F> {
  Finished,
  Failure(F),
}

impl<F> Completion<F> {
  #[inline]
  pub fn is_finished(&self) -> bool { matches!(self, Completion::Finished) }

  #[inline]
  pub fn failure(self) -> Option<F> {
    match self {
      Completion::Finished => None,
      Completion::Failure(e) => Some(e),
    }
  }

  pub fn map_failure<E>(self, f: impl FnOnce(F) -> E) -> Completion<E> {
    match self {
      Completion::Finished => Completion::Finished,
      Completion::Failure(e) => Completion::Failure(f(e)),
    }
  }
}

/// Receives a subscription, then values, then at most one completion.
///
/// A well-behaved publisher calls `receive_subscription` exactly once, sends
/// no more values than the accumulated demand, and never calls anything
/// after a completion. The `Demand` returned from `receive` is added to the
/// outstanding demand.
pub trait Subscriber: Identity + Send + Sync + 'static {
  type Input: Send + 'static;
  type Failure: Send + 'static;

  fn receive_subscription(&self, subscription: AnySubscription);

  fn receive(&self, input: Self::Input) -> Demand;

  fn receive_completion(&self, completion: Completion<Self::Failure>);
}

impl<S: Subscriber + ?Sized> Subscriber for Arc<S> {
  type Input = S::Input;
  type Failure = S::Failure;

  #[inline]
  fn receive_subscription(&self, subscription: AnySubscription) {
    (**self).receive_subscription(subscription)
  }

  #[inline]
  fn receive(&self, input: Self::Input) -> Demand { (**self).receive(input) }

  #[inline]
  fn receive_completion(&self, completion: Completion<Self::Failure>) {
    (**self).receive_completion(completion)
  }
}

/// A shared, type-erased [`Subscriber`] that keeps the identity of the
/// subscriber it wraps.
pub struct AnySubscriber<I, F>(Arc<dyn Subscriber<Input = I, Failure = F>>);

impl<I, F> Clone for AnySubscriber<I, F> {
  fn clone(&self) -> Self { AnySubscriber(self.0.clone()) }
}

impl<I: Send + 'static, F: Send + 'static> AnySubscriber<I, F> {
  pub fn new<S>(subscriber: S) -> Self
  where
    S: Subscriber<Input = I, Failure = F>,
  {
    AnySubscriber(Arc::new(subscriber))
  }

  /// Builds a subscriber out of three closures.
  pub fn from_fns(
    on_subscription: impl Fn(AnySubscription) + Send + Sync + 'static,
    on_value: impl Fn(I) -> Demand + Send + Sync + 'static,
    on_completion: impl Fn(Completion<F>) + Send + Sync + 'static,
  ) -> Self {
    Self::new(FnSubscriber {
      id: CombineIdentifier::new(),
      on_subscription: Box::new(on_subscription),
      on_value: Box::new(on_value),
      on_completion: Box::new(on_completion),
    })
  }
}

impl<I, F> Identity for AnySubscriber<I, F> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.combine_identifier() }
}

impl<I: Send + 'static, F: Send + 'static> Subscriber for AnySubscriber<I, F> {
  type Input = I;
  type Failure = F;

  #[inline]
  fn receive_subscription(&self, subscription: AnySubscription) {
    self.0.receive_subscription(subscription)
  }

  #[inline]
  fn receive(&self, input: I) -> Demand { self.0.receive(input) }

  #[inline]
  fn receive_completion(&self, completion: Completion<F>) { self.0.receive_completion(completion) }
}

impl<I, F> Debug for AnySubscriber<I, F> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("AnySubscriber").field(&self.combine_identifier()).finish()
  }
}

type OnSubscription = Box<dyn Fn(AnySubscription) + Send + Sync>;
type OnValue<I> = Box<dyn Fn(I) -> Demand + Send + Sync>;
type OnCompletion<F> = Box<dyn Fn(Completion<F>) + Send + Sync>;

struct FnSubscriber<I, F> {
  id: CombineIdentifier,
  on_subscription: OnSubscription,
  on_value: OnValue<I>,
  on_completion: OnCompletion<F>,
}

impl<I, F> Identity for FnSubscriber<I, F> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<I: Send + 'static, F: Send + 'static> Subscriber for FnSubscriber<I, F> {
  type Input = I;
  type Failure = F;

  fn receive_subscription(&self, subscription: AnySubscription) { (self.on_subscription)(subscription) }

  fn receive(&self, input: I) -> Demand { (self.on_value)(input) }

  fn receive_completion(&self, completion: Completion<F>) { (self.on_completion)(completion) }
}

type SinkValue<I> = Box<dyn FnMut(I) + Send>;
type SinkCompletion<F> = Box<dyn FnOnce(Completion<F>) + Send>;

/// A subscriber that requests an unlimited number of values and hands each
/// event to a closure.
///
/// The value closure runs under the sink's own mutex, so it must not feed
/// values back into the same sink synchronously.
pub struct Sink<I, F> {
  id: CombineIdentifier,
  stop: Atomic<bool>,
  subscription: Mutex<Option<AnySubscription>>,
  receive_value: Mutex<SinkValue<I>>,
  receive_completion: Mutex<Option<SinkCompletion<F>>>,
}

impl<I, F> Sink<I, F> {
  pub fn new(
    receive_completion: impl FnOnce(Completion<F>) + Send + 'static,
    receive_value: impl FnMut(I) + Send + 'static,
  ) -> Self {
    Sink {
      id: CombineIdentifier::new(),
      stop: Atomic::new(false),
      subscription: Mutex::new(None),
      receive_value: Mutex::new(Box::new(receive_value)),
      receive_completion: Mutex::new(Some(Box::new(receive_completion))),
    }
  }
}

impl<I, F> Identity for Sink<I, F> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<I: Send + 'static, F: Send + 'static> Subscriber for Sink<I, F> {
  type Input = I;
  type Failure = F;

  fn receive_subscription(&self, subscription: AnySubscription) {
    if self.stop.load() {
      subscription.cancel();
      return;
    }
    let mut slot = self.subscription.lock();
    if slot.is_some() {
      drop(slot);
      tracing::warn!(sink = %self.id, "sink received a second subscription");
      subscription.cancel();
      return;
    }
    *slot = Some(subscription.clone());
    drop(slot);
    subscription.request(Demand::UNLIMITED);
  }

  fn receive(&self, input: I) -> Demand {
    if !self.stop.load() {
      (self.receive_value.lock())(input);
    }
    Demand::NONE
  }

  fn receive_completion(&self, completion: Completion<F>) {
    if self.stop.exchange(true) {
      return;
    }
    self.subscription.lock().take();
    let on_completion = self.receive_completion.lock().take();
    if let Some(on_completion) = on_completion {
      on_completion(completion);
    }
  }
}

impl<I: Send, F: Send> Cancellable for Sink<I, F> {
  fn cancel(&self) {
    if self.stop.exchange(true) {
      return;
    }
    self.receive_completion.lock().take();
    let upstream = self.subscription.lock().take();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }
}

type Setter<T, I> = Box<dyn Fn(&T, I) + Send + Sync>;

/// A subscriber that writes every value into a shared target through a
/// setter, requesting an unlimited number of values.
///
/// The target is released when the stream completes or is cancelled.
pub struct Assign<T, I> {
  id: CombineIdentifier,
  stop: Atomic<bool>,
  subscription: Mutex<Option<AnySubscription>>,
  target: Mutex<Option<Arc<T>>>,
  setter: Setter<T, I>,
}

impl<T, I> Assign<T, I> {
  pub fn new(target: Arc<T>, setter: impl Fn(&T, I) + Send + Sync + 'static) -> Self {
    Assign {
      id: CombineIdentifier::new(),
      stop: Atomic::new(false),
      subscription: Mutex::new(None),
      target: Mutex::new(Some(target)),
      setter: Box::new(setter),
    }
  }

  /// The target, until the stream completes or is cancelled.
  pub fn target(&self) -> Option<Arc<T>> { self.target.lock().clone() }
}

impl<T, I> Identity for Assign<T, I> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<T: Send + Sync + 'static, I: Send + 'static> Subscriber for Assign<T, I> {
  type Input = I;
  type Failure = Never;

  fn receive_subscription(&self, subscription: AnySubscription) {
    let mut slot = self.subscription.lock();
    if self.stop.load() || slot.is_some() {
      drop(slot);
      subscription.cancel();
      return;
    }
    *slot = Some(subscription.clone());
    drop(slot);
    subscription.request(Demand::UNLIMITED);
  }

  fn receive(&self, input: I) -> Demand {
    let target = self.target.lock().clone();
    if let Some(target) = target {
      (self.setter)(&target, input);
    }
    Demand::NONE
  }

  fn receive_completion(&self, _: Completion<Never>) {
    self.stop.store(true);
    self.subscription.lock().take();
    self.target.lock().take();
  }
}

impl<T: Send + Sync, I> Cancellable for Assign<T, I> {
  fn cancel(&self) {
    if self.stop.exchange(true) {
      return;
    }
    self.target.lock().take();
    let upstream = self.subscription.lock().take();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_util::CountingSubscription;

  #[test]
  fn sink_requests_unlimited_once_subscribed() {
    let (sub, log) = CountingSubscription::new();
    let sink = Sink::<i32, Never>::new(|_| {}, |_| {});
    sink.receive_subscription(AnySubscription::new(sub));
    assert_eq!(log.requests(), vec![Demand::UNLIMITED]);
  }

  #[test]
  fn sink_cancels_second_subscription() {
    let (first, first_log) = CountingSubscription::new();
    let (second, second_log) = CountingSubscription::new();
    let sink = Sink::<i32, Never>::new(|_| {}, |_| {});
    sink.receive_subscription(AnySubscription::new(first));
    sink.receive_subscription(AnySubscription::new(second));
    assert_eq!(first_log.cancels(), 0);
    assert_eq!(second_log.cancels(), 1);
  }

  #[test]
  fn sink_completion_is_delivered_once() {
    let hits = Arc::new(Mutex::new(vec![]));
    let h = hits.clone();
    let values = Arc::new(Mutex::new(vec![]));
    let v = values.clone();
    let sink = Sink::<i32, &'static str>::new(move |c| h.lock().push(c), move |x| v.lock().push(x));
    assert_eq!(sink.receive(1), Demand::NONE);
    sink.receive_completion(Completion::Failure("boom"));
    sink.receive_completion(Completion::Finished);
    sink.receive(2);
    assert_eq!(*hits.lock(), vec![Completion::Failure("boom")]);
    assert_eq!(*values.lock(), vec![1]);
  }

  #[test]
  fn cancelled_sink_cancels_upstream_once_and_drops_late_subscription() {
    let (sub, log) = CountingSubscription::new();
    let sink = Sink::<i32, Never>::new(|_| {}, |_| {});
    sink.receive_subscription(AnySubscription::new(sub));
    sink.cancel();
    sink.cancel();
    assert_eq!(log.cancels(), 1);

    let (late, late_log) = CountingSubscription::new();
    sink.receive_subscription(AnySubscription::new(late));
    assert_eq!(late_log.cancels(), 1);
    assert!(late_log.requests().is_empty());
  }

  #[test]
  fn any_subscriber_keeps_identity() {
    let sink = Arc::new(Sink::<i32, Never>::new(|_| {}, |_| {}));
    let erased = AnySubscriber::new(sink.clone());
    assert_eq!(erased.combine_identifier(), sink.combine_identifier());
    assert_eq!(erased.clone().combine_identifier(), sink.combine_identifier());
  }

  #[test]
  fn from_fns_routes_every_event() {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    let s = AnySubscriber::<i32, Never>::from_fns(
      move |_| l1.lock().push("subscription".to_string()),
      move |v| {
        l2.lock().push(format!("value {v}"));
        Demand::max(1)
      },
      move |_| l3.lock().push("completion".to_string()),
    );
    let (sub, _) = CountingSubscription::new();
    s.receive_subscription(AnySubscription::new(sub));
    assert_eq!(s.receive(3), Demand::max(1));
    s.receive_completion(Completion::Finished);
    assert_eq!(*log.lock(), vec!["subscription", "value 3", "completion"]);
  }

  #[test]
  fn assign_writes_into_the_target_until_completion() {
    let (sub, log) = CountingSubscription::new();
    let target = Arc::new(Atomic::new(0));
    let assign = Assign::new(target.clone(), |t: &Atomic<i32>, v| t.store(v));
    assign.receive_subscription(AnySubscription::new(sub));
    assert_eq!(log.requests(), vec![Demand::UNLIMITED]);

    assert_eq!(assign.receive(4), Demand::NONE);
    assert_eq!(target.load(), 4);
    assign.receive_completion(Completion::Finished);
    assert!(assign.target().is_none());
    assign.receive(5);
    assert_eq!(target.load(), 4);
  }

  #[test]
  fn cancelled_assign_releases_the_target_and_upstream() {
    let (sub, log) = CountingSubscription::new();
    let target = Arc::new(Mutex::new(String::new()));
    let assign = Assign::new(target.clone(), |t: &Mutex<String>, v: &str| *t.lock() = v.to_string());
    assign.receive_subscription(AnySubscription::new(sub));
    assign.cancel();
    assign.cancel();
    assert_eq!(log.cancels(), 1);
    assert_eq!(Arc::strong_count(&target), 1);
  }

  #[test]
  fn completion_helpers() {
    let c: Completion<&str> = Completion::Failure("x");
    assert_eq!(c.map_failure(str::len), Completion::Failure(1));
    assert!(Completion::<()>::Finished.is_finished());
    assert_eq!(Completion::Failure(3).failure(), Some(3));
  }
}

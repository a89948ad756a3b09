//! Subscription and subscriber doubles shared by the unit tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::prelude::*;

#[derive(Default)]
struct LogInner {
  requests: Vec<Demand>,
  cancels: usize,
}

/// What a [`CountingSubscription`] has been asked to do.
#[derive(Clone, Default)]
pub(crate) struct SubscriptionLog(Arc<Mutex<LogInner>>);

impl SubscriptionLog {
  pub(crate) fn requests(&self) -> Vec<Demand> { self.0.lock().requests.clone() }

  pub(crate) fn cancels(&self) -> usize { self.0.lock().cancels }
}

/// A subscription that only records calls.
pub(crate) struct CountingSubscription {
  id: CombineIdentifier,
  log: SubscriptionLog,
}

impl CountingSubscription {
  pub(crate) fn new() -> (Self, SubscriptionLog) {
    let log = SubscriptionLog::default();
    (CountingSubscription { id: CombineIdentifier::new(), log: log.clone() }, log)
  }
}

impl Cancellable for CountingSubscription {
  fn cancel(&self) { self.log.0.lock().cancels += 1; }
}

impl Identity for CountingSubscription {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl Subscription for CountingSubscription {
  fn request(&self, demand: Demand) { self.log.0.lock().requests.push(demand); }
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) enum Event<I, F> {
  Subscribed,
  Value(I),
  Completion(Completion<F>),
}

/// A subscriber that records every event and asks for a fixed demand.
pub(crate) struct Recorder<I, F> {
  id: CombineIdentifier,
  initial: Demand,
  per_value: Demand,
  events: Mutex<Vec<Event<I, F>>>,
  subscription: Mutex<Option<AnySubscription>>,
}

impl<I, F> Recorder<I, F> {
  /// Requests `initial` on subscription and returns `per_value` from every
  /// value.
  pub(crate) fn new(initial: Demand, per_value: Demand) -> Arc<Self> {
    Arc::new(Recorder {
      id: CombineIdentifier::new(),
      initial,
      per_value,
      events: Mutex::new(vec![]),
      subscription: Mutex::new(None),
    })
  }

  pub(crate) fn unlimited() -> Arc<Self> { Self::new(Demand::UNLIMITED, Demand::NONE) }

  /// Requests nothing until told to.
  pub(crate) fn lazy() -> Arc<Self> { Self::new(Demand::NONE, Demand::NONE) }

  pub(crate) fn request(&self, demand: Demand) {
    let sub = self.subscription.lock().clone();
    if let Some(sub) = sub {
      sub.request(demand);
    }
  }

  pub(crate) fn cancel(&self) {
    let sub = self.subscription.lock().clone();
    if let Some(sub) = sub {
      sub.cancel();
    }
  }

  pub(crate) fn is_subscribed(&self) -> bool { self.subscription.lock().is_some() }
}

impl<I: Clone, F: Clone> Recorder<I, F> {
  pub(crate) fn events(&self) -> Vec<Event<I, F>> { self.events.lock().clone() }

  pub(crate) fn completions(&self) -> Vec<Completion<F>> {
    self
      .events
      .lock()
      .iter()
      .filter_map(|e| match e {
        Event::Completion(c) => Some(c.clone()),
        _ => None,
      })
      .collect()
  }
}

impl<I: Clone, F> Recorder<I, F> {
  pub(crate) fn values(&self) -> Vec<I> {
    self
      .events
      .lock()
      .iter()
      .filter_map(|e| match e {
        Event::Value(v) => Some(v.clone()),
        _ => None,
      })
      .collect()
  }
}

impl<I, F: std::fmt::Display> Recorder<I, F> {
  /// Completions rendered as `finished` or `failure: <message>`, for failure
  /// types that are not `Clone`.
  pub(crate) fn completion_messages(&self) -> Vec<String> {
    self
      .events
      .lock()
      .iter()
      .filter_map(|e| match e {
        Event::Completion(Completion::Finished) => Some("finished".to_string()),
        Event::Completion(Completion::Failure(e)) => Some(format!("failure: {e}")),
        _ => None,
      })
      .collect()
  }

  pub(crate) fn value_count(&self) -> usize {
    self.events.lock().iter().filter(|e| matches!(e, Event::Value(_))).count()
  }
}

impl<I, F> Identity for Recorder<I, F> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<I: Send + 'static, F: Send + 'static> Subscriber for Recorder<I, F> {
  type Input = I;
  type Failure = F;

  fn receive_subscription(&self, subscription: AnySubscription) {
    self.events.lock().push(Event::Subscribed);
    *self.subscription.lock() = Some(subscription.clone());
    if self.initial.has_any() {
      subscription.request(self.initial);
    }
  }

  fn receive(&self, input: I) -> Demand {
    self.events.lock().push(Event::Value(input));
    self.per_value
  }

  fn receive_completion(&self, completion: Completion<F>) {
    self.events.lock().push(Event::Completion(completion));
  }
}

/// A publisher driven by hand through the last subscriber it received.
pub(crate) struct Manual<O, F> {
  subscriber: Mutex<Option<AnySubscriber<O, F>>>,
  log: SubscriptionLog,
}

impl<O: Send + 'static, F: Send + 'static> Manual<O, F> {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Manual { subscriber: Mutex::new(None), log: SubscriptionLog::default() })
  }

  /// What the subscriber asked of the upstream.
  pub(crate) fn log(&self) -> &SubscriptionLog { &self.log }

  fn current(&self) -> Option<AnySubscriber<O, F>> { self.subscriber.lock().clone() }

  pub(crate) fn send(&self, value: O) -> Demand {
    self.current().map_or(Demand::NONE, |s| s.receive(value))
  }

  pub(crate) fn finish(&self) {
    if let Some(s) = self.current() {
      s.receive_completion(Completion::Finished);
    }
  }

  pub(crate) fn fail(&self, failure: F) {
    if let Some(s) = self.current() {
      s.receive_completion(Completion::Failure(failure));
    }
  }
}

impl<O: Send + 'static, F: Send + 'static> Publisher for Manual<O, F> {
  type Output = O;
  type Failure = F;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = O, Failure = F>,
  {
    let subscriber = AnySubscriber::new(subscriber);
    *self.subscriber.lock() = Some(subscriber.clone());
    let subscription = CountingSubscription { id: CombineIdentifier::new(), log: self.log.clone() };
    subscriber.receive_subscription(AnySubscription::new(subscription));
  }
}

use std::sync::Arc;

use parking_lot::Mutex;

use crate::prelude::*;

/// Creates a publisher emitting a single value to each subscriber.
///
/// The value is sent once the subscriber requests anything, followed by a
/// normal finish. Never fails.
///
/// # Examples
///
/// ```
/// use rxpipe::prelude::*;
///
/// just(123).sink_value(|v| println!("{v}"));
/// ```
pub fn just<T>(value: T) -> Just<T> { Just(value) }

#[derive(Clone, Debug)]
pub struct Just<T>(pub T);

impl<T: Clone + Send + Sync + 'static> Publisher for Just<T> {
  type Output = T;
  type Failure = Never;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = Never>,
  {
    let subscription = Arc::new(JustSubscription {
      id: CombineIdentifier::new(),
      value: Mutex::new(Some(self.0.clone())),
      downstream: subscriber,
    });
    subscription.downstream.receive_subscription(AnySubscription::new(subscription.clone()));
  }
}

struct JustSubscription<T, S> {
  id: CombineIdentifier,
  value: Mutex<Option<T>>,
  downstream: S,
}

impl<T: Send, S: Subscriber<Input = T, Failure = Never>> Cancellable for JustSubscription<T, S> {
  fn cancel(&self) { self.value.lock().take(); }
}

impl<T, S> Identity for JustSubscription<T, S> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<T: Send, S: Subscriber<Input = T, Failure = Never>> Subscription for JustSubscription<T, S> {
  fn request(&self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    let value = self.value.lock().take();
    if let Some(value) = value {
      self.downstream.receive(value);
      self.downstream.receive_completion(Completion::Finished);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  #[test]
  fn waits_for_demand() {
    let rec = Recorder::<i32, Never>::lazy();
    just(7).receive(rec.clone());
    assert_eq!(rec.events(), vec![Event::Subscribed]);
    rec.request(Demand::max(1));
    rec.request(Demand::max(1));
    assert_eq!(
      rec.events(),
      vec![Event::Subscribed, Event::Value(7), Event::Completion(Completion::Finished)]
    );
  }

  #[test]
  fn cancelled_before_demand_emits_nothing() {
    let rec = Recorder::<i32, Never>::lazy();
    just(7).receive(rec.clone());
    rec.cancel();
    rec.request(Demand::UNLIMITED);
    assert_eq!(rec.events(), vec![Event::Subscribed]);
  }

  #[test]
  fn every_subscriber_gets_the_value() {
    let source = just("x");
    let a = Recorder::<&str, Never>::unlimited();
    let b = Recorder::<&str, Never>::unlimited();
    source.receive(a.clone());
    source.receive(b.clone());
    assert_eq!(a.values(), vec!["x"]);
    assert_eq!(b.values(), vec!["x"]);
  }
}

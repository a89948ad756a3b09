use std::marker::PhantomData;

use crate::prelude::*;

/// Creates a publisher that never emits a value and finishes right away.
pub fn empty<T, E>() -> Empty<T, E> { Empty::new(true) }

/// A publisher that never emits a value. It either finishes as soon as it is
/// subscribed to, or never completes at all.
pub struct Empty<T, E> {
  complete_immediately: bool,
  _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Empty<T, E> {
  pub fn new(complete_immediately: bool) -> Self {
    Empty { complete_immediately, _marker: PhantomData }
  }

  /// An empty publisher that never completes.
  pub fn never() -> Self { Self::new(false) }
}

impl<T, E> Clone for Empty<T, E> {
  fn clone(&self) -> Self { Self::new(self.complete_immediately) }
}

impl<T: Send + 'static, E: Send + 'static> Publisher for Empty<T, E> {
  type Output = T;
  type Failure = E;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = E>,
  {
    subscriber.receive_subscription(Subscriptions::empty());
    if self.complete_immediately {
      subscriber.receive_completion(Completion::Finished);
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
  fn finishes_without_demand() {
    let rec = Recorder::<i32, Never>::lazy();
    empty().receive(rec.clone());
    assert_eq!(rec.events(), vec![Event::Subscribed, Event::Completion(Completion::Finished)]);
  }

  #[test]
  fn never_completes() {
    let rec = Recorder::<i32, Never>::unlimited();
    Empty::never().receive(rec.clone());
    assert_eq!(rec.events(), vec![Event::Subscribed]);
  }
}

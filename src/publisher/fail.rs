use std::marker::PhantomData;

use crate::prelude::*;

/// Creates a publisher that fails with `error` as soon as it is subscribed
/// to.
pub fn fail<T, E>(error: E) -> Fail<T, E> { Fail { error, _marker: PhantomData } }

pub struct Fail<T, E> {
  error: E,
  _marker: PhantomData<fn() -> T>,
}

impl<T, E: Clone> Clone for Fail<T, E> {
  fn clone(&self) -> Self { fail(self.error.clone()) }
}

impl<T, E> Publisher for Fail<T, E>
where
  T: Send + 'static,
  E: Clone + Send + Sync + 'static,
{
  type Output = T;
  type Failure = E;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = E>,
  {
    subscriber.receive_subscription(Subscriptions::empty());
    subscriber.receive_completion(Completion::Failure(self.error.clone()));
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Recorder},
  };

  #[test]
  fn fails_immediately() {
    let rec = Recorder::<i32, &str>::lazy();
    fail("nope").receive(rec.clone());
    assert_eq!(rec.events(), vec![Event::Subscribed, Event::Completion(Completion::Failure("nope"))]);
  }
}

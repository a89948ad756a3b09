use std::sync::Arc;

use crate::prelude::*;

/// Creates a publisher that runs `factory` for every new subscriber and
/// subscribes it to the publisher the factory returns.
pub fn deferred<P, F>(factory: F) -> Deferred<F>
where
  P: Publisher,
  F: Fn() -> P + Send + Sync,
{
  Deferred(Arc::new(factory))
}

pub struct Deferred<F>(Arc<F>);

impl<F> Clone for Deferred<F> {
  fn clone(&self) -> Self { Deferred(self.0.clone()) }
}

impl<P, F> Publisher for Deferred<F>
where
  P: Publisher,
  F: Fn() -> P + Send + Sync,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = P::Output, Failure = P::Failure>,
  {
    (self.0)().receive(subscriber)
  }
}

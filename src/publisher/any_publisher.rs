use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use crate::prelude::*;

/// A type-erased [`Publisher`].
pub struct AnyPublisher<O, F>(Arc<dyn Fn(AnySubscriber<O, F>) + Send + Sync>);

impl<O: Send + 'static, F: Send + 'static> AnyPublisher<O, F> {
  pub fn new<P>(publisher: P) -> Self
  where
    P: Publisher<Output = O, Failure = F> + 'static,
  {
    AnyPublisher(Arc::new(move |subscriber| publisher.receive(subscriber)))
  }

  /// A publisher whose subscription logic is the closure itself.
  pub fn from_fn(receive: impl Fn(AnySubscriber<O, F>) + Send + Sync + 'static) -> Self {
    AnyPublisher(Arc::new(receive))
  }
}

impl<O, F> Clone for AnyPublisher<O, F> {
  fn clone(&self) -> Self { AnyPublisher(self.0.clone()) }
}

impl<O, F> Debug for AnyPublisher<O, F> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("AnyPublisher") }
}

impl<O: Send + 'static, F: Send + 'static> Publisher for AnyPublisher<O, F> {
  type Output = O;
  type Failure = F;

  #[inline]
  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = O, Failure = F>,
  {
    (self.0)(AnySubscriber::new(subscriber))
  }

  #[inline]
  fn erase(self) -> AnyPublisher<O, F> { self }
}

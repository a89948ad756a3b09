//! IgnoreOutput operator implementation.

use std::marker::PhantomData;

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::ignore_output`]. Its output type has no
/// values, so only the completion can arrive.
#[derive(Clone)]
pub struct IgnoreOutput<U> {
  upstream: U,
}

impl<U> IgnoreOutput<U> {
  pub fn new(upstream: U) -> Self { IgnoreOutput { upstream } }
}

impl<U: Publisher> Publisher for IgnoreOutput<U> {
  type Output = Never;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = Never, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      IgnoreOutputPipe {
        connection: Connection::new("ignore_output", subscriber),
        _input: PhantomData::<fn(U::Output)>,
      },
    )
  }
}

struct IgnoreOutputPipe<I, D> {
  connection: Connection<D>,
  _input: PhantomData<fn(I)>,
}

impl<I, D> Pipe for IgnoreOutputPipe<I, D>
where
  I: Send + 'static,
  D: Subscriber<Input = Never>,
{
  type Input = I;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  /// Nothing was delivered, so upstream may send one more.
  #[inline]
  fn receive_input(&self, _: I) -> Demand { Demand::max(1) }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }
}

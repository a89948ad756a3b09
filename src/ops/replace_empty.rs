//! ReplaceEmpty operator implementation.

use std::sync::Arc;

use crate::{
  atomic::Atomic,
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::replace_empty`].
pub struct ReplaceEmpty<U: Publisher> {
  upstream: U,
  output: Arc<U::Output>,
}

impl<U: Publisher> ReplaceEmpty<U> {
  pub fn new(upstream: U, output: U::Output) -> Self { ReplaceEmpty { upstream, output: Arc::new(output) } }
}

impl<U: Publisher + Clone> Clone for ReplaceEmpty<U> {
  fn clone(&self) -> Self { ReplaceEmpty { upstream: self.upstream.clone(), output: self.output.clone() } }
}

impl<U> Publisher for ReplaceEmpty<U>
where
  U: Publisher,
  U::Output: Clone + Sync,
{
  type Output = U::Output;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      ReplaceEmptyPipe {
        connection: Connection::new("replace_empty", subscriber),
        output: self.output.clone(),
        seen: Atomic::new(false),
      },
    )
  }
}

struct ReplaceEmptyPipe<D: Subscriber> {
  connection: Connection<D>,
  output: Arc<D::Input>,
  seen: Atomic<bool>,
}

impl<D> Pipe for ReplaceEmptyPipe<D>
where
  D: Subscriber,
  D::Input: Clone + Sync,
{
  type Input = D::Input;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: D::Input) -> Demand {
    self.seen.store(true);
    self.connection.forward(input)
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    if completion.is_finished() && !self.seen.load() {
      self.connection.forward(D::Input::clone(&self.output));
    }
    self.connection.forward_completion(completion)
  }
}

//! Filter operator implementation.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::filter`].
pub struct Filter<U, F> {
  upstream: U,
  predicate: Arc<F>,
}

impl<U, F> Filter<U, F> {
  pub fn new(upstream: U, predicate: F) -> Self { Filter { upstream, predicate: Arc::new(predicate) } }
}

impl<U: Clone, F> Clone for Filter<U, F> {
  fn clone(&self) -> Self { Filter { upstream: self.upstream.clone(), predicate: self.predicate.clone() } }
}

impl<U, F> Publisher for Filter<U, F>
where
  U: Publisher,
  F: Fn(&U::Output) -> bool + Send + Sync + 'static,
{
  type Output = U::Output;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      FilterPipe { connection: Connection::new("filter", subscriber), predicate: self.predicate.clone() },
    )
  }
}

struct FilterPipe<D, F> {
  connection: Connection<D>,
  predicate: Arc<F>,
}

impl<D, F> Pipe for FilterPipe<D, F>
where
  D: Subscriber,
  F: Fn(&D::Input) -> bool + Send + Sync + 'static,
{
  type Input = D::Input;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  /// A dropped value asks upstream for one more, since nothing reached the
  /// downstream.
  fn receive_input(&self, input: D::Input) -> Demand {
    if (self.predicate)(&input) { self.connection.forward(input) } else { Demand::max(1) }
  }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }
}

/// Publisher returned by [`Publisher::try_filter`].
pub struct TryFilter<U, F> {
  upstream: U,
  predicate: Arc<F>,
}

impl<U, F> TryFilter<U, F> {
  pub fn new(upstream: U, predicate: F) -> Self {
    TryFilter { upstream, predicate: Arc::new(predicate) }
  }
}

impl<U: Clone, F> Clone for TryFilter<U, F> {
  fn clone(&self) -> Self {
    TryFilter { upstream: self.upstream.clone(), predicate: self.predicate.clone() }
  }
}

impl<U, F> Publisher for TryFilter<U, F>
where
  U: Publisher,
  U::Failure: Into<anyhow::Error>,
  F: Fn(&U::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
{
  type Output = U::Output;
  type Failure = anyhow::Error;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = anyhow::Error>,
  {
    subscribe_pipe(
      &self.upstream,
      TryFilterPipe {
        connection: Connection::new("try_filter", subscriber),
        predicate: self.predicate.clone(),
        _failure: PhantomData::<fn(U::Failure)>,
      },
    )
  }
}

struct TryFilterPipe<E, D, F> {
  connection: Connection<D>,
  predicate: Arc<F>,
  _failure: PhantomData<fn(E)>,
}

impl<E, D, F> Pipe for TryFilterPipe<E, D, F>
where
  E: Into<anyhow::Error> + Send + 'static,
  D: Subscriber<Failure = anyhow::Error>,
  F: Fn(&D::Input) -> anyhow::Result<bool> + Send + Sync + 'static,
{
  type Input = D::Input;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: D::Input) -> Demand {
    match (self.predicate)(&input) {
      Ok(true) => self.connection.forward(input),
      Ok(false) => Demand::max(1),
      Err(error) => {
        self.connection.terminate(Completion::Failure(error));
        Demand::NONE
      }
    }
  }

  fn receive_completion(&self, completion: Completion<E>) {
    self.connection.forward_completion(completion.map_failure(Into::into))
  }
}

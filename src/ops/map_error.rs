//! MapError and SetFailureType operator implementations.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::map_error`].
pub struct MapError<U, F> {
  upstream: U,
  transform: Arc<F>,
}

impl<U, F> MapError<U, F> {
  pub fn new(upstream: U, transform: F) -> Self { MapError { upstream, transform: Arc::new(transform) } }
}

impl<U: Clone, F> Clone for MapError<U, F> {
  fn clone(&self) -> Self { MapError { upstream: self.upstream.clone(), transform: self.transform.clone() } }
}

impl<U, F, E> Publisher for MapError<U, F>
where
  U: Publisher,
  F: Fn(U::Failure) -> E + Send + Sync + 'static,
  E: Send + 'static,
{
  type Output = U::Output;
  type Failure = E;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = E>,
  {
    subscribe_pipe(
      &self.upstream,
      MapErrorPipe {
        connection: Connection::new("map_error", subscriber),
        transform: self.transform.clone(),
        _failure: PhantomData::<fn(U::Failure)>,
      },
    )
  }
}

struct MapErrorPipe<E, D, F> {
  connection: Connection<D>,
  transform: Arc<F>,
  _failure: PhantomData<fn(E)>,
}

impl<E, D, F> Pipe for MapErrorPipe<E, D, F>
where
  E: Send + 'static,
  D: Subscriber,
  F: Fn(E) -> D::Failure + Send + Sync + 'static,
{
  type Input = D::Input;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  #[inline]
  fn receive_input(&self, input: D::Input) -> Demand { self.connection.forward(input) }

  fn receive_completion(&self, completion: Completion<E>) {
    self.connection.forward_completion(completion.map_failure(|e| (self.transform)(e)))
  }
}

/// Publisher returned by [`Publisher::set_failure_type`].
pub struct SetFailureType<U, E> {
  upstream: U,
  _failure: PhantomData<fn() -> E>,
}

impl<U, E> SetFailureType<U, E> {
  pub fn new(upstream: U) -> Self { SetFailureType { upstream, _failure: PhantomData } }
}

impl<U: Clone, E> Clone for SetFailureType<U, E> {
  fn clone(&self) -> Self { SetFailureType::new(self.upstream.clone()) }
}

impl<U, E> Publisher for SetFailureType<U, E>
where
  U: Publisher<Failure = Never>,
  E: Send + 'static,
{
  type Output = U::Output;
  type Failure = E;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = E>,
  {
    subscribe_pipe(&self.upstream, MapErrorPipe {
      connection: Connection::new("set_failure_type", subscriber),
      transform: Arc::new(|never: Never| -> E { match never {} }),
      _failure: PhantomData::<fn(Never)>,
    })
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Manual, Recorder},
  };

  #[derive(Debug, Clone, PartialEq, thiserror::Error)]
  enum StoreError {
    #[error("not found: {0}")]
    NotFound(u32),
  }

  #[test]
  fn transforms_failure_only() {
    let source = Manual::<u32, u32>::new();
    let rec = Recorder::<u32, StoreError>::unlimited();
    source.clone().map_error(StoreError::NotFound).receive(rec.clone());
    source.send(7);
    source.fail(404);
    assert_eq!(rec.values(), vec![7]);
    assert_eq!(rec.completions(), vec![Completion::Failure(StoreError::NotFound(404))]);
    assert_eq!(rec.completion_messages(), vec!["failure: not found: 404".to_string()]);
  }

  #[test]
  fn set_failure_type_lets_never_join_typed_chains() {
    let rec = Recorder::<i32, StoreError>::unlimited();
    just(3)
      .set_failure_type::<StoreError>()
      .merge(fail::<i32, _>(StoreError::NotFound(1)))
      .receive(rec.clone());
    assert_eq!(rec.completions(), vec![Completion::Failure(StoreError::NotFound(1))]);
  }
}

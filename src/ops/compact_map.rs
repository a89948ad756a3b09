//! CompactMap operator implementation.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::compact_map`].
pub struct CompactMap<U, F> {
  upstream: U,
  transform: Arc<F>,
}

impl<U, F> CompactMap<U, F> {
  pub fn new(upstream: U, transform: F) -> Self {
    CompactMap { upstream, transform: Arc::new(transform) }
  }
}

impl<U: Clone, F> Clone for CompactMap<U, F> {
  fn clone(&self) -> Self {
    CompactMap { upstream: self.upstream.clone(), transform: self.transform.clone() }
  }
}

impl<U, F, T> Publisher for CompactMap<U, F>
where
  U: Publisher,
  F: Fn(U::Output) -> Option<T> + Send + Sync + 'static,
  T: Send + 'static,
{
  type Output = T;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      CompactMapPipe {
        connection: Connection::new("compact_map", subscriber),
        transform: self.transform.clone(),
        _input: PhantomData::<fn(U::Output)>,
      },
    )
  }
}

struct CompactMapPipe<I, D, F> {
  connection: Connection<D>,
  transform: Arc<F>,
  _input: PhantomData<fn(I)>,
}

impl<I, D, F> Pipe for CompactMapPipe<I, D, F>
where
  I: Send + 'static,
  D: Subscriber,
  F: Fn(I) -> Option<D::Input> + Send + Sync + 'static,
{
  type Input = I;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: I) -> Demand {
    match (self.transform)(input) {
      Some(output) => self.connection.forward(output),
      None => Demand::max(1),
    }
  }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }
}

/// Publisher returned by [`Publisher::try_compact_map`].
pub struct TryCompactMap<U, F> {
  upstream: U,
  transform: Arc<F>,
}

impl<U, F> TryCompactMap<U, F> {
  pub fn new(upstream: U, transform: F) -> Self {
    TryCompactMap { upstream, transform: Arc::new(transform) }
  }
}

impl<U: Clone, F> Clone for TryCompactMap<U, F> {
  fn clone(&self) -> Self {
    TryCompactMap { upstream: self.upstream.clone(), transform: self.transform.clone() }
  }
}

impl<U, F, T> Publisher for TryCompactMap<U, F>
where
  U: Publisher,
  U::Failure: Into<anyhow::Error>,
  F: Fn(U::Output) -> anyhow::Result<Option<T>> + Send + Sync + 'static,
  T: Send + 'static,
{
  type Output = T;
  type Failure = anyhow::Error;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = anyhow::Error>,
  {
    subscribe_pipe(
      &self.upstream,
      TryCompactMapPipe {
        connection: Connection::new("try_compact_map", subscriber),
        transform: self.transform.clone(),
        _upstream: PhantomData::<fn(U::Output, U::Failure)>,
      },
    )
  }
}

struct TryCompactMapPipe<I, E, D, F> {
  connection: Connection<D>,
  transform: Arc<F>,
  _upstream: PhantomData<fn(I, E)>,
}

impl<I, E, D, F> Pipe for TryCompactMapPipe<I, E, D, F>
where
  I: Send + 'static,
  E: Into<anyhow::Error> + Send + 'static,
  D: Subscriber<Failure = anyhow::Error>,
  F: Fn(I) -> anyhow::Result<Option<D::Input>> + Send + Sync + 'static,
{
  type Input = I;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: I) -> Demand {
    match (self.transform)(input) {
      Ok(Some(output)) => self.connection.forward(output),
      Ok(None) => Demand::max(1),
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

#[cfg(test)]
mod tests {
  use anyhow::Context;

  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn drops_none() {
    let rec = Recorder::<i32, Never>::new(Demand::max(3), Demand::NONE);
    sequence(vec!["1", "x", "2", "y", "3", "4"])
      .compact_map(|s| s.parse::<i32>().ok())
      .receive(rec.clone());
    assert_eq!(rec.values(), vec![1, 2, 3]);
    assert!(rec.completions().is_empty());
    rec.request(Demand::max(1));
    assert_eq!(rec.values(), vec![1, 2, 3, 4]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn try_compact_map_reports_context() {
    let rec = Recorder::<i32, anyhow::Error>::unlimited();
    sequence(vec!["7", "", "oops"])
      .try_compact_map(|s| {
        if s.is_empty() {
          return Ok(None);
        }
        s.parse::<i32>().map(Some).with_context(|| format!("parsing {s:?}"))
      })
      .receive(rec.clone());
    assert_eq!(rec.values(), vec![7]);
    assert_eq!(rec.completion_messages(), vec!["failure: parsing \"oops\"".to_string()]);
  }
}

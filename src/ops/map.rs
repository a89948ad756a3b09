//! Map operator implementation.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::map`].
pub struct Map<U, F> {
  upstream: U,
  transform: Arc<F>,
}

impl<U, F> Map<U, F> {
  pub fn new(upstream: U, transform: F) -> Self { Map { upstream, transform: Arc::new(transform) } }
}

impl<U: Clone, F> Clone for Map<U, F> {
  fn clone(&self) -> Self { Map { upstream: self.upstream.clone(), transform: self.transform.clone() } }
}

impl<U, F, T> Publisher for Map<U, F>
where
  U: Publisher,
  F: Fn(U::Output) -> T + Send + Sync + 'static,
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
      MapPipe {
        connection: Connection::new("map", subscriber),
        transform: self.transform.clone(),
        _input: PhantomData::<fn(U::Output)>,
      },
    )
  }
}

struct MapPipe<I, D, F> {
  connection: Connection<D>,
  transform: Arc<F>,
  _input: PhantomData<fn(I)>,
}

impl<I, D, F> Pipe for MapPipe<I, D, F>
where
  I: Send + 'static,
  D: Subscriber,
  F: Fn(I) -> D::Input + Send + Sync + 'static,
{
  type Input = I;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  #[inline]
  fn receive_input(&self, input: I) -> Demand { self.connection.forward((self.transform)(input)) }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }
}

/// Publisher returned by [`Publisher::try_map`].
pub struct TryMap<U, F> {
  upstream: U,
  transform: Arc<F>,
}

impl<U, F> TryMap<U, F> {
  pub fn new(upstream: U, transform: F) -> Self {
    TryMap { upstream, transform: Arc::new(transform) }
  }
}

impl<U: Clone, F> Clone for TryMap<U, F> {
  fn clone(&self) -> Self {
    TryMap { upstream: self.upstream.clone(), transform: self.transform.clone() }
  }
}

impl<U, F, T> Publisher for TryMap<U, F>
where
  U: Publisher,
  U::Failure: Into<anyhow::Error>,
  F: Fn(U::Output) -> anyhow::Result<T> + Send + Sync + 'static,
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
      TryMapPipe {
        connection: Connection::new("try_map", subscriber),
        transform: self.transform.clone(),
        _upstream: PhantomData::<fn(U::Output, U::Failure)>,
      },
    )
  }
}

struct TryMapPipe<I, E, D, F> {
  connection: Connection<D>,
  transform: Arc<F>,
  _upstream: PhantomData<fn(I, E)>,
}

impl<I, E, D, F> Pipe for TryMapPipe<I, E, D, F>
where
  I: Send + 'static,
  E: Into<anyhow::Error> + Send + 'static,
  D: Subscriber<Failure = anyhow::Error>,
  F: Fn(I) -> anyhow::Result<D::Input> + Send + Sync + 'static,
{
  type Input = I;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: I) -> Demand {
    match (self.transform)(input) {
      Ok(output) => self.connection.forward(output),
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
  use anyhow::anyhow;

  use crate::{
    prelude::*,
    test_util::{CountingSubscription, Recorder},
  };

  #[test]
  fn primitive_type() {
    let rec = Recorder::<i32, Never>::unlimited();
    sequence(100..101).map(|v| v * 2).receive(rec.clone());
    assert_eq!(rec.values(), vec![200]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn identity_preserves_values_and_completion() {
    let plain = Recorder::<i32, Never>::unlimited();
    let mapped = Recorder::<i32, Never>::unlimited();
    let source = sequence(vec![3, 1, 4, 1, 5]);
    source.clone().receive(plain.clone());
    source.map(|v| v).receive(mapped.clone());
    assert_eq!(plain.events(), mapped.events());
  }

  #[test]
  fn demand_passes_through() {
    let rec = Recorder::<String, Never>::new(Demand::max(2), Demand::NONE);
    sequence(1..10).map(|v| v.to_string()).receive(rec.clone());
    assert_eq!(rec.values(), vec!["1", "2"]);
    rec.request(Demand::max(1));
    assert_eq!(rec.values(), vec!["1", "2", "3"]);
  }

  #[test]
  fn try_map_failure_cancels_upstream() {
    let rec = Recorder::<i32, anyhow::Error>::unlimited();
    let source = AnyPublisher::<i32, Never>::from_fn(|s| {
      let (sub, log) = CountingSubscription::new();
      s.receive_subscription(AnySubscription::new(sub));
      s.receive(1);
      s.receive(2);
      s.receive(3);
      s.receive_completion(Completion::Finished);
      assert_eq!(log.cancels(), 1);
    });
    source
      .try_map(|v| if v == 2 { Err(anyhow!("two")) } else { Ok(v * 10) })
      .receive(rec.clone());
    assert_eq!(rec.values(), vec![10]);
    let completions = rec.completion_messages();
    assert_eq!(completions, vec!["failure: two".to_string()]);
  }

  #[test]
  fn try_map_converts_upstream_failure() {
    #[derive(Debug, Clone, thiserror::Error)]
    #[error("upstream broke")]
    struct Broke;

    let rec = Recorder::<i32, anyhow::Error>::unlimited();
    fail::<i32, _>(Broke).try_map(Ok).receive(rec.clone());
    assert_eq!(rec.completion_messages(), vec!["failure: upstream broke".to_string()]);
  }
}

//! Scan operator implementation.

use std::{marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::scan`].
pub struct Scan<U, T, F> {
  upstream: U,
  initial: T,
  next: Arc<F>,
}

impl<U, T, F> Scan<U, T, F> {
  pub fn new(upstream: U, initial: T, next: F) -> Self { Scan { upstream, initial, next: Arc::new(next) } }
}

impl<U: Clone, T: Clone, F> Clone for Scan<U, T, F> {
  fn clone(&self) -> Self {
    Scan { upstream: self.upstream.clone(), initial: self.initial.clone(), next: self.next.clone() }
  }
}

impl<U, T, F> Publisher for Scan<U, T, F>
where
  U: Publisher,
  T: Clone + Send + Sync + 'static,
  F: Fn(T, U::Output) -> T + Send + Sync + 'static,
{
  type Output = T;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      ScanPipe {
        connection: Connection::new("scan", subscriber),
        result: Mutex::new(Some(self.initial.clone())),
        next: self.next.clone(),
        _input: PhantomData::<fn(U::Output)>,
      },
    )
  }
}

struct ScanPipe<I, D: Subscriber, F> {
  connection: Connection<D>,
  result: Mutex<Option<D::Input>>,
  next: Arc<F>,
  _input: PhantomData<fn(I)>,
}

impl<I, D, F> Pipe for ScanPipe<I, D, F>
where
  I: Send + 'static,
  D: Subscriber,
  D::Input: Clone,
  F: Fn(D::Input, I) -> D::Input + Send + Sync + 'static,
{
  type Input = I;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: I) -> Demand {
    let output = {
      let mut result = self.result.lock();
      let Some(acc) = result.take() else { return Demand::NONE };
      let next = (self.next)(acc, input);
      *result = Some(next.clone());
      next
    };
    self.connection.forward(output)
  }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }
}

/// Publisher returned by [`Publisher::try_scan`].
pub struct TryScan<U, T, F> {
  upstream: U,
  initial: T,
  next: Arc<F>,
}

impl<U, T, F> TryScan<U, T, F> {
  pub fn new(upstream: U, initial: T, next: F) -> Self {
    TryScan { upstream, initial, next: Arc::new(next) }
  }
}

impl<U: Clone, T: Clone, F> Clone for TryScan<U, T, F> {
  fn clone(&self) -> Self {
    TryScan { upstream: self.upstream.clone(), initial: self.initial.clone(), next: self.next.clone() }
  }
}

impl<U, T, F> Publisher for TryScan<U, T, F>
where
  U: Publisher,
  U::Failure: Into<anyhow::Error>,
  T: Clone + Send + Sync + 'static,
  F: Fn(T, U::Output) -> anyhow::Result<T> + Send + Sync + 'static,
{
  type Output = T;
  type Failure = anyhow::Error;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = anyhow::Error>,
  {
    subscribe_pipe(
      &self.upstream,
      TryScanPipe {
        connection: Connection::new("try_scan", subscriber),
        result: Mutex::new(Some(self.initial.clone())),
        next: self.next.clone(),
        _upstream: PhantomData::<fn(U::Output, U::Failure)>,
      },
    )
  }
}

struct TryScanPipe<I, E, D: Subscriber, F> {
  connection: Connection<D>,
  result: Mutex<Option<D::Input>>,
  next: Arc<F>,
  _upstream: PhantomData<fn(I, E)>,
}

impl<I, E, D, F> Pipe for TryScanPipe<I, E, D, F>
where
  I: Send + 'static,
  E: Into<anyhow::Error> + Send + 'static,
  D: Subscriber<Failure = anyhow::Error>,
  D::Input: Clone,
  F: Fn(D::Input, I) -> anyhow::Result<D::Input> + Send + Sync + 'static,
{
  type Input = I;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: I) -> Demand {
    let outcome = {
      let mut result = self.result.lock();
      let Some(acc) = result.take() else { return Demand::NONE };
      (self.next)(acc, input).map(|next| {
        *result = Some(next.clone());
        next
      })
    };
    match outcome {
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
  use anyhow::ensure;

  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn publishes_every_partial_result() {
    let rec = Recorder::<i32, Never>::unlimited();
    sequence(1..=4).scan(0, |acc, v| acc + v).receive(rec.clone());
    assert_eq!(rec.values(), vec![1, 3, 6, 10]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn each_subscription_starts_from_initial() {
    let source = sequence(vec!["a", "b"]).scan(String::new(), |mut acc, v| {
      acc.push_str(v);
      acc
    });
    let first = Recorder::<String, Never>::unlimited();
    let second = Recorder::<String, Never>::unlimited();
    source.receive(first.clone());
    source.receive(second.clone());
    assert_eq!(first.values(), vec!["a", "ab"]);
    assert_eq!(second.values(), vec!["a", "ab"]);
  }

  #[test]
  fn try_scan_stops_on_error() {
    let rec = Recorder::<i32, anyhow::Error>::unlimited();
    sequence(1..=5)
      .try_scan(0, |acc, v| {
        ensure!(acc + v < 5, "overflow at {v}");
        Ok(acc + v)
      })
      .receive(rec.clone());
    assert_eq!(rec.values(), vec![1, 3]);
    assert_eq!(rec.completion_messages(), vec!["failure: overflow at 3".to_string()]);
  }
}

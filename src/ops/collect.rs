//! Collect and CollectByCount operator implementations.

use std::marker::PhantomData;

use parking_lot::Mutex;

use crate::{
  ops::aggregate::Reducer,
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Reducer behind [`Publisher::collect`].
pub struct Collect<T, E> {
  values: Vec<T>,
  _failure: PhantomData<fn() -> E>,
}

impl<T, E> Default for Collect<T, E> {
  fn default() -> Self { Collect { values: vec![], _failure: PhantomData } }
}

impl<T: Send + 'static, E: Send + 'static> Reducer<T> for Collect<T, E> {
  type Output = Vec<T>;
  type Failure = E;

  #[inline]
  fn reduce(&mut self, input: T) -> Result<(), E> {
    self.values.push(input);
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<Vec<T>> { Some(std::mem::take(&mut self.values)) }
}

/// Publisher returned by [`Publisher::collect_by_count`].
#[derive(Clone)]
pub struct CollectByCount<U> {
  upstream: U,
  count: usize,
}

impl<U> CollectByCount<U> {
  /// # Panics
  /// When `count` is zero.
  pub fn new(upstream: U, count: usize) -> Self {
    assert!(count > 0, "collect_by_count needs a positive count");
    CollectByCount { upstream, count }
  }
}

impl<U: Publisher> Publisher for CollectByCount<U> {
  type Output = Vec<U::Output>;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = Vec<U::Output>, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      CollectByCountPipe {
        connection: Connection::new("collect_by_count", subscriber),
        count: self.count,
        buffer: Mutex::new(Vec::with_capacity(self.count)),
      },
    )
  }
}

struct CollectByCountPipe<T, D> {
  connection: Connection<D>,
  count: usize,
  buffer: Mutex<Vec<T>>,
}

impl<T, D> Pipe for CollectByCountPipe<T, D>
where
  T: Send + 'static,
  D: Subscriber<Input = Vec<T>>,
{
  type Input = T;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  /// Every batch the downstream asks for is `count` values upstream.
  #[inline]
  fn request(&self, demand: Demand) { self.connection.request(demand * self.count) }

  fn receive_input(&self, input: T) -> Demand {
    let full = {
      let mut buffer = self.buffer.lock();
      buffer.push(input);
      if buffer.len() < self.count {
        return Demand::NONE;
      }
      std::mem::replace(&mut *buffer, Vec::with_capacity(self.count))
    };
    self.connection.forward(full) * self.count
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    let rest = std::mem::take(&mut *self.buffer.lock());
    if completion.is_finished() && !rest.is_empty() {
      self.connection.forward(rest);
    }
    self.connection.forward_completion(completion)
  }

  fn cancel(&self) {
    self.buffer.lock().clear();
    self.connection.cancel();
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{CountingSubscription, Recorder},
  };

  #[test]
  fn collects_everything() {
    let rec = Recorder::<Vec<&str>, Never>::unlimited();
    sequence(vec!["a", "b", "c"]).collect().receive(rec.clone());
    assert_eq!(rec.values(), vec![vec!["a", "b", "c"]]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn batches_with_partial_tail() {
    let rec = Recorder::<Vec<i32>, Never>::unlimited();
    sequence(vec![1, 2, 3, 4, 5]).collect_by_count(2).receive(rec.clone());
    assert_eq!(rec.values(), vec![vec![1, 2], vec![3, 4], vec![5]]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn requests_in_multiples_of_count() {
    let rec = Recorder::<Vec<i32>, Never>::lazy();
    let source = AnyPublisher::<i32, Never>::from_fn({
      let rec = rec.clone();
      move |s| {
        let (sub, log) = CountingSubscription::new();
        s.receive_subscription(AnySubscription::new(sub));
        rec.request(Demand::max(2));
        assert_eq!(s.receive(1), Demand::NONE);
        assert_eq!(s.receive(2), Demand::NONE);
        assert_eq!(s.receive(3), Demand::NONE);
        assert_eq!(log.requests(), vec![Demand::max(6)]);
      }
    });
    source.collect_by_count(3).receive(rec.clone());
    assert_eq!(rec.values(), vec![vec![1, 2, 3]]);
  }

  #[test]
  fn demand_from_batches_scales_upstream() {
    let rec = Recorder::<Vec<i32>, Never>::new(Demand::max(1), Demand::max(1));
    sequence(1..=6).collect_by_count(2).receive(rec.clone());
    assert_eq!(rec.values(), vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
  }

  #[test]
  fn failure_drops_partial_batch() {
    let rec = Recorder::<Vec<i32>, &str>::unlimited();
    let source = AnyPublisher::<i32, &str>::from_fn(|s| {
      let (sub, _) = CountingSubscription::new();
      s.receive_subscription(AnySubscription::new(sub));
      s.receive(1);
      s.receive_completion(Completion::Failure("gone"));
    });
    source.collect_by_count(2).receive(rec.clone());
    assert!(rec.values().is_empty());
    assert_eq!(rec.completions(), vec![Completion::Failure("gone")]);
  }

  #[test]
  #[should_panic]
  fn zero_count_panics() { let _ = sequence(0..1).collect_by_count(0); }
}

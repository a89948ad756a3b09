//! Reduce, TryReduce and Count reducers.

use std::{marker::PhantomData, sync::Arc};

use crate::ops::aggregate::Reducer;

/// Reducer behind [`Publisher::reduce`](crate::prelude::Publisher::reduce).
pub struct Reduce<T, F, E> {
  acc: Option<T>,
  next: Arc<F>,
  _failure: PhantomData<fn() -> E>,
}

impl<T, F, E> Reduce<T, F, E> {
  pub fn new(initial: T, next: Arc<F>) -> Self { Reduce { acc: Some(initial), next, _failure: PhantomData } }
}

impl<I, T, F, E> Reducer<I> for Reduce<T, F, E>
where
  T: Send + 'static,
  F: Fn(T, I) -> T + Send + Sync + 'static,
  E: Send + 'static,
{
  type Output = T;
  type Failure = E;

  fn reduce(&mut self, input: I) -> Result<(), E> {
    if let Some(acc) = self.acc.take() {
      self.acc = Some((self.next)(acc, input));
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<T> { self.acc.take() }
}

/// Reducer behind [`Publisher::try_reduce`](crate::prelude::Publisher::try_reduce).
pub struct TryReduce<T, F> {
  acc: Option<T>,
  next: Arc<F>,
}

impl<T, F> TryReduce<T, F> {
  pub fn new(initial: T, next: Arc<F>) -> Self { TryReduce { acc: Some(initial), next } }
}

impl<I, T, F> Reducer<I> for TryReduce<T, F>
where
  T: Send + 'static,
  F: Fn(T, I) -> anyhow::Result<T> + Send + Sync + 'static,
{
  type Output = T;
  type Failure = anyhow::Error;

  fn reduce(&mut self, input: I) -> anyhow::Result<()> {
    if let Some(acc) = self.acc.take() {
      self.acc = Some((self.next)(acc, input)?);
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<T> { self.acc.take() }
}

/// Reducer behind [`Publisher::count`](crate::prelude::Publisher::count).
pub struct Count<E> {
  count: usize,
  _failure: PhantomData<fn() -> E>,
}

impl<E> Default for Count<E> {
  fn default() -> Self { Count { count: 0, _failure: PhantomData } }
}

impl<I, E: Send + 'static> Reducer<I> for Count<E> {
  type Output = usize;
  type Failure = E;

  #[inline]
  fn reduce(&mut self, _: I) -> Result<(), E> {
    self.count += 1;
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<usize> { Some(self.count) }
}

#[cfg(test)]
mod tests {
  use anyhow::ensure;

  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn sums_on_finish() {
    let rec = Recorder::<i32, Never>::unlimited();
    sequence(1..=5).reduce(0, |acc, v| acc + v).receive(rec.clone());
    assert_eq!(rec.values(), vec![15]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn empty_upstream_publishes_initial() {
    let rec = Recorder::<i32, Never>::unlimited();
    empty::<i32, Never>().reduce(42, |acc, v| acc + v).receive(rec.clone());
    assert_eq!(rec.values(), vec![42]);
  }

  #[test]
  fn try_reduce_fails_without_result() {
    let rec = Recorder::<i32, anyhow::Error>::unlimited();
    sequence(vec![1, 2, 0, 4])
      .try_reduce(100, |acc, v| {
        ensure!(v != 0, "division by zero");
        Ok(acc / v)
      })
      .receive(rec.clone());
    assert!(rec.values().is_empty());
    assert_eq!(rec.completion_messages(), vec!["failure: division by zero".to_string()]);
  }

  #[test]
  fn filter_then_count() {
    let rec = Recorder::<usize, Never>::unlimited();
    sequence(vec![1, 2, 3, 4, 5]).filter(|v| v % 2 == 0).count().receive(rec.clone());
    assert_eq!(rec.values(), vec![2]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn count_of_empty_is_zero() {
    let rec = Recorder::<usize, Never>::unlimited();
    empty::<&str, Never>().count().receive(rec.clone());
    assert_eq!(rec.values(), vec![0]);
  }
}

//! Comparison reducers behind `min`, `max` and their `_by` forms.
//!
//! `are_in_increasing_order(a, b)` answers whether `a` sorts before `b`.
//! Ties keep the value seen first. An empty upstream publishes nothing.

use std::sync::Arc;

use crate::ops::aggregate::Reducer;

pub struct Comparison<T, F, E> {
  order: Arc<F>,
  take_lesser: bool,
  best: Option<T>,
  _failure: std::marker::PhantomData<fn() -> E>,
}

impl<T, F, E> Comparison<T, F, E> {
  /// Keeps the least value when `take_lesser`, the greatest otherwise.
  pub fn new(order: Arc<F>, take_lesser: bool) -> Self {
    Comparison { order, take_lesser, best: None, _failure: std::marker::PhantomData }
  }
}

impl<T, F, E> Reducer<T> for Comparison<T, F, E>
where
  T: Send + 'static,
  F: Fn(&T, &T) -> bool + Send + Sync + 'static,
  E: Send + 'static,
{
  type Output = T;
  type Failure = E;

  fn reduce(&mut self, input: T) -> Result<(), E> {
    let replace = match &self.best {
      None => true,
      Some(best) if self.take_lesser => (self.order)(&input, best),
      Some(best) => (self.order)(best, &input),
    };
    if replace {
      self.best = Some(input);
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<T> { self.best.take() }
}

pub struct TryComparison<T, F> {
  order: Arc<F>,
  take_lesser: bool,
  best: Option<T>,
}

impl<T, F> TryComparison<T, F> {
  pub fn new(order: Arc<F>, take_lesser: bool) -> Self { TryComparison { order, take_lesser, best: None } }
}

impl<T, F> Reducer<T> for TryComparison<T, F>
where
  T: Send + 'static,
  F: Fn(&T, &T) -> anyhow::Result<bool> + Send + Sync + 'static,
{
  type Output = T;
  type Failure = anyhow::Error;

  fn reduce(&mut self, input: T) -> anyhow::Result<()> {
    let replace = match &self.best {
      None => true,
      Some(best) if self.take_lesser => (self.order)(&input, best)?,
      Some(best) => (self.order)(best, &input)?,
    };
    if replace {
      self.best = Some(input);
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<T> { self.best.take() }
}

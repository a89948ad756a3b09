//! Contains, ContainsWhere and TryContainsWhere reducers.

use std::{marker::PhantomData, sync::Arc};

use crate::ops::aggregate::Reducer;

pub struct Contains<T, E> {
  value: Arc<T>,
  found: bool,
  _failure: PhantomData<fn() -> E>,
}

impl<T, E> Contains<T, E> {
  pub fn new(value: Arc<T>) -> Self { Contains { value, found: false, _failure: PhantomData } }
}

impl<T, E> Reducer<T> for Contains<T, E>
where
  T: PartialEq + Send + Sync + 'static,
  E: Send + 'static,
{
  type Output = bool;
  type Failure = E;

  fn reduce(&mut self, input: T) -> Result<(), E> {
    self.found = self.found || input == *self.value;
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<bool> { Some(self.found) }
}

pub struct ContainsWhere<F, E> {
  predicate: Arc<F>,
  found: bool,
  _failure: PhantomData<fn() -> E>,
}

impl<F, E> ContainsWhere<F, E> {
  pub fn new(predicate: Arc<F>) -> Self { ContainsWhere { predicate, found: false, _failure: PhantomData } }
}

impl<I, F, E> Reducer<I> for ContainsWhere<F, E>
where
  F: Fn(&I) -> bool + Send + Sync + 'static,
  E: Send + 'static,
{
  type Output = bool;
  type Failure = E;

  fn reduce(&mut self, input: I) -> Result<(), E> {
    if !self.found {
      self.found = (self.predicate)(&input);
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<bool> { Some(self.found) }
}

pub struct TryContainsWhere<F> {
  predicate: Arc<F>,
  found: bool,
}

impl<F> TryContainsWhere<F> {
  pub fn new(predicate: Arc<F>) -> Self { TryContainsWhere { predicate, found: false } }
}

impl<I, F> Reducer<I> for TryContainsWhere<F>
where
  F: Fn(&I) -> anyhow::Result<bool> + Send + Sync + 'static,
{
  type Output = bool;
  type Failure = anyhow::Error;

  fn reduce(&mut self, input: I) -> anyhow::Result<()> {
    if !self.found {
      self.found = (self.predicate)(&input)?;
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<bool> { Some(self.found) }
}

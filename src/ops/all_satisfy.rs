//! AllSatisfy and TryAllSatisfy reducers.
//!
//! Once a value fails the predicate the answer is settled: later values are
//! still pulled but no longer tested.

use std::{marker::PhantomData, sync::Arc};

use crate::ops::aggregate::Reducer;

pub struct AllSatisfy<F, E> {
  predicate: Arc<F>,
  satisfied: bool,
  _failure: PhantomData<fn() -> E>,
}

impl<F, E> AllSatisfy<F, E> {
  pub fn new(predicate: Arc<F>) -> Self { AllSatisfy { predicate, satisfied: true, _failure: PhantomData } }
}

impl<I, F, E> Reducer<I> for AllSatisfy<F, E>
where
  F: Fn(&I) -> bool + Send + Sync + 'static,
  E: Send + 'static,
{
  type Output = bool;
  type Failure = E;

  fn reduce(&mut self, input: I) -> Result<(), E> {
    if self.satisfied {
      self.satisfied = (self.predicate)(&input);
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<bool> { Some(self.satisfied) }
}

pub struct TryAllSatisfy<F> {
  predicate: Arc<F>,
  satisfied: bool,
}

impl<F> TryAllSatisfy<F> {
  pub fn new(predicate: Arc<F>) -> Self { TryAllSatisfy { predicate, satisfied: true } }
}

impl<I, F> Reducer<I> for TryAllSatisfy<F>
where
  F: Fn(&I) -> anyhow::Result<bool> + Send + Sync + 'static,
{
  type Output = bool;
  type Failure = anyhow::Error;

  fn reduce(&mut self, input: I) -> anyhow::Result<()> {
    if self.satisfied {
      self.satisfied = (self.predicate)(&input)?;
    }
    Ok(())
  }

  #[inline]
  fn finish(&mut self) -> Option<bool> { Some(self.satisfied) }
}

//! Shared machinery for operators that publish a single result when the
//! upstream finishes.
//!
//! An aggregate requests an unlimited number of values from upstream as soon
//! as the downstream asks for anything, folds each value into a [`Reducer`],
//! and publishes the reducer's result on `finished`. A failure from upstream
//! is republished as is, and the partial result is discarded.

use std::{marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Per-subscription accumulation state.
pub trait Reducer<I>: Send + 'static {
  type Output: Send + 'static;
  type Failure: Send + 'static;

  /// Folds one value in. An `Err` fails the stream.
  fn reduce(&mut self, input: I) -> Result<(), Self::Failure>;

  /// The result to publish on `finished`, if any.
  fn finish(&mut self) -> Option<Self::Output>;
}

/// Publisher for every aggregating operator: [`Publisher::reduce`],
/// [`Publisher::count`], [`Publisher::collect`], [`Publisher::all_satisfy`],
/// [`Publisher::contains`], [`Publisher::min`] and their relatives.
pub struct Aggregate<U, R> {
  upstream: U,
  name: &'static str,
  make: Arc<dyn Fn() -> R + Send + Sync>,
}

impl<U, R> Aggregate<U, R> {
  pub fn new(upstream: U, name: &'static str, make: impl Fn() -> R + Send + Sync + 'static) -> Self {
    Aggregate { upstream, name, make: Arc::new(make) }
  }
}

impl<U: Clone, R> Clone for Aggregate<U, R> {
  fn clone(&self) -> Self {
    Aggregate { upstream: self.upstream.clone(), name: self.name, make: self.make.clone() }
  }
}

impl<U, R> Publisher for Aggregate<U, R>
where
  U: Publisher,
  U::Failure: Into<R::Failure>,
  R: Reducer<U::Output>,
{
  type Output = R::Output;
  type Failure = R::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = R::Output, Failure = R::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      ReducePipe {
        connection: Connection::new(self.name, subscriber),
        state: Mutex::new(ReduceState {
          reducer: Some((self.make)()),
          demanded: false,
          requested_upstream: false,
          parked: None,
        }),
        _upstream: PhantomData::<fn(U::Output, U::Failure)>,
      },
    )
  }
}

struct ReduceState<R, O> {
  reducer: Option<R>,
  demanded: bool,
  requested_upstream: bool,
  /// Result computed before the downstream asked for it.
  parked: Option<Option<O>>,
}

struct ReducePipe<I, E, D: Subscriber, R> {
  connection: Connection<D>,
  state: Mutex<ReduceState<R, <D as Subscriber>::Input>>,
  _upstream: PhantomData<fn(I, E)>,
}

impl<I, E, D, R> ReducePipe<I, E, D, R>
where
  D: Subscriber,
{
  fn publish(&self, result: Option<D::Input>) {
    if let Some(result) = result {
      self.connection.forward(result);
    }
    self.connection.finish();
  }
}

impl<I, E, D, R> Pipe for ReducePipe<I, E, D, R>
where
  I: Send + 'static,
  E: Into<R::Failure> + Send + 'static,
  R: Reducer<I>,
  D: Subscriber<Input = R::Output, Failure = R::Failure>,
{
  type Input = I;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn request(&self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    let (parked, ask_upstream) = {
      let mut state = self.state.lock();
      state.demanded = true;
      let ask = !state.requested_upstream;
      state.requested_upstream = true;
      (state.parked.take(), ask)
    };
    if let Some(result) = parked {
      self.publish(result);
    } else if ask_upstream {
      self.connection.request(Demand::UNLIMITED);
    }
  }

  fn receive_input(&self, input: I) -> Demand {
    let outcome = {
      let mut state = self.state.lock();
      match state.reducer.as_mut() {
        Some(reducer) => reducer.reduce(input),
        None => return Demand::NONE,
      }
    };
    match outcome {
      Ok(()) => Demand::UNLIMITED,
      Err(error) => {
        self.state.lock().reducer.take();
        self.connection.terminate(Completion::Failure(error));
        Demand::NONE
      }
    }
  }

  fn receive_completion(&self, completion: Completion<E>) {
    match completion {
      Completion::Failure(error) => {
        self.state.lock().reducer.take();
        self.connection.fail(error.into());
      }
      Completion::Finished => {
        let ready = {
          let mut state = self.state.lock();
          let result = state.reducer.take().and_then(|mut r| r.finish());
          if state.demanded {
            Some(result)
          } else {
            state.parked = Some(result);
            None
          }
        };
        if let Some(result) = ready {
          self.publish(result);
        }
      }
    }
  }

  fn cancel(&self) {
    {
      let mut state = self.state.lock();
      state.reducer.take();
      state.parked.take();
    }
    self.connection.cancel();
  }
}

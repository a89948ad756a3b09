//! MeasureInterval operator implementation.

use std::marker::PhantomData;

use parking_lot::Mutex;

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::measure_interval`].
///
/// Publishes the scheduler time elapsed since the previous value. The first
/// value only sets the baseline and is replaced by a request for one more.
#[derive(Clone)]
pub struct MeasureInterval<U, S> {
  upstream: U,
  scheduler: S,
}

impl<U, S> MeasureInterval<U, S> {
  pub fn new(upstream: U, scheduler: S) -> Self { MeasureInterval { upstream, scheduler } }
}

impl<U: Publisher, S: Scheduler> Publisher for MeasureInterval<U, S> {
  type Output = Stride;
  type Failure = U::Failure;

  fn receive<Sub>(&self, subscriber: Sub)
  where
    Sub: Subscriber<Input = Stride, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      MeasureIntervalPipe {
        connection: Connection::new("measure_interval", subscriber),
        scheduler: self.scheduler.clone(),
        last: Mutex::new(None),
        _input: PhantomData::<fn(U::Output)>,
      },
    )
  }
}

struct MeasureIntervalPipe<I, D, S: Scheduler> {
  connection: Connection<D>,
  scheduler: S,
  last: Mutex<Option<S::Time>>,
  _input: PhantomData<fn(I)>,
}

impl<I, D, S> Pipe for MeasureIntervalPipe<I, D, S>
where
  I: Send + 'static,
  D: Subscriber<Input = Stride>,
  S: Scheduler,
{
  type Input = I;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, _: I) -> Demand {
    let now = self.scheduler.now();
    let previous = self.last.lock().replace(now);
    match previous {
      Some(previous) => self.connection.forward(previous.distance_to(now)),
      None => Demand::max(1),
    }
  }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }
}

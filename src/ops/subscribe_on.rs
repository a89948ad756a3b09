//! SubscribeOn operator implementation.

use std::sync::Arc;

use crate::{
  pipe::{Connection, Pipe, PipeSubscriber},
  prelude::*,
};

/// Publisher returned by [`Publisher::subscribe_on`].
///
/// The upstream `receive` call runs as a task on the scheduler, and so do the
/// downstream's later `request` and `cancel` calls. Values are delivered on
/// whatever thread the upstream sends them from; pair with
/// [`Publisher::receive_on`] to move delivery too.
pub struct SubscribeOn<U, S> {
  upstream: Arc<U>,
  scheduler: S,
}

impl<U, S> SubscribeOn<U, S> {
  pub fn new(upstream: U, scheduler: S) -> Self { SubscribeOn { upstream: Arc::new(upstream), scheduler } }
}

impl<U, S: Clone> Clone for SubscribeOn<U, S> {
  fn clone(&self) -> Self { SubscribeOn { upstream: self.upstream.clone(), scheduler: self.scheduler.clone() } }
}

impl<U, S> Publisher for SubscribeOn<U, S>
where
  U: Publisher + 'static,
  S: Scheduler,
{
  type Output = U::Output;
  type Failure = U::Failure;

  fn receive<Sub>(&self, subscriber: Sub)
  where
    Sub: Subscriber<Input = U::Output, Failure = U::Failure>,
  {
    let pipe = PipeSubscriber::new(SubscribeOnPipe {
      connection: Connection::new("subscribe_on", subscriber),
      scheduler: self.scheduler.clone(),
    });
    let upstream = self.upstream.clone();
    self.scheduler.schedule(move || upstream.receive(pipe));
  }
}

struct SubscribeOnPipe<D, S> {
  connection: Connection<D>,
  scheduler: S,
}

impl<D: Subscriber, S: Scheduler> Pipe for SubscribeOnPipe<D, S> {
  type Input = D::Input;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  #[inline]
  fn receive_input(&self, input: D::Input) -> Demand { self.connection.forward(input) }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }

  fn request(&self, demand: Demand) {
    if self.connection.is_stopped() {
      return;
    }
    if let Some(upstream) = self.connection.upstream() {
      self.scheduler.schedule(move || upstream.request(demand));
    }
  }

  fn cancel(&self) {
    if let Some(upstream) = self.connection.detach() {
      self.scheduler.schedule(move || upstream.cancel());
    }
  }
}

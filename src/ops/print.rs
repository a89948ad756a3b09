//! Print operator implementation.

use std::{fmt::Debug, sync::Arc};

use tracing::info;

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::print`].
///
/// Every lifecycle event is logged at `INFO` as `"<prefix>: <event>"`, or as
/// the bare event when the prefix is empty.
#[derive(Clone)]
pub struct Print<U> {
  upstream: U,
  prefix: Arc<str>,
}

impl<U> Print<U> {
  pub fn new(upstream: U, prefix: String) -> Self { Print { upstream, prefix: prefix.into() } }
}

impl<U> Publisher for Print<U>
where
  U: Publisher,
  U::Output: Debug,
  U::Failure: Debug,
{
  type Output = U::Output;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      PrintPipe { connection: Connection::new("print", subscriber), prefix: self.prefix.clone() },
    )
  }
}

struct PrintPipe<D> {
  connection: Connection<D>,
  prefix: Arc<str>,
}

impl<D> PrintPipe<D> {
  fn write(&self, event: std::fmt::Arguments<'_>) {
    if self.prefix.is_empty() {
      info!(target: "rxpipe::print", "{event}");
    } else {
      info!(target: "rxpipe::print", "{}: {event}", self.prefix);
    }
  }
}

impl<D> Pipe for PrintPipe<D>
where
  D: Subscriber,
  D::Input: Debug,
  D::Failure: Debug,
{
  type Input = D::Input;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn did_subscribe(this: &Arc<Self>) {
    if let Some(upstream) = this.connection.upstream() {
      this.write(format_args!("receive subscription: ({upstream:?})"));
    }
  }

  fn request(&self, demand: Demand) {
    self.write(format_args!("request {demand}"));
    self.connection.request(demand)
  }

  fn receive_input(&self, input: D::Input) -> Demand {
    self.write(format_args!("receive value: ({input:?})"));
    self.connection.forward(input)
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    match &completion {
      Completion::Finished => self.write(format_args!("receive finished")),
      Completion::Failure(e) => self.write(format_args!("receive error: ({e:?})")),
    }
    self.connection.forward_completion(completion)
  }

  fn cancel(&self) {
    if !self.connection.is_stopped() {
      self.write(format_args!("receive cancel"));
    }
    self.connection.cancel()
  }
}

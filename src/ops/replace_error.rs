//! ReplaceError operator implementation.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::replace_error`]. It never fails.
pub struct ReplaceError<U: Publisher> {
  upstream: U,
  output: Arc<U::Output>,
}

impl<U: Publisher> ReplaceError<U> {
  pub fn new(upstream: U, output: U::Output) -> Self { ReplaceError { upstream, output: Arc::new(output) } }
}

impl<U: Publisher + Clone> Clone for ReplaceError<U> {
  fn clone(&self) -> Self { ReplaceError { upstream: self.upstream.clone(), output: self.output.clone() } }
}

impl<U> Publisher for ReplaceError<U>
where
  U: Publisher,
  U::Output: Clone + Sync,
{
  type Output = U::Output;
  type Failure = Never;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = Never>,
  {
    subscribe_pipe(
      &self.upstream,
      ReplaceErrorPipe {
        connection: Connection::new("replace_error", subscriber),
        output: self.output.clone(),
        _failure: PhantomData::<fn(U::Failure)>,
      },
    )
  }
}

struct ReplaceErrorPipe<E, D: Subscriber> {
  connection: Connection<D>,
  output: Arc<D::Input>,
  _failure: PhantomData<fn(E)>,
}

impl<E, D> Pipe for ReplaceErrorPipe<E, D>
where
  E: Send + 'static,
  D: Subscriber<Failure = Never>,
  D::Input: Clone + Sync,
{
  type Input = D::Input;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  #[inline]
  fn receive_input(&self, input: D::Input) -> Demand { self.connection.forward(input) }

  fn receive_completion(&self, completion: Completion<E>) {
    if !completion.is_finished() {
      self.connection.forward(D::Input::clone(&self.output));
    }
    self.connection.finish()
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Manual, Recorder},
  };

  #[test]
  fn failure_becomes_value_then_finish() {
    let source = Manual::<&str, std::io::Error>::new();
    let rec = Recorder::<&str, Never>::unlimited();
    source.clone().replace_error("fallback").receive(rec.clone());
    source.send("real");
    source.fail(std::io::Error::other("disk"));
    assert_eq!(rec.values(), vec!["real", "fallback"]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn finish_passes_through() {
    let rec = Recorder::<i32, Never>::unlimited();
    sequence(vec![1]).set_failure_type::<String>().replace_error(0).receive(rec.clone());
    assert_eq!(rec.values(), vec![1]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }
}

//! RemoveDuplicates operator implementation.
//!
//! Every published value is remembered; a value is published only if it
//! matches none of them. A dropped value asks upstream for one more.

use std::{marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::remove_duplicates`] and
/// [`Publisher::remove_duplicates_by`].
pub struct RemoveDuplicates<U, F> {
  upstream: U,
  matches: Arc<F>,
}

impl<U, F> RemoveDuplicates<U, F> {
  pub fn new(upstream: U, matches: F) -> Self { RemoveDuplicates { upstream, matches: Arc::new(matches) } }
}

impl<U: Clone, F> Clone for RemoveDuplicates<U, F> {
  fn clone(&self) -> Self { RemoveDuplicates { upstream: self.upstream.clone(), matches: self.matches.clone() } }
}

impl<U, F> Publisher for RemoveDuplicates<U, F>
where
  U: Publisher,
  U::Output: Clone,
  F: Fn(&U::Output, &U::Output) -> bool + Send + Sync + 'static,
{
  type Output = U::Output;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      RemoveDuplicatesPipe {
        connection: Connection::new("remove_duplicates", subscriber),
        seen: Mutex::new(vec![]),
        matches: self.matches.clone(),
      },
    )
  }
}

struct RemoveDuplicatesPipe<D: Subscriber, F> {
  connection: Connection<D>,
  seen: Mutex<Vec<D::Input>>,
  matches: Arc<F>,
}

impl<D, F> Pipe for RemoveDuplicatesPipe<D, F>
where
  D: Subscriber,
  D::Input: Clone,
  F: Fn(&D::Input, &D::Input) -> bool + Send + Sync + 'static,
{
  type Input = D::Input;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: D::Input) -> Demand {
    {
      let mut seen = self.seen.lock();
      if seen.iter().any(|old| (self.matches)(old, &input)) {
        return Demand::max(1);
      }
      seen.push(input.clone());
    }
    self.connection.forward(input)
  }

  #[inline]
  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.connection.forward_completion(completion)
  }
}

/// Publisher returned by [`Publisher::try_remove_duplicates`].
pub struct TryRemoveDuplicates<U, F> {
  upstream: U,
  matches: Arc<F>,
}

impl<U, F> TryRemoveDuplicates<U, F> {
  pub fn new(upstream: U, matches: F) -> Self {
    TryRemoveDuplicates { upstream, matches: Arc::new(matches) }
  }
}

impl<U: Clone, F> Clone for TryRemoveDuplicates<U, F> {
  fn clone(&self) -> Self {
    TryRemoveDuplicates { upstream: self.upstream.clone(), matches: self.matches.clone() }
  }
}

impl<U, F> Publisher for TryRemoveDuplicates<U, F>
where
  U: Publisher,
  U::Output: Clone,
  U::Failure: Into<anyhow::Error>,
  F: Fn(&U::Output, &U::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
{
  type Output = U::Output;
  type Failure = anyhow::Error;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = anyhow::Error>,
  {
    subscribe_pipe(
      &self.upstream,
      TryRemoveDuplicatesPipe {
        connection: Connection::new("try_remove_duplicates", subscriber),
        seen: Mutex::new(vec![]),
        matches: self.matches.clone(),
        _failure: PhantomData::<fn(U::Failure)>,
      },
    )
  }
}

struct TryRemoveDuplicatesPipe<E, D: Subscriber, F> {
  connection: Connection<D>,
  seen: Mutex<Vec<D::Input>>,
  matches: Arc<F>,
  _failure: PhantomData<fn(E)>,
}

impl<E, D, F> TryRemoveDuplicatesPipe<E, D, F>
where
  D: Subscriber,
  F: Fn(&D::Input, &D::Input) -> anyhow::Result<bool>,
{
  fn is_duplicate(&self, seen: &[D::Input], input: &D::Input) -> anyhow::Result<bool> {
    for old in seen {
      if (self.matches)(old, input)? {
        return Ok(true);
      }
    }
    Ok(false)
  }
}

impl<E, D, F> Pipe for TryRemoveDuplicatesPipe<E, D, F>
where
  E: Into<anyhow::Error> + Send + 'static,
  D: Subscriber<Failure = anyhow::Error>,
  D::Input: Clone,
  F: Fn(&D::Input, &D::Input) -> anyhow::Result<bool> + Send + Sync + 'static,
{
  type Input = D::Input;
  type Failure = E;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn receive_input(&self, input: D::Input) -> Demand {
    let verdict = {
      let mut seen = self.seen.lock();
      let verdict = self.is_duplicate(&seen, &input);
      if let Ok(false) = verdict {
        seen.push(input.clone());
      }
      verdict
    };
    match verdict {
      Ok(false) => self.connection.forward(input),
      Ok(true) => Demand::max(1),
      Err(error) => {
        self.connection.terminate(Completion::Failure(error));
        Demand::NONE
      }
    }
  }

  fn receive_completion(&self, completion: Completion<E>) {
    self.connection.forward_completion(completion.map_failure(Into::into))
  }
}

#[cfg(test)]
mod tests {
  use anyhow::bail;

  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn drops_every_value_seen_before() {
    let rec = Recorder::<i32, Never>::unlimited();
    sequence(vec![1, 2, 1, 3, 2, 2, 4, 1]).remove_duplicates().receive(rec.clone());
    assert_eq!(rec.values(), vec![1, 2, 3, 4]);
    assert_eq!(rec.completions(), vec![Completion::Finished]);
  }

  #[test]
  fn dropped_values_keep_the_pull_going() {
    let rec = Recorder::<i32, Never>::new(Demand::max(3), Demand::NONE);
    sequence(vec![5, 5, 5, 6, 6, 7, 8]).remove_duplicates().receive(rec.clone());
    assert_eq!(rec.values(), vec![5, 6, 7]);
    assert!(rec.completions().is_empty());
  }

  #[test]
  fn custom_match() {
    let rec = Recorder::<&str, Never>::unlimited();
    sequence(vec!["apple", "Avocado", "banana", "blueberry", "cherry"])
      .remove_duplicates_by(|a: &&str, b: &&str| a[..1].eq_ignore_ascii_case(&b[..1]))
      .receive(rec.clone());
    assert_eq!(rec.values(), vec!["apple", "banana", "cherry"]);
  }

  #[test]
  fn try_remove_duplicates_fails_on_error() {
    let rec = Recorder::<i32, anyhow::Error>::unlimited();
    sequence(vec![1, 2, 1, -1])
      .try_remove_duplicates(|a, b| {
        if *b < 0 {
          bail!("negative value {b}")
        }
        Ok(a == b)
      })
      .receive(rec.clone());
    assert_eq!(rec.values(), vec![1, 2]);
    assert_eq!(rec.completion_messages(), vec!["failure: negative value -1".to_string()]);
  }
}

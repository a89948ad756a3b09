use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::Conduit;
use crate::{atomic::Atomic, bag::Bag, prelude::*};

struct State<O, F> {
  members: Bag<Arc<Conduit<O, F>>>,
  terminal: Option<Completion<F>>,
}

struct Inner<O, F> {
  stop: Atomic<bool>,
  state: Mutex<State<O, F>>,
}

/// A subject that multicasts every value to the subscribers that currently
/// have demand, and keeps no value of its own.
///
/// Clones share the same subscribers. Subscribers arriving after completion
/// receive an empty subscription followed by the same completion.
///
/// ```
/// use rxpipe::prelude::*;
///
/// let subject = PassthroughSubject::<&str, Never>::new();
/// let _printer = subject.clone().sink_value(|v| println!("{v}"));
/// subject.send("hello");
/// subject.finish();
/// ```
pub struct PassthroughSubject<O, F> {
  inner: Arc<Inner<O, F>>,
}

impl<O, F> Clone for PassthroughSubject<O, F> {
  fn clone(&self) -> Self { PassthroughSubject { inner: self.inner.clone() } }
}

impl<O, F> Default for PassthroughSubject<O, F> {
  fn default() -> Self {
    PassthroughSubject {
      inner: Arc::new(Inner {
        stop: Atomic::new(false),
        state: Mutex::new(State { members: Bag::new(), terminal: None }),
      }),
    }
  }
}

impl<O, F> PassthroughSubject<O, F> {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Number of subscribers currently attached.
  pub fn subscriber_count(&self) -> usize { self.inner.state.lock().members.len() }

  #[inline]
  pub fn is_completed(&self) -> bool { self.inner.stop.load() }
}

fn detach<O, F>(inner: Weak<Inner<O, F>>, conduit: &Arc<Conduit<O, F>>) -> impl FnOnce() + Send + 'static
where
  O: Send + 'static,
  F: Send + 'static,
{
  let key = conduit.subscriber_id();
  let conduit_id = conduit.combine_identifier();
  move || {
    if let Some(inner) = inner.upgrade() {
      let mut state = inner.state.lock();
      // A later subscription under the same key may have replaced this one.
      if state.members.get(key).map(|c| c.combine_identifier()) == Some(conduit_id) {
        state.members.remove(key);
      }
    }
  }
}

impl<O, F> Publisher for PassthroughSubject<O, F>
where
  O: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  type Output = O;
  type Failure = F;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = O, Failure = F>,
  {
    let conduit = Conduit::new(AnySubscriber::new(subscriber));
    conduit.on_cancel(detach(Arc::downgrade(&self.inner), &conduit));
    let terminal = {
      let mut state = self.inner.state.lock();
      match &state.terminal {
        Some(completion) => Some(completion.clone()),
        None => {
          state.members.insert_with_id(conduit.subscriber_id(), conduit.clone());
          None
        }
      }
    };
    conduit.start();
    if let Some(completion) = terminal {
      conduit.complete(completion);
    }
  }
}

impl<O, F> Subject for PassthroughSubject<O, F>
where
  O: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  fn send(&self, value: O) {
    if self.inner.stop.load() {
      return;
    }
    let members = self.inner.state.lock().members.snapshot();
    for member in members {
      member.offer(value.clone());
    }
  }

  fn send_completion(&self, completion: Completion<F>) {
    if self.inner.stop.exchange(true) {
      return;
    }
    let members = {
      let mut state = self.inner.state.lock();
      state.terminal = Some(completion.clone());
      state.members.take()
    };
    for member in members {
      member.complete(completion.clone());
    }
  }
}

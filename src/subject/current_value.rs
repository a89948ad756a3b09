use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::Conduit;
use crate::{atomic::Atomic, prelude::*};

struct State<O, F> {
  value: O,
  slot: Option<Arc<Conduit<O, F>>>,
  terminal: Option<Completion<F>>,
}

struct Inner<O, F> {
  stop: Atomic<bool>,
  state: Mutex<State<O, F>>,
}

/// A subject that wraps a single value and publishes it whenever it
/// changes.
///
/// It serves one subscriber at a time: a new subscriber takes the place of
/// the previous one. The subscriber first receives the value current at its
/// first request. A value sent while the subscriber has no demand replaces
/// any undelivered one, so a slow subscriber catches up to the latest value
/// rather than every value.
pub struct CurrentValueSubject<O, F> {
  inner: Arc<Inner<O, F>>,
}

impl<O, F> Clone for CurrentValueSubject<O, F> {
  fn clone(&self) -> Self { CurrentValueSubject { inner: self.inner.clone() } }
}

impl<O: Clone, F> CurrentValueSubject<O, F> {
  pub fn new(value: O) -> Self {
    CurrentValueSubject {
      inner: Arc::new(Inner {
        stop: Atomic::new(false),
        state: Mutex::new(State { value, slot: None, terminal: None }),
      }),
    }
  }

  pub fn value(&self) -> O { self.inner.state.lock().value.clone() }

  #[inline]
  pub fn is_completed(&self) -> bool { self.inner.stop.load() }
}

impl<O, F> CurrentValueSubject<O, F>
where
  O: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  /// Replaces the value and publishes it.
  #[inline]
  pub fn set_value(&self, value: O) { self.send(value) }
}

impl<O, F> Publisher for CurrentValueSubject<O, F>
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
    let weak: Weak<Inner<O, F>> = Arc::downgrade(&self.inner);
    let id = conduit.combine_identifier();
    conduit.on_cancel(move || {
      if let Some(inner) = weak.upgrade() {
        let mut state = inner.state.lock();
        if state.slot.as_ref().map(|c| c.combine_identifier()) == Some(id) {
          state.slot = None;
        }
      }
    });
    let terminal = {
      let mut state = self.inner.state.lock();
      match &state.terminal {
        Some(completion) => Some(completion.clone()),
        None => {
          conduit.offer_latest(state.value.clone());
          state.slot = Some(conduit.clone());
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

impl<O, F> Subject for CurrentValueSubject<O, F>
where
  O: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  fn send(&self, value: O) {
    if self.inner.stop.load() {
      return;
    }
    let slot = {
      let mut state = self.inner.state.lock();
      state.value = value.clone();
      state.slot.clone()
    };
    if let Some(conduit) = slot {
      conduit.offer_latest(value);
    }
  }

  fn send_completion(&self, completion: Completion<F>) {
    if self.inner.stop.exchange(true) {
      return;
    }
    let slot = {
      let mut state = self.inner.state.lock();
      state.terminal = Some(completion.clone());
      state.slot.take()
    };
    if let Some(conduit) = slot {
      conduit.complete(completion);
    }
  }
}

//! Shared machinery for operators.
//!
//! An operator instance sits between two parties: its upstream sees a
//! [`Subscriber`], its downstream sees a [`Subscription`]. [`Connection`]
//! holds the state both roles share (a one-shot stop latch, the downstream,
//! and the upstream subscription link) and enforces the protocol rules in one
//! place:
//!
//! - nothing is forwarded once the latch is set;
//! - a completion reaches the downstream at most once, because the latch is
//!   set before the downstream is called;
//! - the upstream link is released exactly once, on cancel or on terminal
//!   completion;
//! - no lock is held while calling into either neighbor.
//!
//! Operators implement [`Pipe`] and only describe what happens to values and
//! completions; [`PipeSubscriber`] and [`PipeSubscription`] adapt an
//! `Arc<impl Pipe>` to both sides of the protocol.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::{
  atomic::Atomic,
  demand::Demand,
  identifier::{CombineIdentifier, Identity},
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{AnySubscription, Cancellable, Subscription},
};

pub struct Connection<D> {
  id: CombineIdentifier,
  name: &'static str,
  stop: Atomic<bool>,
  downstream: D,
  upstream: Mutex<Option<AnySubscription>>,
}

impl<D: Subscriber> Connection<D> {
  pub fn new(name: &'static str, downstream: D) -> Self {
    Connection {
      id: CombineIdentifier::new(),
      name,
      stop: Atomic::new(false),
      downstream,
      upstream: Mutex::new(None),
    }
  }

  #[inline]
  pub fn id(&self) -> CombineIdentifier { self.id }

  #[inline]
  pub fn name(&self) -> &'static str { self.name }

  #[inline]
  pub fn downstream(&self) -> &D { &self.downstream }

  #[inline]
  pub fn is_stopped(&self) -> bool { self.stop.load() }

  /// Sets the stop latch. Returns `true` only for the call that set it.
  #[inline]
  pub fn halt(&self) -> bool { !self.stop.exchange(true) }

  /// Stores the upstream subscription. Returns `false`, after cancelling
  /// `subscription`, when the connection already stopped or already has an
  /// upstream.
  pub fn attach(&self, subscription: AnySubscription) -> bool {
    let mut upstream = self.upstream.lock();
    // Checked under the lock: `cancel` sets the latch before it takes the
    // upstream out, so a racing subscription is either seen here as stopped
    // or found there.
    if self.is_stopped() {
      drop(upstream);
      trace!(op = self.name, id = %self.id, "subscription arrived after stop");
      subscription.cancel();
      return false;
    }
    if upstream.is_some() {
      drop(upstream);
      warn!(op = self.name, id = %self.id, "second upstream subscription cancelled");
      debug_assert!(false, "{} received a second upstream subscription", self.name);
      subscription.cancel();
      return false;
    }
    trace!(op = self.name, id = %self.id, "subscribed");
    *upstream = Some(subscription);
    true
  }

  #[inline]
  pub fn upstream(&self) -> Option<AnySubscription> { self.upstream.lock().clone() }

  /// Passes demand to the upstream. A no-op once stopped.
  pub fn request(&self, demand: Demand) {
    if self.is_stopped() {
      trace!(op = self.name, id = %self.id, %demand, "request after stop ignored");
      return;
    }
    if let Some(upstream) = self.upstream() {
      upstream.request(demand);
    }
  }

  /// Sends a value downstream, or returns `Demand::NONE` once stopped.
  #[inline]
  pub fn forward(&self, input: D::Input) -> Demand {
    if self.is_stopped() { Demand::NONE } else { self.downstream.receive(input) }
  }

  /// Completes the downstream once. The upstream link is released without
  /// being cancelled, since the upstream is the party that completed.
  pub fn forward_completion(&self, completion: Completion<D::Failure>) {
    if !self.halt() {
      return;
    }
    let upstream = self.upstream.lock().take();
    drop(upstream);
    trace!(op = self.name, id = %self.id, finished = completion.is_finished(), "completed");
    self.downstream.receive_completion(completion);
  }

  #[inline]
  pub fn finish(&self) { self.forward_completion(Completion::Finished) }

  #[inline]
  pub fn fail(&self, failure: D::Failure) { self.forward_completion(Completion::Failure(failure)) }

  /// Ends the stream from inside the operator: cancels the upstream, then
  /// completes the downstream once.
  pub fn terminate(&self, completion: Completion<D::Failure>) {
    if !self.halt() {
      return;
    }
    let upstream = self.upstream.lock().take();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
    trace!(op = self.name, id = %self.id, finished = completion.is_finished(), "terminated");
    self.downstream.receive_completion(completion);
  }

  /// Sets the stop latch and hands back the upstream instead of cancelling
  /// it. Only the call that set the latch gets `Some`.
  pub fn detach(&self) -> Option<AnySubscription> {
    if !self.halt() {
      return None;
    }
    trace!(op = self.name, id = %self.id, "detached");
    self.upstream.lock().take()
  }

  /// Stops forwarding and cancels the upstream, exactly once.
  pub fn cancel(&self) {
    if !self.halt() {
      return;
    }
    trace!(op = self.name, id = %self.id, "cancelled");
    let upstream = self.upstream.lock().take();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }
}

/// An operator's state machine.
///
/// Implementors only describe values and completions. The default `request`
/// and `cancel` delegate to the [`Connection`], which is enough for every
/// operator that does not buffer.
pub trait Pipe: Send + Sync + Sized + 'static {
  /// Value type received from upstream.
  type Input: Send + 'static;
  /// Failure type received from upstream.
  type Failure: Send + 'static;
  type Downstream: Subscriber;

  fn connection(&self) -> &Connection<Self::Downstream>;

  fn receive_input(&self, input: Self::Input) -> Demand;

  fn receive_completion(&self, completion: Completion<Self::Failure>);

  #[inline]
  fn request(&self, demand: Demand) { self.connection().request(demand) }

  #[inline]
  fn cancel(&self) { self.connection().cancel() }

  /// Runs once the upstream subscription is attached, before the downstream
  /// receives its own.
  fn did_subscribe(_this: &Arc<Self>) {}
}

/// The face of a pipe its upstream sees.
pub struct PipeSubscriber<P>(pub Arc<P>);

impl<P: Pipe> PipeSubscriber<P> {
  #[inline]
  pub fn new(pipe: P) -> Self { PipeSubscriber(Arc::new(pipe)) }
}

impl<P: Pipe> Identity for PipeSubscriber<P> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.connection().id() }
}

impl<P: Pipe> Subscriber for PipeSubscriber<P> {
  type Input = P::Input;
  type Failure = P::Failure;

  fn receive_subscription(&self, subscription: AnySubscription) {
    if !self.0.connection().attach(subscription) {
      return;
    }
    P::did_subscribe(&self.0);
    let own = AnySubscription::new(PipeSubscription(self.0.clone()));
    self.0.connection().downstream().receive_subscription(own);
  }

  #[inline]
  fn receive(&self, input: P::Input) -> Demand {
    if self.0.connection().is_stopped() { Demand::NONE } else { self.0.receive_input(input) }
  }

  #[inline]
  fn receive_completion(&self, completion: Completion<P::Failure>) {
    if !self.0.connection().is_stopped() {
      self.0.receive_completion(completion)
    }
  }
}

/// The face of a pipe its downstream sees.
pub struct PipeSubscription<P>(pub Arc<P>);

impl<P: Pipe> Cancellable for PipeSubscription<P> {
  #[inline]
  fn cancel(&self) { self.0.cancel() }
}

impl<P: Pipe> Identity for PipeSubscription<P> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.connection().id() }
}

impl<P: Pipe> Subscription for PipeSubscription<P> {
  #[inline]
  fn request(&self, demand: Demand) { self.0.request(demand) }
}

/// Subscribes `pipe` to `upstream`.
#[inline]
pub fn subscribe_pipe<U, P>(upstream: &U, pipe: P)
where
  U: Publisher + ?Sized,
  P: Pipe<Input = U::Output, Failure = U::Failure>,
{
  upstream.receive(PipeSubscriber::new(pipe))
}

//! Cancellation and the pull half of the subscriber protocol.

use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  identifier::{CombineIdentifier, Identity},
};

/// Something whose activity can be stopped.
///
/// `cancel` must be idempotent and callable from any thread, concurrently
/// with in-flight delivery. Only the first call has an observable effect.
pub trait Cancellable: Send + Sync {
  fn cancel(&self);
}

/// The link between one publisher and one subscriber, handed to the
/// subscriber through [`Subscriber::receive_subscription`].
///
/// `request` adds to the outstanding demand. After `cancel`, further requests
/// are no-ops.
///
/// [`Subscriber::receive_subscription`]: crate::subscriber::Subscriber::receive_subscription
pub trait Subscription: Cancellable + Identity {
  fn request(&self, demand: Demand);
}

impl<T: Cancellable + ?Sized> Cancellable for Arc<T> {
  #[inline]
  fn cancel(&self) { (**self).cancel() }
}

impl<T: Subscription + ?Sized> Subscription for Arc<T> {
  #[inline]
  fn request(&self, demand: Demand) { (**self).request(demand) }
}

/// A shared, type-erased [`Subscription`].
#[derive(Clone)]
pub struct AnySubscription(Arc<dyn Subscription>);

impl AnySubscription {
  #[inline]
  pub fn new<S: Subscription + 'static>(subscription: S) -> Self {
    AnySubscription(Arc::new(subscription))
  }

  #[inline]
  pub fn from_arc(subscription: Arc<dyn Subscription>) -> Self { AnySubscription(subscription) }
}

impl Cancellable for AnySubscription {
  #[inline]
  fn cancel(&self) { self.0.cancel() }
}

impl Identity for AnySubscription {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.combine_identifier() }
}

impl Subscription for AnySubscription {
  #[inline]
  fn request(&self, demand: Demand) { self.0.request(demand) }
}

impl Debug for AnySubscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("AnySubscription").field(&self.combine_identifier()).finish()
  }
}

/// Well-known subscriptions.
pub struct Subscriptions;

impl Subscriptions {
  /// A subscription that ignores both requests and cancellation. Used by
  /// publishers that complete right away and by subjects that have already
  /// terminated.
  pub fn empty() -> AnySubscription { AnySubscription::new(EmptySubscription(CombineIdentifier::new())) }
}

struct EmptySubscription(CombineIdentifier);

impl Cancellable for EmptySubscription {
  fn cancel(&self) {}
}

impl Identity for EmptySubscription {
  fn combine_identifier(&self) -> CombineIdentifier { self.0 }
}

impl Subscription for EmptySubscription {
  fn request(&self, _: Demand) {}
}

struct CancelInner {
  id: CombineIdentifier,
  action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

/// A type-erased cancellation token that runs its action at most once.
///
/// Clones share the same action, so cancelling any clone cancels them all.
/// Dropping the token does not cancel; use [`AnyCancellable::cancel_when_dropped`]
/// to tie cancellation to a scope.
#[derive(Clone)]
pub struct AnyCancellable(Arc<CancelInner>);

impl AnyCancellable {
  pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
    AnyCancellable(Arc::new(CancelInner {
      id: CombineIdentifier::new(),
      action: Mutex::new(Some(Box::new(action))),
    }))
  }

  /// Wraps any [`Cancellable`].
  pub fn from_cancellable<C: Cancellable + 'static>(cancellable: C) -> Self {
    Self::new(move || cancellable.cancel())
  }

  /// A token whose cancellation does nothing.
  pub fn empty() -> Self {
    AnyCancellable(Arc::new(CancelInner { id: CombineIdentifier::new(), action: Mutex::new(None) }))
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.0.action.lock().is_none() }

  /// Activates RAII behavior: the returned guard cancels this token when it
  /// goes out of scope.
  ///
  /// **Attention:** if the guard is not bound to a variable it is dropped,
  /// and the token cancelled, immediately.
  pub fn cancel_when_dropped(self) -> CancellableGuard { CancellableGuard(Some(self)) }
}

impl Cancellable for AnyCancellable {
  fn cancel(&self) {
    // Taken out first so the action runs without the lock held.
    let action = self.0.action.lock().take();
    if let Some(action) = action {
      action();
    }
  }
}

impl Identity for AnyCancellable {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.id }
}

impl Debug for AnyCancellable {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AnyCancellable")
      .field("id", &self.0.id)
      .field("is_cancelled", &self.is_cancelled())
      .finish()
  }
}

/// Cancels the wrapped token when dropped.
#[derive(Debug)]
#[must_use]
pub struct CancellableGuard(Option<AnyCancellable>);

impl CancellableGuard {
  /// Releases the token without cancelling it.
  pub fn into_inner(mut self) -> AnyCancellable {
    self.0.take().unwrap_or_else(AnyCancellable::empty)
  }
}

impl Drop for CancellableGuard {
  #[inline]
  fn drop(&mut self) {
    if let Some(token) = self.0.take() {
      token.cancel();
    }
  }
}

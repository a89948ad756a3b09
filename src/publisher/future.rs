use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{atomic::Atomic, prelude::*};

/// A publisher that eventually produces a single value, or fails.
///
/// The result is settled once through the [`Promise`] handed to the
/// constructor's closure. Every subscriber, whether it arrived before or
/// after the promise settled, receives that result once it requests a value.
///
/// # Examples
///
/// ```
/// use rxpipe::prelude::*;
///
/// let answer = Future::<i32, Never>::new(|promise| {
///   promise.succeed(42);
/// });
/// answer.sink_value(|v| assert_eq!(v, 42));
/// ```
pub struct Future<T, E> {
  inner: Arc<FutureInner<T, E>>,
}

/// Settles a [`Future`]. Only the first call has an effect.
pub struct Promise<T, E> {
  inner: Arc<FutureInner<T, E>>,
}

struct FutureInner<T, E> {
  state: Mutex<FutureState<T, E>>,
}

enum FutureState<T, E> {
  Pending(Vec<Weak<dyn Waiter>>),
  Settled(Result<T, E>),
}

trait Waiter: Send + Sync {
  fn settled(&self);
}

impl<T, E> Future<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  /// Runs `attempt` right away with the promise that settles this future.
  pub fn new(attempt: impl FnOnce(Promise<T, E>)) -> Self {
    let future = Self::pending();
    attempt(future.promise());
    future
  }

  /// An unsettled future; use [`Future::promise`] to settle it later.
  pub fn pending() -> Self {
    Future { inner: Arc::new(FutureInner { state: Mutex::new(FutureState::Pending(vec![])) }) }
  }

  pub fn promise(&self) -> Promise<T, E> { Promise { inner: self.inner.clone() } }

  pub fn is_settled(&self) -> bool {
    matches!(*self.inner.state.lock(), FutureState::Settled(_))
  }
}

impl<T, E> Clone for Future<T, E> {
  fn clone(&self) -> Self { Future { inner: self.inner.clone() } }
}

impl<T, E> Clone for Promise<T, E> {
  fn clone(&self) -> Self { Promise { inner: self.inner.clone() } }
}

impl<T: Clone, E: Clone> FutureInner<T, E> {
  fn result(&self) -> Option<Result<T, E>> {
    match &*self.state.lock() {
      FutureState::Settled(result) => Some(result.clone()),
      FutureState::Pending(_) => None,
    }
  }
}

impl<T, E> Promise<T, E> {
  /// Settles the future. Returns `false` if it was already settled.
  pub fn settle(&self, result: Result<T, E>) -> bool {
    let waiters = {
      let mut state = self.inner.state.lock();
      match &mut *state {
        FutureState::Settled(_) => return false,
        FutureState::Pending(waiters) => {
          let waiters = std::mem::take(waiters);
          *state = FutureState::Settled(result);
          waiters
        }
      }
    };
    for waiter in waiters.iter().filter_map(Weak::upgrade) {
      waiter.settled();
    }
    true
  }

  #[inline]
  pub fn succeed(&self, value: T) -> bool { self.settle(Ok(value)) }

  #[inline]
  pub fn fail(&self, error: E) -> bool { self.settle(Err(error)) }
}

impl<T, E> Publisher for Future<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  type Output = T;
  type Failure = E;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = E>,
  {
    let subscription = Arc::new(FutureSubscription {
      id: CombineIdentifier::new(),
      future: self.inner.clone(),
      requested: Atomic::new(false),
      done: Atomic::new(false),
      downstream: subscriber,
    });
    {
      let mut state = self.inner.state.lock();
      if let FutureState::Pending(waiters) = &mut *state {
        waiters.retain(|w| w.strong_count() > 0);
        let waiter: Arc<dyn Waiter> = subscription.clone();
        waiters.push(Arc::downgrade(&waiter));
      }
    }
    subscription.downstream.receive_subscription(AnySubscription::new(subscription.clone()));
  }
}

struct FutureSubscription<T, E, S> {
  id: CombineIdentifier,
  future: Arc<FutureInner<T, E>>,
  requested: Atomic<bool>,
  done: Atomic<bool>,
  downstream: S,
}

impl<T, E, S> FutureSubscription<T, E, S>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
  S: Subscriber<Input = T, Failure = E>,
{
  /// Delivers once both a request and a result are present.
  fn try_deliver(&self) {
    if !self.requested.load() || self.done.load() {
      return;
    }
    let Some(result) = self.future.result() else { return };
    if self.done.exchange(true) {
      return;
    }
    match result {
      Ok(value) => {
        self.downstream.receive(value);
        self.downstream.receive_completion(Completion::Finished);
      }
      Err(error) => self.downstream.receive_completion(Completion::Failure(error)),
    }
  }
}

impl<T, E, S> Waiter for FutureSubscription<T, E, S>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
  S: Subscriber<Input = T, Failure = E>,
{
  fn settled(&self) { self.try_deliver() }
}

impl<T, E, S> Cancellable for FutureSubscription<T, E, S>
where
  T: Send,
  E: Send,
  S: Send + Sync,
{
  fn cancel(&self) { self.done.store(true); }
}

impl<T, E, S> Identity for FutureSubscription<T, E, S> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<T, E, S> Subscription for FutureSubscription<T, E, S>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
  S: Subscriber<Input = T, Failure = E>,
{
  fn request(&self, demand: Demand) {
    if demand.has_any() {
      self.requested.store(true);
      self.try_deliver();
    }
  }
}

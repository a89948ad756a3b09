//! DropUntilOutput operator implementation.
//!
//! The upstream and the trigger publisher feed one shared
//! [`DropUntilInner`]. Upstream values are dropped until the trigger
//! publishes its first value; the trigger is cancelled at that point and
//! every later upstream value is forwarded.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  atomic::Atomic,
  lock::{Lock, MutexLock},
  pipe::Connection,
  prelude::*,
};

const UPSTREAM: usize = 0;
const TRIGGER: usize = 1;

/// Publisher returned by [`Publisher::drop_until_output`].
///
/// A failure from either side fails the stream. The trigger finishing
/// without a value leaves the stream dropping until the upstream completes.
#[derive(Clone)]
pub struct DropUntilOutput<U, T> {
  upstream: U,
  trigger: T,
}

impl<U, T> DropUntilOutput<U, T> {
  pub fn new(upstream: U, trigger: T) -> Self { DropUntilOutput { upstream, trigger } }
}

impl<U, T> Publisher for DropUntilOutput<U, T>
where
  U: Publisher,
  T: Publisher<Failure = U::Failure>,
{
  type Output = U::Output;
  type Failure = U::Failure;

  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = U::Output, Failure = U::Failure>,
  {
    let inner = Arc::new(DropUntilInner {
      connection: Connection::new("drop_until_output", subscriber),
      delivery: MutexLock::recursive(),
      open: Atomic::new(false),
      requested: Mutex::new(Demand::NONE),
      children: Mutex::new([None, None]),
    });
    let own = AnySubscription::new(DropUntilSubscription(inner.clone()));
    inner.connection.downstream().receive_subscription(own);
    // The trigger goes first so a synchronous one opens the gate in time.
    self.trigger.receive(TriggerChild::new(inner.clone()));
    self.upstream.receive(UpstreamChild::new(inner));
  }
}

struct DropUntilInner<D: Subscriber> {
  connection: Connection<D>,
  delivery: MutexLock,
  open: Atomic<bool>,
  requested: Mutex<Demand>,
  children: Mutex<[Option<AnySubscription>; 2]>,
}

impl<D: Subscriber> DropUntilInner<D> {
  fn attach(&self, index: usize, subscription: AnySubscription) {
    {
      let mut children = self.children.lock();
      let closed = index == TRIGGER && self.open.load();
      if self.connection.is_stopped() || closed || children[index].is_some() {
        drop(children);
        subscription.cancel();
        return;
      }
      children[index] = Some(subscription.clone());
    }
    let demand = if index == TRIGGER { Demand::max(1) } else { *self.requested.lock() };
    if demand.has_any() {
      subscription.request(demand);
    }
  }

  fn request(&self, demand: Demand) {
    if demand.is_none() || self.connection.is_stopped() {
      return;
    }
    *self.requested.lock() += demand;
    let upstream = self.children.lock()[UPSTREAM].clone();
    if let Some(upstream) = upstream {
      upstream.request(demand);
    }
  }

  fn receive(&self, value: D::Input) -> Demand {
    self.delivery.locking(|| {
      if !self.open.load() {
        // Dropped, so the upstream may send one more.
        return Demand::max(1);
      }
      self.connection.forward(value)
    })
  }

  fn open(&self) {
    let trigger = self.delivery.locking(|| {
      self.open.store(true);
      self.children.lock()[TRIGGER].take()
    });
    if let Some(trigger) = trigger {
      trigger.cancel();
    }
  }

  fn complete(&self, index: usize, completion: Completion<D::Failure>) {
    match (index, completion) {
      (TRIGGER, Completion::Finished) => {
        self.children.lock()[TRIGGER] = None;
      }
      (_, completion) => {
        let others = std::mem::take(&mut *self.children.lock());
        for (i, child) in others.into_iter().enumerate() {
          match child {
            Some(child) if i != index => child.cancel(),
            _ => {}
          }
        }
        self.delivery.locking(|| self.connection.forward_completion(completion));
      }
    }
  }

  fn cancel(&self) {
    if !self.connection.halt() {
      return;
    }
    let children = std::mem::take(&mut *self.children.lock());
    for child in children.into_iter().flatten() {
      child.cancel();
    }
  }
}

/// The subscriber the dropped-from publisher sees.
struct UpstreamChild<D: Subscriber> {
  id: CombineIdentifier,
  done: Atomic<bool>,
  inner: Arc<DropUntilInner<D>>,
}

impl<D: Subscriber> UpstreamChild<D> {
  fn new(inner: Arc<DropUntilInner<D>>) -> Self {
    UpstreamChild { id: CombineIdentifier::new(), done: Atomic::new(false), inner }
  }
}

impl<D: Subscriber> Identity for UpstreamChild<D> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<D: Subscriber> Subscriber for UpstreamChild<D> {
  type Input = D::Input;
  type Failure = D::Failure;

  #[inline]
  fn receive_subscription(&self, subscription: AnySubscription) { self.inner.attach(UPSTREAM, subscription) }

  fn receive(&self, input: D::Input) -> Demand {
    if self.done.load() || self.inner.connection.is_stopped() {
      return Demand::NONE;
    }
    self.inner.receive(input)
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    if !self.done.exchange(true) && !self.inner.connection.is_stopped() {
      self.inner.complete(UPSTREAM, completion)
    }
  }
}

/// The subscriber the trigger publisher sees. Done after its first value.
struct TriggerChild<T, D: Subscriber> {
  id: CombineIdentifier,
  done: Atomic<bool>,
  inner: Arc<DropUntilInner<D>>,
  _value: std::marker::PhantomData<fn(T)>,
}

impl<T, D: Subscriber> TriggerChild<T, D> {
  fn new(inner: Arc<DropUntilInner<D>>) -> Self {
    TriggerChild { id: CombineIdentifier::new(), done: Atomic::new(false), inner, _value: std::marker::PhantomData }
  }
}

impl<T, D: Subscriber> Identity for TriggerChild<T, D> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<T: Send + 'static, D: Subscriber> Subscriber for TriggerChild<T, D> {
  type Input = T;
  type Failure = D::Failure;

  #[inline]
  fn receive_subscription(&self, subscription: AnySubscription) { self.inner.attach(TRIGGER, subscription) }

  fn receive(&self, _: T) -> Demand {
    if !self.done.exchange(true) && !self.inner.connection.is_stopped() {
      self.inner.open();
    }
    Demand::NONE
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    if !self.done.exchange(true) && !self.inner.connection.is_stopped() {
      self.inner.complete(TRIGGER, completion)
    }
  }
}

struct DropUntilSubscription<D: Subscriber>(Arc<DropUntilInner<D>>);

impl<D: Subscriber> Cancellable for DropUntilSubscription<D> {
  #[inline]
  fn cancel(&self) { self.0.cancel() }
}

impl<D: Subscriber> Identity for DropUntilSubscription<D> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.connection.id() }
}

impl<D: Subscriber> Subscription for DropUntilSubscription<D> {
  #[inline]
  fn request(&self, demand: Demand) { self.0.request(demand) }
}

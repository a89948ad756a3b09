//! Subjects: publishers that imperative code pushes values into.
//!
//! A subject hands each subscriber its own [`Conduit`], which counts that
//! subscriber's demand. A value only reaches subscribers that asked for one;
//! the rest miss it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  atomic::Atomic,
  lock::{Lock, MutexLock},
  prelude::*,
};

mod current_value;
mod passthrough;

pub use current_value::CurrentValueSubject;
pub use passthrough::PassthroughSubject;

/// A [`Publisher`] whose values are pushed in from outside.
pub trait Subject: Publisher {
  /// Delivers `value` to every subscriber that has demand. A no-op once the
  /// subject completed.
  fn send(&self, value: Self::Output);

  /// Completes every current and future subscriber. Only the first call has
  /// an effect.
  fn send_completion(&self, completion: Completion<Self::Failure>);

  #[inline]
  fn finish(&self) { self.send_completion(Completion::Finished) }
}

/// A type-erased [`Subject`].
pub struct AnySubject<O, F> {
  publisher: AnyPublisher<O, F>,
  send: Arc<dyn Fn(O) + Send + Sync>,
  complete: Arc<dyn Fn(Completion<F>) + Send + Sync>,
}

impl<O: Send + 'static, F: Send + 'static> AnySubject<O, F> {
  pub fn new<S>(subject: S) -> Self
  where
    S: Subject<Output = O, Failure = F> + Clone + 'static,
  {
    let (sender, completer) = (subject.clone(), subject.clone());
    AnySubject {
      publisher: AnyPublisher::new(subject),
      send: Arc::new(move |value| sender.send(value)),
      complete: Arc::new(move |completion| completer.send_completion(completion)),
    }
  }
}

impl<O, F> Clone for AnySubject<O, F> {
  fn clone(&self) -> Self {
    AnySubject { publisher: self.publisher.clone(), send: self.send.clone(), complete: self.complete.clone() }
  }
}

impl<O: Send + 'static, F: Send + 'static> Publisher for AnySubject<O, F> {
  type Output = O;
  type Failure = F;

  #[inline]
  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = O, Failure = F>,
  {
    self.publisher.receive(subscriber)
  }
}

impl<O: Send + 'static, F: Send + 'static> Subject for AnySubject<O, F> {
  #[inline]
  fn send(&self, value: O) { (self.send)(value) }

  #[inline]
  fn send_completion(&self, completion: Completion<F>) { (self.complete)(completion) }
}

type Detach = Box<dyn FnOnce() + Send>;

/// One subscriber's link to a subject.
pub(crate) struct Conduit<O, F> {
  id: CombineIdentifier,
  downstream: AnySubscriber<O, F>,
  demand: Mutex<Demand>,
  /// A value that arrived without demand, kept for the next request.
  held: Mutex<Option<O>>,
  stop: Atomic<bool>,
  /// Held around every call into the downstream, so a value never overtakes
  /// the completion.
  delivery: MutexLock,
  detach: Mutex<Option<Detach>>,
}

impl<O: Send + 'static, F: Send + 'static> Conduit<O, F> {
  pub(crate) fn new(downstream: AnySubscriber<O, F>) -> Arc<Self> {
    Arc::new(Conduit {
      id: CombineIdentifier::new(),
      downstream,
      demand: Mutex::new(Demand::NONE),
      held: Mutex::new(None),
      stop: Atomic::new(false),
      delivery: MutexLock::recursive(),
      detach: Mutex::new(None),
    })
  }

  /// Key the owning subject files this conduit under.
  #[inline]
  pub(crate) fn subscriber_id(&self) -> CombineIdentifier { self.downstream.combine_identifier() }

  /// Sets what runs when the downstream cancels.
  pub(crate) fn on_cancel(&self, detach: impl FnOnce() + Send + 'static) {
    *self.detach.lock() = Some(Box::new(detach));
  }

  pub(crate) fn start(self: &Arc<Self>) {
    self.downstream.receive_subscription(AnySubscription::from_arc(self.clone()));
  }

  fn take_demand(&self) -> bool {
    let mut demand = self.demand.lock();
    if demand.is_none() {
      return false;
    }
    *demand -= 1;
    true
  }

  fn deliver(&self, value: O) {
    let more = self.downstream.receive(value);
    if more.has_any() {
      *self.demand.lock() += more;
    }
  }

  /// Delivers `value` if the downstream has demand, otherwise drops it.
  pub(crate) fn offer(&self, value: O) {
    self.delivery.locking(|| {
      if !self.stop.load() && self.take_demand() {
        self.deliver(value)
      }
    })
  }

  /// Delivers `value` if the downstream has demand, otherwise holds it in
  /// place of any value held before.
  pub(crate) fn offer_latest(&self, value: O) {
    self.delivery.locking(|| {
      if self.stop.load() {
        return;
      }
      if self.take_demand() {
        self.deliver(value)
      } else {
        *self.held.lock() = Some(value);
      }
    })
  }

  pub(crate) fn complete(&self, completion: Completion<F>) {
    self.delivery.locking(|| {
      if self.stop.exchange(true) {
        return;
      }
      self.held.lock().take();
      self.detach.lock().take();
      self.downstream.receive_completion(completion);
    })
  }
}

impl<O: Send + 'static, F: Send + 'static> Cancellable for Conduit<O, F> {
  fn cancel(&self) {
    if self.stop.exchange(true) {
      return;
    }
    self.held.lock().take();
    let detach = self.detach.lock().take();
    if let Some(detach) = detach {
      detach();
    }
  }
}

impl<O, F> Identity for Conduit<O, F> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<O: Send + 'static, F: Send + 'static> Subscription for Conduit<O, F> {
  fn request(&self, demand: Demand) {
    if demand.is_none() || self.stop.load() {
      return;
    }
    *self.demand.lock() += demand;
    let held = self.held.lock().take();
    if let Some(value) = held {
      self.offer(value);
    }
  }
}

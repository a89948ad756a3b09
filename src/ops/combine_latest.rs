//! CombineLatest operator implementations for two to four inputs.
//!
//! Every input feeds a [`CombineChild`] that stores the value in its slot of
//! the shared latest-values tuple. Nothing is published until every slot is
//! filled; after that every value from any input publishes the combination
//! of the current slots. A combination that finds the downstream without
//! demand is remembered and published by the next request.

use std::{marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{
  atomic::Atomic,
  lock::{Lock, MutexLock},
  pipe::Connection,
  prelude::*,
};

struct CombineState<L> {
  latest: L,
  received: Vec<bool>,
  finished: usize,
  demand: Demand,
  requested: Demand,
  pending: bool,
  /// Every input finished while a combination was pending.
  finish_parked: bool,
}

/// State shared by the children of one combine-latest subscription.
struct CombineCore<L, D: Subscriber, G> {
  connection: Connection<D>,
  arity: usize,
  delivery: MutexLock,
  state: Mutex<CombineState<L>>,
  children: Mutex<Vec<Option<AnySubscription>>>,
  combine: G,
}

impl<L, D, G> CombineCore<L, D, G>
where
  L: Clone + Send + 'static,
  D: Subscriber,
  G: Fn(L) -> Option<Result<D::Input, D::Failure>> + Send + Sync + 'static,
{
  fn new(name: &'static str, downstream: D, arity: usize, latest: L, combine: G) -> Arc<Self> {
    Arc::new(CombineCore {
      connection: Connection::new(name, downstream),
      arity,
      delivery: MutexLock::recursive(),
      state: Mutex::new(CombineState {
        latest,
        received: vec![false; arity],
        finished: 0,
        demand: Demand::NONE,
        requested: Demand::NONE,
        pending: false,
        finish_parked: false,
      }),
      children: Mutex::new(vec![None; arity]),
      combine,
    })
  }

  fn start(this: &Arc<Self>) {
    let own = AnySubscription::new(CombineSubscription(this.clone()));
    this.connection.downstream().receive_subscription(own);
  }

  fn attach(&self, index: usize, subscription: AnySubscription) {
    let requested = {
      let mut children = self.children.lock();
      if self.connection.is_stopped() || children[index].is_some() {
        drop(children);
        subscription.cancel();
        return;
      }
      children[index] = Some(subscription.clone());
      self.state.lock().requested
    };
    if requested.has_any() {
      subscription.request(requested);
    }
  }

  fn request(&self, demand: Demand) {
    if demand.is_none() || self.connection.is_stopped() {
      return;
    }
    {
      let mut state = self.state.lock();
      state.demand += demand;
      state.requested += demand;
    }
    self.publish_pending();
    let children: Vec<_> = self.children.lock().iter().flatten().cloned().collect();
    for child in children {
      child.request(demand);
    }
  }

  fn publish_pending(&self) {
    self.delivery.locking(|| {
      let latest = {
        let mut state = self.state.lock();
        if !state.pending || state.demand.is_none() {
          return;
        }
        state.pending = false;
        state.demand -= 1;
        state.latest.clone()
      };
      self.publish(latest);
      let finish = std::mem::take(&mut self.state.lock().finish_parked);
      if finish {
        self.connection.finish();
      }
    })
  }

  fn publish(&self, latest: L) {
    match (self.combine)(latest) {
      Some(Ok(value)) => {
        let more = self.connection.forward(value);
        if more.has_any() {
          self.request(more);
        }
      }
      Some(Err(e)) => self.fail(None, e),
      None => {}
    }
  }

  fn receive<I>(&self, index: usize, store: fn(&mut L, I), value: I) -> Demand {
    self.delivery.locking(|| {
      let latest = {
        let mut state = self.state.lock();
        store(&mut state.latest, value);
        state.received[index] = true;
        if !state.received.iter().all(|r| *r) {
          // Nothing was published, so the input may send one more.
          return Demand::max(1);
        }
        if state.demand.is_none() {
          state.pending = true;
          return Demand::NONE;
        }
        state.pending = false;
        state.demand -= 1;
        state.latest.clone()
      };
      self.publish(latest);
      Demand::NONE
    })
  }

  fn finished(&self, index: usize) {
    self.children.lock()[index] = None;
    let finish_now = {
      let mut state = self.state.lock();
      state.finished += 1;
      if state.finished < self.arity {
        false
      } else if state.pending {
        // The pending combination goes out first, on the next request.
        state.finish_parked = true;
        false
      } else {
        true
      }
    };
    if finish_now {
      self.delivery.locking(|| self.connection.finish());
    }
  }

  /// Fails the downstream and cancels every input except `source`.
  fn fail(&self, source: Option<usize>, failure: D::Failure) {
    let children = std::mem::take(&mut *self.children.lock());
    for (index, child) in children.into_iter().enumerate() {
      match child {
        Some(child) if Some(index) != source => child.cancel(),
        _ => {}
      }
    }
    self.delivery.locking(|| self.connection.fail(failure));
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

struct CombineSubscription<L, D: Subscriber, G>(Arc<CombineCore<L, D, G>>);

impl<L, D, G> Cancellable for CombineSubscription<L, D, G>
where
  L: Clone + Send + 'static,
  D: Subscriber,
  G: Fn(L) -> Option<Result<D::Input, D::Failure>> + Send + Sync + 'static,
{
  #[inline]
  fn cancel(&self) { self.0.cancel() }
}

impl<L, D: Subscriber, G> Identity for CombineSubscription<L, D, G> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.0.connection.id() }
}

impl<L, D, G> Subscription for CombineSubscription<L, D, G>
where
  L: Clone + Send + 'static,
  D: Subscriber,
  G: Fn(L) -> Option<Result<D::Input, D::Failure>> + Send + Sync + 'static,
{
  #[inline]
  fn request(&self, demand: Demand) { self.0.request(demand) }
}

/// The subscriber one input of a combine-latest sees.
struct CombineChild<I, E, L, D: Subscriber, G> {
  id: CombineIdentifier,
  index: usize,
  done: Atomic<bool>,
  store: fn(&mut L, I),
  map_failure: fn(E) -> D::Failure,
  core: Arc<CombineCore<L, D, G>>,
}

impl<I, E, L, D: Subscriber, G> CombineChild<I, E, L, D, G> {
  fn new(
    core: &Arc<CombineCore<L, D, G>>,
    index: usize,
    store: fn(&mut L, I),
    map_failure: fn(E) -> D::Failure,
  ) -> Self {
    CombineChild {
      id: CombineIdentifier::new(),
      index,
      done: Atomic::new(false),
      store,
      map_failure,
      core: core.clone(),
    }
  }
}

impl<I, E, L, D: Subscriber, G> Identity for CombineChild<I, E, L, D, G> {
  #[inline]
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<I, E, L, D, G> Subscriber for CombineChild<I, E, L, D, G>
where
  I: Send + 'static,
  E: Send + 'static,
  L: Clone + Send + 'static,
  D: Subscriber,
  G: Fn(L) -> Option<Result<D::Input, D::Failure>> + Send + Sync + 'static,
{
  type Input = I;
  type Failure = E;

  #[inline]
  fn receive_subscription(&self, subscription: AnySubscription) { self.core.attach(self.index, subscription) }

  fn receive(&self, input: I) -> Demand {
    if self.done.load() || self.core.connection.is_stopped() {
      return Demand::NONE;
    }
    self.core.receive(self.index, self.store, input)
  }

  fn receive_completion(&self, completion: Completion<E>) {
    if self.done.exchange(true) || self.core.connection.is_stopped() {
      return;
    }
    match completion {
      Completion::Finished => self.core.finished(self.index),
      Completion::Failure(e) => self.core.fail(Some(self.index), (self.map_failure)(e)),
    }
  }
}

/// Fixes a slot setter to the latest-values tuple `L`.
#[inline]
fn store_at<L, I>(_: PhantomData<L>, store: fn(&mut L, I)) -> fn(&mut L, I) { store }

macro_rules! combine_latest {
  (
    $(#[$doc:meta])*
    $name:ident, $try_name:ident, $arity:literal;
    $first:ident $(, $rest:ident)*;
    $($p:ident $v:ident $idx:tt),+
  ) => {
    $(#[$doc])*
    pub struct $name<$($p,)+ F> {
      upstreams: ($($p,)+),
      transform: Arc<F>,
    }

    impl<$($p,)+ F> $name<$($p,)+ F> {
      pub fn new(upstreams: ($($p,)+), transform: F) -> Self {
        $name { upstreams, transform: Arc::new(transform) }
      }
    }

    impl<$($p: Clone,)+ F> Clone for $name<$($p,)+ F> {
      fn clone(&self) -> Self {
        $name { upstreams: self.upstreams.clone(), transform: self.transform.clone() }
      }
    }

    impl<$($p,)+ F, T> Publisher for $name<$($p,)+ F>
    where
      $first: Publisher,
      $first::Output: Clone,
      $($rest: Publisher<Failure = $first::Failure>, $rest::Output: Clone,)*
      F: Fn($($p::Output),+) -> T + Send + Sync + 'static,
      T: Send + 'static,
    {
      type Output = T;
      type Failure = $first::Failure;

      fn receive<S>(&self, subscriber: S)
      where
        S: Subscriber<Input = T, Failure = $first::Failure>,
      {
        let transform = self.transform.clone();
        let core = CombineCore::new(
          "combine_latest",
          subscriber,
          $arity,
          ($(None::<$p::Output>,)+),
          move |latest: ($(Option<$p::Output>,)+)| -> Option<Result<T, $first::Failure>> {
            let ($($v,)+) = latest;
            Some(Ok(transform($($v?),+)))
          },
        );
        CombineCore::start(&core);
        let shape = PhantomData::<($(Option<$p::Output>,)+)>;
        $(
          self.upstreams.$idx.receive(CombineChild::<$p::Output, $p::Failure, _, _, _>::new(
            &core,
            $idx,
            store_at(shape, |latest, value: $p::Output| latest.$idx = Some(value)),
            |e: $first::Failure| e,
          ));
        )+
      }
    }

    /// Like the plain form, with a fallible transform. Failures from any
    /// input or from the transform fail the stream as [`anyhow::Error`].
    pub struct $try_name<$($p,)+ F> {
      upstreams: ($($p,)+),
      transform: Arc<F>,
    }

    impl<$($p,)+ F> $try_name<$($p,)+ F> {
      pub fn new(upstreams: ($($p,)+), transform: F) -> Self {
        $try_name { upstreams, transform: Arc::new(transform) }
      }
    }

    impl<$($p: Clone,)+ F> Clone for $try_name<$($p,)+ F> {
      fn clone(&self) -> Self {
        $try_name { upstreams: self.upstreams.clone(), transform: self.transform.clone() }
      }
    }

    impl<$($p,)+ F, T> Publisher for $try_name<$($p,)+ F>
    where
      $($p: Publisher, $p::Output: Clone, $p::Failure: Into<anyhow::Error>,)+
      F: Fn($($p::Output),+) -> anyhow::Result<T> + Send + Sync + 'static,
      T: Send + 'static,
    {
      type Output = T;
      type Failure = anyhow::Error;

      fn receive<S>(&self, subscriber: S)
      where
        S: Subscriber<Input = T, Failure = anyhow::Error>,
      {
        let transform = self.transform.clone();
        let core = CombineCore::new(
          "try_combine_latest",
          subscriber,
          $arity,
          ($(None::<$p::Output>,)+),
          move |latest: ($(Option<$p::Output>,)+)| -> Option<anyhow::Result<T>> {
            let ($($v,)+) = latest;
            Some(transform($($v?),+))
          },
        );
        CombineCore::start(&core);
        let shape = PhantomData::<($(Option<$p::Output>,)+)>;
        $(
          self.upstreams.$idx.receive(CombineChild::<$p::Output, $p::Failure, _, _, _>::new(
            &core,
            $idx,
            store_at(shape, |latest, value: $p::Output| latest.$idx = Some(value)),
            |e: $p::Failure| -> anyhow::Error { e.into() },
          ));
        )+
      }
    }
  };
}

combine_latest! {
  /// Publisher returned by [`Publisher::combine_latest`].
  CombineLatest2, TryCombineLatest2, 2;
  A, B;
  A a 0, B b 1
}

combine_latest! {
  /// Publisher returned by [`Publisher::combine_latest3`].
  CombineLatest3, TryCombineLatest3, 3;
  A, B, C;
  A a 0, B b 1, C c 2
}

combine_latest! {
  /// Publisher returned by [`Publisher::combine_latest4`].
  CombineLatest4, TryCombineLatest4, 4;
  A, B, C, D;
  A a 0, B b 1, C c 2, D d 3
}

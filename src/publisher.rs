//! The producer side of the protocol, and every operator as a provided
//! method on it.

use std::sync::Arc;

use crate::{
  ops::{
    aggregate::Aggregate,
    all_satisfy::{AllSatisfy, TryAllSatisfy},
    collect::{Collect, CollectByCount},
    collect_by_time::{CollectByTime, TimeGroupingStrategy},
    combine_latest::{
      CombineLatest2, CombineLatest3, CombineLatest4, TryCombineLatest2, TryCombineLatest3,
      TryCombineLatest4,
    },
    compact_map::{CompactMap, TryCompactMap},
    comparison::{Comparison, TryComparison},
    contains::{Contains, ContainsWhere, TryContainsWhere},
    drop_until_output::DropUntilOutput,
    filter::{Filter, TryFilter},
    ignore_output::IgnoreOutput,
    map::{Map, TryMap},
    map_error::{MapError, SetFailureType},
    measure_interval::MeasureInterval,
    merge::Merge,
    print::Print,
    receive_on::ReceiveOn,
    reduce::{Count, Reduce, TryReduce},
    remove_duplicates::{RemoveDuplicates, TryRemoveDuplicates},
    replace_empty::ReplaceEmpty,
    replace_error::ReplaceError,
    scan::{Scan, TryScan},
    subscribe_on::SubscribeOn,
  },
  scheduler::Scheduler,
  subscriber::{Assign, Completion, Never, Sink, Subscriber},
  subscription::AnyCancellable,
};

mod any_publisher;
mod deferred;
mod empty;
mod fail;
mod future;
mod just;
mod sequence;

pub use any_publisher::AnyPublisher;
pub use deferred::{deferred, Deferred};
pub use empty::{empty, Empty};
pub use fail::{fail, Fail};
pub use future::{Future, Promise};
pub use just::{just, Just};
pub use sequence::{sequence, Sequence};

type Order<T> = fn(&T, &T) -> bool;

/// Produces values for the subscribers attached to it.
///
/// Calling [`receive`](Publisher::receive) must eventually call the
/// subscriber's `receive_subscription` exactly once, synchronously or from a
/// scheduler, after which values flow only as fast as the subscriber
/// requests them.
pub trait Publisher: Send + Sync {
  type Output: Send + 'static;
  type Failure: Send + 'static;

  /// Attaches `subscriber` to this publisher.
  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = Self::Output, Failure = Self::Failure>;

  /// Same as [`receive`](Publisher::receive).
  #[inline]
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = Self::Output, Failure = Self::Failure>,
  {
    self.receive(subscriber)
  }

  /// Attaches a [`Sink`] requesting an unlimited number of values.
  fn sink(
    &self,
    receive_completion: impl FnOnce(Completion<Self::Failure>) + Send + 'static,
    receive_value: impl FnMut(Self::Output) + Send + 'static,
  ) -> AnyCancellable {
    let sink = Arc::new(Sink::new(receive_completion, receive_value));
    self.receive(sink.clone());
    AnyCancellable::from_cancellable(sink)
  }

  /// Attaches a [`Sink`] that ignores the completion.
  #[inline]
  fn sink_value(&self, receive_value: impl FnMut(Self::Output) + Send + 'static) -> AnyCancellable {
    self.sink(|_| {}, receive_value)
  }

  /// Writes every value into `target` through `setter`, requesting an
  /// unlimited number of values. The target is released on completion.
  fn assign<T>(&self, target: Arc<T>, setter: impl Fn(&T, Self::Output) + Send + Sync + 'static) -> AnyCancellable
  where
    Self: Publisher<Failure = Never>,
    T: Send + Sync + 'static,
  {
    let assign = Arc::new(Assign::new(target, setter));
    self.receive(assign.clone());
    AnyCancellable::from_cancellable(assign)
  }

  /// Wraps this publisher in an [`AnyPublisher`].
  #[inline]
  fn erase(self) -> AnyPublisher<Self::Output, Self::Failure>
  where
    Self: Sized + 'static,
  {
    AnyPublisher::new(self)
  }

  // ==================== Transforms ====================

  /// Transforms every value with `transform`.
  #[inline]
  fn map<T, F>(self, transform: F) -> Map<Self, F>
  where
    Self: Sized,
    F: Fn(Self::Output) -> T + Send + Sync + 'static,
    T: Send + 'static,
  {
    Map::new(self, transform)
  }

  /// Like [`map`](Publisher::map); an `Err` fails the stream.
  #[inline]
  fn try_map<T, F>(self, transform: F) -> TryMap<Self, F>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(Self::Output) -> anyhow::Result<T> + Send + Sync + 'static,
    T: Send + 'static,
  {
    TryMap::new(self, transform)
  }

  /// Republishes only the values matching `predicate`.
  #[inline]
  fn filter<F>(self, predicate: F) -> Filter<Self, F>
  where
    Self: Sized,
    F: Fn(&Self::Output) -> bool + Send + Sync + 'static,
  {
    Filter::new(self, predicate)
  }

  #[inline]
  fn try_filter<F>(self, predicate: F) -> TryFilter<Self, F>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(&Self::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    TryFilter::new(self, predicate)
  }

  /// Transforms every value and republishes the `Some` results.
  #[inline]
  fn compact_map<T, F>(self, transform: F) -> CompactMap<Self, F>
  where
    Self: Sized,
    F: Fn(Self::Output) -> Option<T> + Send + Sync + 'static,
    T: Send + 'static,
  {
    CompactMap::new(self, transform)
  }

  #[inline]
  fn try_compact_map<T, F>(self, transform: F) -> TryCompactMap<Self, F>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(Self::Output) -> anyhow::Result<Option<T>> + Send + Sync + 'static,
    T: Send + 'static,
  {
    TryCompactMap::new(self, transform)
  }

  /// Publishes every intermediate accumulation.
  #[inline]
  fn scan<T, F>(self, initial: T, next: F) -> Scan<Self, T, F>
  where
    Self: Sized,
    T: Clone + Send + Sync + 'static,
    F: Fn(T, Self::Output) -> T + Send + Sync + 'static,
  {
    Scan::new(self, initial, next)
  }

  #[inline]
  fn try_scan<T, F>(self, initial: T, next: F) -> TryScan<Self, T, F>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    T: Clone + Send + Sync + 'static,
    F: Fn(T, Self::Output) -> anyhow::Result<T> + Send + Sync + 'static,
  {
    TryScan::new(self, initial, next)
  }

  /// Drops any value equal to one published before.
  #[inline]
  fn remove_duplicates(self) -> RemoveDuplicates<Self, Order<Self::Output>>
  where
    Self: Sized,
    Self::Output: PartialEq + Clone,
  {
    RemoveDuplicates::new(self, <Self::Output as PartialEq>::eq as Order<Self::Output>)
  }

  /// Drops any value that `matches` one published before.
  #[inline]
  fn remove_duplicates_by<F>(self, matches: F) -> RemoveDuplicates<Self, F>
  where
    Self: Sized,
    Self::Output: Clone,
    F: Fn(&Self::Output, &Self::Output) -> bool + Send + Sync + 'static,
  {
    RemoveDuplicates::new(self, matches)
  }

  #[inline]
  fn try_remove_duplicates<F>(self, matches: F) -> TryRemoveDuplicates<Self, F>
  where
    Self: Sized,
    Self::Output: Clone,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(&Self::Output, &Self::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    TryRemoveDuplicates::new(self, matches)
  }

  /// Publishes `value` when the upstream finishes without any value.
  #[inline]
  fn replace_empty(self, value: Self::Output) -> ReplaceEmpty<Self>
  where
    Self: Sized,
    Self::Output: Clone + Sync,
  {
    ReplaceEmpty::new(self, value)
  }

  /// Turns a failure into `value` followed by a normal finish.
  #[inline]
  fn replace_error(self, value: Self::Output) -> ReplaceError<Self>
  where
    Self: Sized,
    Self::Output: Clone + Sync,
  {
    ReplaceError::new(self, value)
  }

  /// Publishes the time elapsed between consecutive values.
  #[inline]
  fn measure_interval<S>(self, scheduler: S) -> MeasureInterval<Self, S>
  where
    Self: Sized,
    S: Scheduler,
  {
    MeasureInterval::new(self, scheduler)
  }

  /// Drops every value and republishes only the completion.
  #[inline]
  fn ignore_output(self) -> IgnoreOutput<Self>
  where
    Self: Sized,
  {
    IgnoreOutput::new(self)
  }

  #[inline]
  fn map_error<E, F>(self, transform: F) -> MapError<Self, F>
  where
    Self: Sized,
    E: Send + 'static,
    F: Fn(Self::Failure) -> E + Send + Sync + 'static,
  {
    MapError::new(self, transform)
  }

  /// Re-types a publisher that cannot fail.
  #[inline]
  fn set_failure_type<E>(self) -> SetFailureType<Self, E>
  where
    Self: Sized + Publisher<Failure = Never>,
    E: Send + 'static,
  {
    SetFailureType::new(self)
  }

  /// Logs every lifecycle event through `tracing`.
  #[inline]
  fn print(self, prefix: impl Into<String>) -> Print<Self>
  where
    Self: Sized,
    Self::Output: std::fmt::Debug,
    Self::Failure: std::fmt::Debug,
  {
    Print::new(self, prefix.into())
  }

  // ==================== Aggregation ====================

  /// Folds every value into one result, published when the upstream
  /// finishes.
  #[inline]
  fn reduce<T, F>(self, initial: T, next: F) -> Aggregate<Self, Reduce<T, F, Self::Failure>>
  where
    Self: Sized,
    T: Clone + Send + Sync + 'static,
    F: Fn(T, Self::Output) -> T + Send + Sync + 'static,
  {
    let next = Arc::new(next);
    Aggregate::new(self, "reduce", move || Reduce::new(initial.clone(), next.clone()))
  }

  #[inline]
  fn try_reduce<T, F>(self, initial: T, next: F) -> Aggregate<Self, TryReduce<T, F>>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    T: Clone + Send + Sync + 'static,
    F: Fn(T, Self::Output) -> anyhow::Result<T> + Send + Sync + 'static,
  {
    let next = Arc::new(next);
    Aggregate::new(self, "try_reduce", move || TryReduce::new(initial.clone(), next.clone()))
  }

  /// Publishes the number of values received.
  #[inline]
  fn count(self) -> Aggregate<Self, Count<Self::Failure>>
  where
    Self: Sized,
  {
    Aggregate::new(self, "count", Count::default)
  }

  /// Publishes every value in one `Vec`.
  #[inline]
  fn collect(self) -> Aggregate<Self, Collect<Self::Output, Self::Failure>>
  where
    Self: Sized,
  {
    Aggregate::new(self, "collect", Collect::default)
  }

  /// Publishes values in batches of `count`; a shorter final batch is
  /// published on finish.
  #[inline]
  fn collect_by_count(self, count: usize) -> CollectByCount<Self>
  where
    Self: Sized,
  {
    CollectByCount::new(self, count)
  }

  /// Publishes values in batches bounded by time, or by time and count.
  #[inline]
  fn collect_by_time<S>(self, strategy: TimeGroupingStrategy<S>) -> CollectByTime<Self, S>
  where
    Self: Sized,
    S: Scheduler,
  {
    CollectByTime::new(self, strategy)
  }

  /// Publishes whether every value satisfied `predicate`.
  #[inline]
  fn all_satisfy<F>(self, predicate: F) -> Aggregate<Self, AllSatisfy<F, Self::Failure>>
  where
    Self: Sized,
    F: Fn(&Self::Output) -> bool + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    Aggregate::new(self, "all_satisfy", move || AllSatisfy::new(predicate.clone()))
  }

  #[inline]
  fn try_all_satisfy<F>(self, predicate: F) -> Aggregate<Self, TryAllSatisfy<F>>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(&Self::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    Aggregate::new(self, "try_all_satisfy", move || TryAllSatisfy::new(predicate.clone()))
  }

  /// Publishes whether `value` was received.
  #[inline]
  fn contains(self, value: Self::Output) -> Aggregate<Self, Contains<Self::Output, Self::Failure>>
  where
    Self: Sized,
    Self::Output: PartialEq + Sync,
  {
    let value = Arc::new(value);
    Aggregate::new(self, "contains", move || Contains::new(value.clone()))
  }

  /// Publishes whether any value satisfied `predicate`.
  #[inline]
  fn contains_where<F>(self, predicate: F) -> Aggregate<Self, ContainsWhere<F, Self::Failure>>
  where
    Self: Sized,
    F: Fn(&Self::Output) -> bool + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    Aggregate::new(self, "contains_where", move || ContainsWhere::new(predicate.clone()))
  }

  #[inline]
  fn try_contains_where<F>(self, predicate: F) -> Aggregate<Self, TryContainsWhere<F>>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(&Self::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    Aggregate::new(self, "try_contains_where", move || TryContainsWhere::new(predicate.clone()))
  }

  /// Publishes the smallest value.
  #[inline]
  fn min(self) -> Aggregate<Self, Comparison<Self::Output, Order<Self::Output>, Self::Failure>>
  where
    Self: Sized,
    Self::Output: Ord,
  {
    self.min_by(<Self::Output as PartialOrd>::lt as Order<Self::Output>)
  }

  /// Publishes the largest value.
  #[inline]
  fn max(self) -> Aggregate<Self, Comparison<Self::Output, Order<Self::Output>, Self::Failure>>
  where
    Self: Sized,
    Self::Output: Ord,
  {
    self.max_by(<Self::Output as PartialOrd>::lt as Order<Self::Output>)
  }

  /// Publishes the smallest value under `are_in_increasing_order`.
  #[inline]
  fn min_by<F>(self, are_in_increasing_order: F) -> Aggregate<Self, Comparison<Self::Output, F, Self::Failure>>
  where
    Self: Sized,
    F: Fn(&Self::Output, &Self::Output) -> bool + Send + Sync + 'static,
  {
    let order = Arc::new(are_in_increasing_order);
    Aggregate::new(self, "min", move || Comparison::new(order.clone(), true))
  }

  /// Publishes the largest value under `are_in_increasing_order`.
  #[inline]
  fn max_by<F>(self, are_in_increasing_order: F) -> Aggregate<Self, Comparison<Self::Output, F, Self::Failure>>
  where
    Self: Sized,
    F: Fn(&Self::Output, &Self::Output) -> bool + Send + Sync + 'static,
  {
    let order = Arc::new(are_in_increasing_order);
    Aggregate::new(self, "max", move || Comparison::new(order.clone(), false))
  }

  #[inline]
  fn try_min_by<F>(self, are_in_increasing_order: F) -> Aggregate<Self, TryComparison<Self::Output, F>>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(&Self::Output, &Self::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    let order = Arc::new(are_in_increasing_order);
    Aggregate::new(self, "try_min", move || TryComparison::new(order.clone(), true))
  }

  #[inline]
  fn try_max_by<F>(self, are_in_increasing_order: F) -> Aggregate<Self, TryComparison<Self::Output, F>>
  where
    Self: Sized,
    Self::Failure: Into<anyhow::Error>,
    F: Fn(&Self::Output, &Self::Output) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    let order = Arc::new(are_in_increasing_order);
    Aggregate::new(self, "try_max", move || TryComparison::new(order.clone(), false))
  }

  // ==================== Combining ====================

  /// Interleaves the values of two publishers.
  #[inline]
  fn merge<P>(self, other: P) -> Merge<Self, P>
  where
    Self: Sized,
    P: Publisher<Output = Self::Output, Failure = Self::Failure>,
  {
    Merge::new(self, other)
  }

  /// Drops values until `trigger` publishes its first value.
  #[inline]
  fn drop_until_output<P>(self, trigger: P) -> DropUntilOutput<Self, P>
  where
    Self: Sized,
    P: Publisher<Failure = Self::Failure>,
  {
    DropUntilOutput::new(self, trigger)
  }

  /// Publishes `transform` of the latest value of each input whenever any
  /// input publishes, once both have published at least once.
  #[inline]
  fn combine_latest<B, T, F>(self, other: B, transform: F) -> CombineLatest2<Self, B, F>
  where
    Self: Sized,
    Self::Output: Clone,
    B: Publisher<Failure = Self::Failure>,
    B::Output: Clone,
    T: Send + 'static,
    F: Fn(Self::Output, B::Output) -> T + Send + Sync + 'static,
  {
    CombineLatest2::new((self, other), transform)
  }

  #[inline]
  fn combine_latest3<B, C, T, F>(self, b: B, c: C, transform: F) -> CombineLatest3<Self, B, C, F>
  where
    Self: Sized,
    Self::Output: Clone,
    B: Publisher<Failure = Self::Failure>,
    B::Output: Clone,
    C: Publisher<Failure = Self::Failure>,
    C::Output: Clone,
    T: Send + 'static,
    F: Fn(Self::Output, B::Output, C::Output) -> T + Send + Sync + 'static,
  {
    CombineLatest3::new((self, b, c), transform)
  }

  #[allow(clippy::type_complexity)]
  #[inline]
  fn combine_latest4<B, C, D, T, F>(
    self,
    b: B,
    c: C,
    d: D,
    transform: F,
  ) -> CombineLatest4<Self, B, C, D, F>
  where
    Self: Sized,
    Self::Output: Clone,
    B: Publisher<Failure = Self::Failure>,
    B::Output: Clone,
    C: Publisher<Failure = Self::Failure>,
    C::Output: Clone,
    D: Publisher<Failure = Self::Failure>,
    D::Output: Clone,
    T: Send + 'static,
    F: Fn(Self::Output, B::Output, C::Output, D::Output) -> T + Send + Sync + 'static,
  {
    CombineLatest4::new((self, b, c, d), transform)
  }

  /// Like [`combine_latest`](Publisher::combine_latest); failures from
  /// either input or from `transform` fail the stream as `anyhow::Error`.
  #[inline]
  fn try_combine_latest<B, T, F>(self, other: B, transform: F) -> TryCombineLatest2<Self, B, F>
  where
    Self: Sized,
    Self::Output: Clone,
    Self::Failure: Into<anyhow::Error>,
    B: Publisher,
    B::Output: Clone,
    B::Failure: Into<anyhow::Error>,
    T: Send + 'static,
    F: Fn(Self::Output, B::Output) -> anyhow::Result<T> + Send + Sync + 'static,
  {
    TryCombineLatest2::new((self, other), transform)
  }

  #[inline]
  fn try_combine_latest3<B, C, T, F>(
    self,
    b: B,
    c: C,
    transform: F,
  ) -> TryCombineLatest3<Self, B, C, F>
  where
    Self: Sized,
    Self::Output: Clone,
    Self::Failure: Into<anyhow::Error>,
    B: Publisher,
    B::Output: Clone,
    B::Failure: Into<anyhow::Error>,
    C: Publisher,
    C::Output: Clone,
    C::Failure: Into<anyhow::Error>,
    T: Send + 'static,
    F: Fn(Self::Output, B::Output, C::Output) -> anyhow::Result<T> + Send + Sync + 'static,
  {
    TryCombineLatest3::new((self, b, c), transform)
  }

  #[allow(clippy::type_complexity)]
  #[inline]
  fn try_combine_latest4<B, C, D, T, F>(
    self,
    b: B,
    c: C,
    d: D,
    transform: F,
  ) -> TryCombineLatest4<Self, B, C, D, F>
  where
    Self: Sized,
    Self::Output: Clone,
    Self::Failure: Into<anyhow::Error>,
    B: Publisher,
    B::Output: Clone,
    B::Failure: Into<anyhow::Error>,
    C: Publisher,
    C::Output: Clone,
    C::Failure: Into<anyhow::Error>,
    D: Publisher,
    D::Output: Clone,
    D::Failure: Into<anyhow::Error>,
    T: Send + 'static,
    F: Fn(Self::Output, B::Output, C::Output, D::Output) -> anyhow::Result<T>
      + Send
      + Sync
      + 'static,
  {
    TryCombineLatest4::new((self, b, c, d), transform)
  }

  // ==================== Scheduling ====================

  /// Subscribes to the upstream, and forwards requests and cancellation to
  /// it, on `scheduler`.
  #[inline]
  fn subscribe_on<S>(self, scheduler: S) -> SubscribeOn<Self, S>
  where
    Self: Sized + 'static,
    S: Scheduler,
  {
    SubscribeOn::new(self, scheduler)
  }

  /// Delivers values and completion to the downstream on `scheduler`.
  #[inline]
  fn receive_on<S>(self, scheduler: S) -> ReceiveOn<Self, S>
  where
    Self: Sized,
    S: Scheduler,
  {
    ReceiveOn::new(self, scheduler)
  }
}

impl<P: Publisher> Publisher for Arc<P> {
  type Output = P::Output;
  type Failure = P::Failure;

  #[inline]
  fn receive<S>(&self, subscriber: S)
  where
    S: Subscriber<Input = Self::Output, Failure = Self::Failure>,
  {
    (**self).receive(subscriber)
  }
}

//! Everything needed to build and consume pipelines.

#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::{
  atomic::Atomic,
  demand::Demand,
  identifier::{CombineIdentifier, Identity},
  lock::{Lock, MutexLock},
  ops::collect_by_time::TimeGroupingStrategy,
  publisher::{
    deferred, empty, fail, just, sequence, AnyPublisher, Deferred, Empty, Fail, Future, Just,
    Promise, Publisher, Sequence,
  },
  scheduler::{ImmediateScheduler, Scheduler, SchedulerTime, Stride, TestScheduler, VirtualTime},
  subject::{AnySubject, CurrentValueSubject, PassthroughSubject, Subject},
  subscriber::{AnySubscriber, Assign, Completion, Never, Sink, Subscriber},
  subscription::{
    AnyCancellable, AnySubscription, Cancellable, CancellableGuard, Subscription, Subscriptions,
  },
};

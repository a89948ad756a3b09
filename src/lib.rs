//! # rxpipe: pull-based reactive streams
//!
//! Publishers produce values over time, subscribers consume them, and the
//! subscription between the two carries flow control: a publisher never
//! sends more values than its subscriber has asked for through [`Demand`].
//!
//! ## Quick Start
//!
//! ```rust
//! use rxpipe::prelude::*;
//!
//! let _evens = sequence(1..=10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 10)
//!   .sink_value(|v| println!("value: {v}"));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Produces values; every operator is a provided method on it |
//! | [`Subscriber`] | Receives a subscription, values, and one completion |
//! | [`Subscription`] | Carries demand upstream and cancels |
//! | [`Demand`] | How many more values a subscriber accepts |
//! | [`PassthroughSubject`] / [`CurrentValueSubject`] | Push values in from imperative code |
//! | [`Scheduler`] | Where and when work runs; [`TestScheduler`] runs on virtual time |
//!
//! Nothing runs on another thread unless a scheduler is interposed with
//! [`Publisher::subscribe_on`] or [`Publisher::receive_on`].
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): [`ThreadPoolScheduler`] over a
//!   `futures` thread pool
//! - **`timer`** (default): non-blocking delays for the thread-pool scheduler
//! - **`tokio-scheduler`**: `TokioScheduler` over a tokio runtime handle
//!
//! [`Demand`]: prelude::Demand
//! [`Publisher`]: prelude::Publisher
//! [`Publisher::subscribe_on`]: prelude::Publisher::subscribe_on
//! [`Publisher::receive_on`]: prelude::Publisher::receive_on
//! [`Subscriber`]: prelude::Subscriber
//! [`Subscription`]: prelude::Subscription
//! [`PassthroughSubject`]: prelude::PassthroughSubject
//! [`CurrentValueSubject`]: prelude::CurrentValueSubject
//! [`Scheduler`]: prelude::Scheduler
//! [`TestScheduler`]: prelude::TestScheduler
//! [`ThreadPoolScheduler`]: scheduler::ThreadPoolScheduler

pub mod atomic;
pub mod bag;
pub mod demand;
pub mod identifier;
pub mod lock;
pub mod ops;
pub mod pipe;
pub mod prelude;
pub mod publisher;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;

#[cfg(test)]
mod test_util;

pub use prelude::*;

#[cfg(doctest)]
mod readme {
  #![doc = include_str!("../README.md")]
}

//! ReceiveOn operator implementation.

use std::{
  collections::VecDeque,
  sync::{Arc, Weak},
};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::warn;

use crate::{
  pipe::{subscribe_pipe, Connection, Pipe},
  prelude::*,
};

/// Publisher returned by [`Publisher::receive_on`].
///
/// Values and the completion are queued as they arrive and handed to the
/// downstream from a task on the scheduler, in arrival order. At most one
/// drain task is outstanding at a time.
#[derive(Clone)]
pub struct ReceiveOn<U, S> {
  upstream: U,
  scheduler: S,
}

impl<U, S> ReceiveOn<U, S> {
  pub fn new(upstream: U, scheduler: S) -> Self { ReceiveOn { upstream, scheduler } }
}

impl<U: Publisher, S: Scheduler> Publisher for ReceiveOn<U, S> {
  type Output = U::Output;
  type Failure = U::Failure;

  fn receive<Sub>(&self, subscriber: Sub)
  where
    Sub: Subscriber<Input = U::Output, Failure = U::Failure>,
  {
    subscribe_pipe(
      &self.upstream,
      ReceiveOnPipe {
        connection: Connection::new("receive_on", subscriber),
        scheduler: self.scheduler.clone(),
        this: OnceCell::new(),
        queue: Mutex::new(Queue { events: VecDeque::new(), draining: false }),
      },
    )
  }
}

enum Event<T, E> {
  Value(T),
  Completion(Completion<E>),
}

struct Queue<T, E> {
  events: VecDeque<Event<T, E>>,
  draining: bool,
}

struct ReceiveOnPipe<D: Subscriber, S> {
  connection: Connection<D>,
  scheduler: S,
  this: OnceCell<Weak<Self>>,
  queue: Mutex<Queue<D::Input, D::Failure>>,
}

impl<D: Subscriber, S: Scheduler> ReceiveOnPipe<D, S> {
  fn enqueue(&self, event: Event<D::Input, D::Failure>) {
    let start = {
      let mut queue = self.queue.lock();
      queue.events.push_back(event);
      !std::mem::replace(&mut queue.draining, true)
    };
    if !start {
      return;
    }
    match self.this.get().cloned() {
      Some(this) => self.scheduler.schedule(move || {
        if let Some(pipe) = this.upgrade() {
          pipe.drain();
        }
      }),
      None => {
        // Keep the event queued; the first enqueue after subscription drains it.
        warn!(op = self.connection.name(), id = %self.connection.id(), "event queued before subscription");
        self.queue.lock().draining = false;
      }
    }
  }

  fn drain(&self) {
    loop {
      let event = {
        let mut queue = self.queue.lock();
        match queue.events.pop_front() {
          Some(event) => event,
          None => {
            queue.draining = false;
            return;
          }
        }
      };
      match event {
        Event::Value(value) => {
          let more = self.connection.forward(value);
          if more.has_any() {
            self.connection.request(more);
          }
        }
        Event::Completion(completion) => self.connection.forward_completion(completion),
      }
    }
  }
}

impl<D: Subscriber, S: Scheduler> Pipe for ReceiveOnPipe<D, S> {
  type Input = D::Input;
  type Failure = D::Failure;
  type Downstream = D;

  #[inline]
  fn connection(&self) -> &Connection<D> { &self.connection }

  fn did_subscribe(this: &Arc<Self>) {
    let fresh = this.this.set(Arc::downgrade(this)).is_ok();
    debug_assert!(fresh, "receive_on subscribed twice");
  }

  fn receive_input(&self, input: D::Input) -> Demand {
    self.enqueue(Event::Value(input));
    Demand::NONE
  }

  fn receive_completion(&self, completion: Completion<D::Failure>) {
    self.enqueue(Event::Completion(completion))
  }

  fn cancel(&self) {
    self.connection.cancel();
    self.queue.lock().events.clear();
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::test_util::{Manual, Recorder};

  #[test]
  fn delivery_waits_for_the_scheduler() {
    let scheduler = TestScheduler::new();
    let source = Manual::<i32, &str>::new();
    let rec = Recorder::<i32, &str>::unlimited();
    Arc::clone(&source).receive_on(scheduler.clone()).receive(rec.clone());
    assert_eq!(source.log().requests(), vec![Demand::UNLIMITED]);

    source.send(1);
    source.send(2);
    source.fail("late");
    assert!(rec.values().is_empty());
    assert_eq!(scheduler.pending_count(), 1);

    scheduler.flush();
    assert_eq!(rec.values(), vec![1, 2]);
    assert_eq!(rec.completions(), vec![Completion::Failure("late")]);
  }

  #[test]
  fn downstream_demand_goes_upstream_after_delivery() {
    let scheduler = TestScheduler::new();
    let source = Manual::<i32, Never>::new();
    let rec = Recorder::<i32, Never>::new(Demand::max(1), Demand::max(1));
    Arc::clone(&source).receive_on(scheduler.clone()).receive(rec.clone());
    assert_eq!(source.send(1), Demand::NONE);
    scheduler.flush();
    assert_eq!(source.log().requests(), vec![Demand::max(1), Demand::max(1)]);
  }

  #[test]
  fn cancel_drops_queued_values() {
    let scheduler = TestScheduler::new();
    let source = Manual::<i32, Never>::new();
    let rec = Recorder::<i32, Never>::unlimited();
    Arc::clone(&source).receive_on(scheduler.clone()).receive(rec.clone());
    source.send(1);
    rec.cancel();
    scheduler.flush();
    assert!(rec.values().is_empty());
    assert_eq!(source.log().cancels(), 1);
  }

  #[test]
  fn events_before_subscription_are_kept_for_the_next_drain() {
    let scheduler = TestScheduler::new();
    let rec = Recorder::<i32, Never>::unlimited();
    let pipe = Arc::new(ReceiveOnPipe {
      connection: Connection::new("receive_on", rec.clone()),
      scheduler: scheduler.clone(),
      this: OnceCell::new(),
      queue: Mutex::new(Queue { events: VecDeque::new(), draining: false }),
    });
    pipe.receive_input(1);
    assert!(!pipe.queue.lock().draining);
    assert_eq!(scheduler.pending_count(), 0);

    ReceiveOnPipe::did_subscribe(&pipe);
    pipe.receive_input(2);
    scheduler.flush();
    assert_eq!(rec.values(), vec![1, 2]);
  }
}

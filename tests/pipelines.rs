//! End-to-end behavior of operator chains through the public API.

use std::sync::Arc;

use parking_lot::Mutex;
use rxpipe::prelude::*;

/// A subscriber that records everything and asks for a fixed initial demand.
struct Watcher<T, E> {
  id: CombineIdentifier,
  initial: Demand,
  values: Mutex<Vec<T>>,
  completions: Mutex<Vec<Completion<E>>>,
  subscription: Mutex<Option<AnySubscription>>,
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Watcher<T, E> {
  fn new(initial: Demand) -> Arc<Self> {
    Arc::new(Watcher {
      id: CombineIdentifier::new(),
      initial,
      values: Mutex::new(vec![]),
      completions: Mutex::new(vec![]),
      subscription: Mutex::new(None),
    })
  }

  fn values(&self) -> Vec<T> { self.values.lock().clone() }

  fn completions(&self) -> Vec<Completion<E>> { self.completions.lock().clone() }

  fn request(&self, demand: Demand) {
    let sub = self.subscription.lock().clone();
    if let Some(sub) = sub {
      sub.request(demand)
    }
  }

  fn cancel(&self) {
    let sub = self.subscription.lock().clone();
    if let Some(sub) = sub {
      sub.cancel()
    }
  }
}

impl<T, E> Identity for Watcher<T, E> {
  fn combine_identifier(&self) -> CombineIdentifier { self.id }
}

impl<T: Send + 'static, E: Send + 'static> Subscriber for Watcher<T, E> {
  type Input = T;
  type Failure = E;

  fn receive_subscription(&self, subscription: AnySubscription) {
    *self.subscription.lock() = Some(subscription.clone());
    if self.initial.has_any() {
      subscription.request(self.initial);
    }
  }

  fn receive(&self, input: T) -> Demand {
    self.values.lock().push(input);
    Demand::NONE
  }

  fn receive_completion(&self, completion: Completion<E>) { self.completions.lock().push(completion); }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum SensorError {
  #[error("sensor {0} offline")]
  Offline(u8),
}

#[test]
fn filter_then_count() {
  let watcher = Watcher::<usize, Never>::new(Demand::UNLIMITED);
  sequence(vec![1, 2, 3, 4, 5]).filter(|v| v % 2 == 0).count().receive(watcher.clone());
  assert_eq!(watcher.values(), vec![2]);
  assert_eq!(watcher.completions(), vec![Completion::Finished]);
}

#[test]
fn map_identity_preserves_the_stream() {
  let direct = Watcher::<i32, SensorError>::new(Demand::UNLIMITED);
  let mapped = Watcher::<i32, SensorError>::new(Demand::UNLIMITED);
  let source = || {
    sequence(vec![3, 1, 4]).set_failure_type::<SensorError>().merge(fail(SensorError::Offline(2)))
  };
  source().receive(direct.clone());
  source().map(|v| v).receive(mapped.clone());
  assert_eq!(direct.values(), mapped.values());
  assert_eq!(direct.completions(), mapped.completions());
}

#[test]
fn collect_by_count_allows_a_partial_last_batch() {
  let watcher = Watcher::<Vec<i32>, Never>::new(Demand::UNLIMITED);
  sequence(vec![1, 2, 3, 4, 5]).collect_by_count(2).receive(watcher.clone());
  assert_eq!(watcher.values(), vec![vec![1, 2], vec![3, 4], vec![5]]);
  assert_eq!(watcher.completions(), vec![Completion::Finished]);
}

#[test]
fn combine_latest_fan_out() {
  let a = PassthroughSubject::<i32, Never>::new();
  let b = PassthroughSubject::<i32, Never>::new();
  let watcher = Watcher::<i32, Never>::new(Demand::UNLIMITED);
  a.clone().combine_latest(b.clone(), |x, y| x + y).receive(watcher.clone());

  a.send(1);
  assert!(watcher.values().is_empty());
  b.send(10);
  assert_eq!(watcher.values(), vec![11]);
  a.send(2);
  assert_eq!(watcher.values(), vec![11, 12]);

  a.finish();
  assert!(watcher.completions().is_empty());
  b.finish();
  assert_eq!(watcher.completions(), vec![Completion::Finished]);
}

#[test]
fn all_satisfy_stops_at_the_first_miss() {
  let watcher = Watcher::<bool, Never>::new(Demand::UNLIMITED);
  sequence(vec![1, 2, -1, 3]).all_satisfy(|v| *v > 0).receive(watcher.clone());
  assert_eq!(watcher.values(), vec![false]);
  assert_eq!(watcher.completions(), vec![Completion::Finished]);
}

#[test]
fn remove_duplicates_keeps_first_occurrences() {
  let watcher = Watcher::<i32, Never>::new(Demand::UNLIMITED);
  sequence(vec![1, 1, 2, 2, 3]).remove_duplicates().receive(watcher.clone());
  assert_eq!(watcher.values(), vec![1, 2, 3]);
}

#[test]
fn cancelling_twice_equals_cancelling_once() {
  let subject = PassthroughSubject::<i32, Never>::new();
  let watcher = Watcher::<i32, Never>::new(Demand::UNLIMITED);
  subject.clone().map(|v| v + 1).filter(|_| true).receive(watcher.clone());
  subject.send(1);
  watcher.cancel();
  watcher.cancel();
  subject.send(2);
  subject.finish();
  assert_eq!(watcher.values(), vec![2]);
  assert!(watcher.completions().is_empty());
  assert_eq!(subject.subscriber_count(), 0);
}

#[test]
fn demand_is_respected_through_a_chain() {
  let watcher = Watcher::<i32, Never>::new(Demand::max(2));
  sequence(1..).map(|v| v * 3).filter(|v| v % 2 == 1).receive(watcher.clone());
  assert_eq!(watcher.values(), vec![3, 9]);
  watcher.request(Demand::max(1));
  assert_eq!(watcher.values(), vec![3, 9, 15]);
  watcher.cancel();
}

#[test]
fn try_operators_surface_closure_errors() {
  let failures = Arc::new(Mutex::new(vec![]));
  let seen = failures.clone();
  let _sink = sequence(vec!["4", "x", "6"])
    .try_map(|s| Ok(s.parse::<i32>()?))
    .sink(move |c| seen.lock().push(c.failure().map(|e| e.to_string())), |_| {});
  assert_eq!(failures.lock().clone(), vec![Some("invalid digit found in string".to_string())]);
}

#[test]
fn replace_error_recovers_from_failure() {
  let watcher = Watcher::<u8, Never>::new(Demand::UNLIMITED);
  fail::<u8, SensorError>(SensorError::Offline(7))
    .map_error(|e| format!("{e}"))
    .replace_error(0)
    .receive(watcher.clone());
  assert_eq!(watcher.values(), vec![0]);
  assert_eq!(watcher.completions(), vec![Completion::Finished]);
}

#[test]
fn subjects_fan_out_across_threads() {
  let subject = PassthroughSubject::<u32, Never>::new();
  let watcher = Watcher::<u32, Never>::new(Demand::UNLIMITED);
  subject.clone().reduce(0, |acc, v| acc + v).receive(watcher.clone());
  let workers: Vec<_> = (0..4)
    .map(|_| {
      let subject = subject.clone();
      std::thread::spawn(move || (1..=25).for_each(|v| subject.send(v)))
    })
    .collect();
  workers.into_iter().for_each(|w| w.join().unwrap());
  subject.finish();
  assert_eq!(watcher.values(), vec![4 * (1..=25).sum::<u32>()]);
}

#[test]
fn collect_by_time_on_virtual_time() {
  let scheduler = TestScheduler::new();
  let subject = PassthroughSubject::<char, Never>::new();
  let watcher = Watcher::<Vec<char>, Never>::new(Demand::UNLIMITED);
  subject
    .clone()
    .collect_by_time(TimeGroupingStrategy::ByTime(scheduler.clone(), Stride::milliseconds(10)))
    .receive(watcher.clone());
  subject.send('a');
  subject.send('b');
  scheduler.advance_by(Stride::milliseconds(10));
  subject.send('c');
  scheduler.advance_by(Stride::milliseconds(10));
  subject.finish();
  assert_eq!(watcher.values(), vec![vec!['a', 'b'], vec!['c']]);
  assert_eq!(watcher.completions(), vec![Completion::Finished]);
}

#[test]
fn erased_pipeline_matches_the_typed_one() {
  let erased: AnyPublisher<String, Never> = sequence(vec![1, 2]).map(|v| format!("#{v}")).erase();
  let watcher = Watcher::<String, Never>::new(Demand::UNLIMITED);
  erased.receive(watcher.clone());
  assert_eq!(watcher.values(), vec!["#1".to_string(), "#2".to_string()]);
}

#[test]
fn assign_keeps_the_latest_value() {
  let latest = Arc::new(Atomic::new(0u32));
  let _assign = sequence(vec![3, 1, 4]).assign(latest.clone(), |slot, v| slot.store(v));
  assert_eq!(latest.load(), 4);
}

#[test]
fn drop_until_output_opens_on_the_trigger() {
  let readings = PassthroughSubject::<i32, Never>::new();
  let ready = PassthroughSubject::<(), Never>::new();
  let watcher = Watcher::<i32, Never>::new(Demand::UNLIMITED);
  readings.clone().drop_until_output(ready.clone()).receive(watcher.clone());
  readings.send(1);
  ready.send(());
  readings.send(2);
  assert_eq!(watcher.values(), vec![2]);
  assert_eq!(ready.subscriber_count(), 0);
}

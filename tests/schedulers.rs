//! Hand-off between threads through real schedulers.

use std::{
  sync::{mpsc, Arc},
  thread,
  time::Duration,
};

use parking_lot::Mutex;
use rxpipe::prelude::*;

#[cfg(feature = "futures-scheduler")]
#[test]
fn receive_on_thread_pool_delivers_off_the_calling_thread() {
  let scheduler = ThreadPoolScheduler::default();
  let (tx, rx) = mpsc::channel();
  let caller = thread::current().id();
  let done = tx.clone();
  let _sink = sequence(1..=3).receive_on(scheduler).sink(
    move |_| done.send(None).unwrap(),
    move |v| tx.send(Some((v, thread::current().id()))).unwrap(),
  );

  let mut values = vec![];
  while let Some((v, id)) = rx.recv_timeout(Duration::from_secs(5)).unwrap() {
    assert_ne!(id, caller);
    values.push(v);
  }
  assert_eq!(values, vec![1, 2, 3]);
}

#[cfg(feature = "futures-scheduler")]
#[test]
fn subscribe_on_then_receive_on_keeps_order() {
  let pool = ThreadPoolScheduler::default();
  let (tx, rx) = mpsc::channel();
  let _sink = sequence(0..50)
    .map(|v| v * 2)
    .subscribe_on(pool.clone())
    .receive_on(pool)
    .collect()
    .sink_value(move |all| tx.send(all).unwrap());
  let all = rx.recv_timeout(Duration::from_secs(5)).unwrap();
  assert_eq!(all, (0..50).map(|v| v * 2).collect::<Vec<_>>());
}

#[cfg(feature = "futures-scheduler")]
#[test]
fn measure_interval_on_wall_clock() {
  let scheduler = ThreadPoolScheduler::default();
  let subject = PassthroughSubject::<(), Never>::new();
  let gaps = Arc::new(Mutex::new(vec![]));
  let seen = gaps.clone();
  let _sink = subject.clone().measure_interval(scheduler).sink_value(move |gap| seen.lock().push(gap));
  subject.send(());
  thread::sleep(Duration::from_millis(20));
  subject.send(());
  let gaps = gaps.lock().clone();
  assert_eq!(gaps.len(), 1);
  assert!(gaps[0] >= Stride::milliseconds(20));
}

#[cfg(feature = "tokio-scheduler")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn collect_by_time_on_tokio() {
  let scheduler = TokioScheduler::current();
  let subject = PassthroughSubject::<i32, Never>::new();
  let batches = Arc::new(Mutex::new(vec![]));
  let seen = batches.clone();
  let _sink = subject
    .clone()
    .collect_by_time(TimeGroupingStrategy::ByTimeOrCount(scheduler, Stride::seconds(60), 2))
    .sink_value(move |batch| seen.lock().push(batch));
  (1..=5).for_each(|v| subject.send(v));
  subject.finish();
  assert_eq!(*batches.lock(), vec![vec![1, 2], vec![3, 4], vec![5]]);
}

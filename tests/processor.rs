//! Integration tests for the hot multicast processor.
//!
//! Covers multicast delivery, drop-if-not-ready, terminal handling and
//! demand arriving from other threads.

use std::{
  sync::{Arc, Barrier},
  thread,
  time::Duration,
};

use rxstreams::prelude::*;

#[test]
fn test_two_unbounded_subscribers_see_everything() {
  let processor = PublishProcessor::new();
  let first = processor.test(UNBOUNDED);
  let second = processor.test(UNBOUNDED);

  for v in 1..=4 {
    processor.on_next(v);
  }
  processor.on_complete();

  first.assert_result(&[1, 2, 3, 4]);
  second.assert_result(&[1, 2, 3, 4]);
  assert!(!processor.has_subscribers());
}

#[test]
fn test_item_without_demand_is_missed_for_good() {
  let processor = PublishProcessor::new();
  let ts = processor.test(0);

  processor.on_next(1);
  ts.assert_empty();

  ts.request_more(1);
  processor.on_next(2);
  processor.on_next(3);
  ts.assert_values(&[2]).assert_not_terminated();

  ts.request_more(5);
  processor.on_complete();
  ts.assert_result(&[2]);
}

#[test]
fn test_error_reaches_every_subscriber_once() {
  let processor = PublishProcessor::<i32>::new();
  let subscribers: Vec<_> = (0..3).map(|_| processor.test(UNBOUNDED)).collect();

  processor.on_error(FlowError::illegal_state("source gone"));
  processor.on_error(FlowError::illegal_state("ignored"));
  processor.on_complete();

  for ts in &subscribers {
    ts.assert_failure(FlowError::is_illegal_state, &[])
      .assert_no_violations();
    assert_eq!(ts.errors().len(), 1);
    assert_eq!(ts.completions(), 0);
  }
}

#[test]
fn test_late_subscriber_gets_the_terminal_only() {
  let processor = PublishProcessor::new();
  processor.on_next(1);
  processor.on_complete();

  let late = processor.test(UNBOUNDED);
  late.assert_subscribed().assert_result(&[]);
  assert_eq!(processor.subscriber_count(), 0);
}

#[test]
fn test_multicasts_a_cold_source() {
  let processor = PublishProcessor::new();
  let first = processor.test(UNBOUNDED);
  let second = processor.test(2);
  flowable::from_iter(vec!["a", "b", "c"]).subscribe_with(processor.clone());

  first.assert_result(&["a", "b", "c"]);
  second.assert_values(&["a", "b"]).assert_complete();
}

#[test]
fn test_ref_count_shares_one_upstream() {
  let source = PublishProcessor::new();
  let shared = source.clone().share();
  let first = shared.test(UNBOUNDED);
  let second = shared.test(UNBOUNDED);
  assert_eq!(source.subscriber_count(), 1);

  source.on_next(10);
  first.cancel();
  source.on_next(20);
  second.cancel();
  assert!(!source.has_subscribers());

  first.assert_values(&[10]);
  second.assert_values(&[10, 20]);
}

#[test]
fn test_demand_from_another_thread_is_never_exceeded() {
  let processor = PublishProcessor::new();
  let ts = processor.test(0);
  let barrier = Arc::new(Barrier::new(2));

  let requester = {
    let ts = ts.clone();
    let barrier = barrier.clone();
    thread::spawn(move || {
      barrier.wait();
      for _ in 0..500 {
        ts.request_more(1);
      }
    })
  };

  barrier.wait();
  for v in 0..10_000 {
    processor.on_next(v);
  }
  requester.join().unwrap();
  assert!(ts.value_count() <= 500);

  // whatever demand is left is honoured afterwards
  let left = 500 - ts.value_count();
  for v in 0..left {
    processor.on_next(v as i32);
  }
  assert_eq!(ts.value_count(), 500);
  processor.on_complete();
  ts.await_done(Duration::from_secs(5)).assert_no_violations();
}

#[test]
fn test_cancel_racing_completion_unlinks() {
  for _ in 0..100 {
    let processor = PublishProcessor::<i32>::new();
    let ts = processor.test(UNBOUNDED);
    let barrier = Arc::new(Barrier::new(2));
    let canceller = {
      let ts = ts.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        ts.cancel();
      })
    };
    barrier.wait();
    processor.on_complete();
    canceller.join().unwrap();
    assert!(!processor.has_subscribers());
    ts.assert_no_violations();
  }
}

#[test]
fn test_emission_from_another_thread() {
  let processor = PublishProcessor::new();
  let ts = processor.test(UNBOUNDED);
  let emitter = {
    let processor = processor.clone();
    thread::spawn(move || {
      (0..100).for_each(|v| processor.on_next(v));
      processor.on_complete();
    })
  };
  ts.await_done(Duration::from_secs(5));
  emitter.join().unwrap();
  ts.assert_result(&(0..100).collect::<Vec<_>>());
}

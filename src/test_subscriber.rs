//! Recording subscriber for tests.
//!
//! [`TestSubscriber`] records every signal it receives, lets the test grant
//! demand step by step, and offers fluent assertions over what arrived.
//! It also records protocol violations (signals before `on_subscribe`,
//! signals after a terminal) so tests can assert none happened.
//!
//! # Usage
//!
//! ```rust
//! use rxstreams::prelude::*;
//!
//! flowable::from_iter(vec![1, 2, 3])
//!   .test(0)
//!   .assert_empty()
//!   .request_more(2)
//!   .assert_values(&[1, 2])
//!   .request_more(1)
//!   .assert_result(&[1, 2, 3]);
//! ```

use std::{
  fmt::Debug,
  sync::{Arc, Condvar, Mutex, MutexGuard},
  time::{Duration, Instant},
};

use crate::{
  demand::add_cap,
  error::FlowError,
  subscriber::Subscriber,
  subscription::SubscriptionRef,
};

/// A cloneable handle: one clone goes to the publisher, the test keeps
/// another.
pub struct TestSubscriber<T> {
  inner: Arc<Inner<T>>,
}

struct Inner<T> {
  state: Mutex<State<T>>,
  signalled: Condvar,
}

struct State<T> {
  initial_request: u64,
  pending_request: u64,
  subscription: Option<SubscriptionRef>,
  subscriptions: usize,
  values: Vec<T>,
  errors: Vec<FlowError>,
  completions: usize,
  cancelled: bool,
  violations: Vec<String>,
}

impl<T> State<T> {
  fn is_terminated(&self) -> bool { self.completions + self.errors.len() > 0 }

  fn check_live(&mut self, signal: &str) {
    if self.subscriptions == 0 {
      self.violations.push(format!("{signal} before on_subscribe"));
    }
    if self.is_terminated() {
      self.violations.push(format!("{signal} after terminal signal"));
    }
  }
}

impl<T> Clone for TestSubscriber<T> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<T> TestSubscriber<T> {
  pub fn new(initial_request: u64) -> Self {
    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(State {
          initial_request,
          pending_request: 0,
          subscription: None,
          subscriptions: 0,
          values: vec![],
          errors: vec![],
          completions: 0,
          cancelled: false,
          violations: vec![],
        }),
        signalled: Condvar::new(),
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, State<T>> { self.inner.state.lock().unwrap() }

  /// Grants `n` more items.
  pub fn request_more(&self, n: u64) -> &Self {
    let subscription = {
      let mut state = self.state();
      if state.subscription.is_none() {
        state.pending_request = add_cap(state.pending_request, n);
      }
      state.subscription.clone()
    };
    if let Some(subscription) = subscription {
      subscription.request(n);
    }
    self
  }

  pub fn cancel(&self) -> &Self {
    let subscription = {
      let mut state = self.state();
      state.cancelled = true;
      state.subscription.clone()
    };
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
    self
  }

  pub fn value_count(&self) -> usize { self.state().values.len() }

  pub fn errors(&self) -> Vec<FlowError> { self.state().errors.clone() }

  pub fn completions(&self) -> usize { self.state().completions }

  pub fn is_subscribed(&self) -> bool { self.state().subscriptions > 0 }

  pub fn is_terminated(&self) -> bool { self.state().is_terminated() }

  pub fn violations(&self) -> Vec<String> { self.state().violations.clone() }

  /// Blocks until a terminal signal arrives.
  ///
  /// # Panics
  ///
  /// When nothing terminal arrives within `timeout`.
  pub fn await_done(&self, timeout: Duration) -> &Self {
    self.await_until(timeout, "a terminal signal", |s| s.is_terminated())
  }

  /// Blocks until at least `count` items arrived.
  pub fn await_count(&self, count: usize, timeout: Duration) -> &Self {
    self.await_until(timeout, "enough items", |s| s.values.len() >= count || s.is_terminated())
  }

  fn await_until(&self, timeout: Duration, what: &str, done: impl Fn(&State<T>) -> bool) -> &Self {
    let deadline = Instant::now() + timeout;
    let mut state = self.state();
    while !done(&state) {
      let now = Instant::now();
      if now >= deadline {
        panic!("timed out after {timeout:?} waiting for {what}");
      }
      state = self
        .inner
        .signalled
        .wait_timeout(state, deadline - now)
        .unwrap()
        .0;
    }
    drop(state);
    self
  }

  pub fn assert_subscribed(&self) -> &Self {
    assert!(self.is_subscribed(), "on_subscribe was never called");
    self
  }

  pub fn assert_no_errors(&self) -> &Self {
    let errors = self.errors();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    self
  }

  pub fn assert_complete(&self) -> &Self {
    assert_eq!(self.completions(), 1, "expected exactly one completion");
    self
  }

  pub fn assert_not_complete(&self) -> &Self {
    assert_eq!(self.completions(), 0, "unexpected completion");
    self
  }

  pub fn assert_not_terminated(&self) -> &Self {
    assert!(!self.is_terminated(), "unexpected terminal signal");
    self
  }

  pub fn assert_no_violations(&self) -> &Self {
    let violations = self.violations();
    assert!(violations.is_empty(), "protocol violations: {violations:?}");
    self
  }

  /// Asserts a single error matching `predicate`.
  pub fn assert_error(&self, predicate: impl Fn(&FlowError) -> bool) -> &Self {
    let errors = self.errors();
    assert_eq!(errors.len(), 1, "expected exactly one error, got {errors:?}");
    assert!(predicate(&errors[0]), "unexpected error: {:?}", errors[0]);
    assert_eq!(self.completions(), 0, "completed as well as failed");
    self
  }
}

impl<T: Clone> TestSubscriber<T> {
  pub fn values(&self) -> Vec<T> { self.state().values.clone() }
}

impl<T: Clone + PartialEq + Debug> TestSubscriber<T> {
  pub fn assert_values(&self, expected: &[T]) -> &Self {
    assert_eq!(self.values(), expected, "unexpected values");
    self
  }

  /// Subscribed, no items, no terminal signal.
  pub fn assert_empty(&self) -> &Self {
    self
      .assert_subscribed()
      .assert_values(&[])
      .assert_not_terminated()
  }

  /// Exactly `expected` followed by a single completion.
  pub fn assert_result(&self, expected: &[T]) -> &Self {
    self
      .assert_subscribed()
      .assert_values(expected)
      .assert_no_errors()
      .assert_complete()
      .assert_no_violations()
  }

  /// Exactly `expected` followed by a single error matching `predicate`.
  pub fn assert_failure(&self, predicate: impl Fn(&FlowError) -> bool, expected: &[T]) -> &Self {
    self
      .assert_subscribed()
      .assert_values(expected)
      .assert_error(predicate)
      .assert_no_violations()
  }
}

impl<T: Send> Subscriber<T> for TestSubscriber<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let request = {
      let mut state = self.state();
      state.subscriptions += 1;
      if state.subscriptions > 1 {
        state
          .violations
          .push("on_subscribe called more than once".to_string());
        None
      } else if state.cancelled {
        None
      } else {
        state.subscription = Some(subscription.clone());
        Some(add_cap(state.initial_request, state.pending_request))
      }
    };
    self.inner.signalled.notify_all();
    match request {
      None => subscription.cancel(),
      Some(0) => {}
      Some(n) => subscription.request(n),
    }
  }

  fn on_next(&mut self, item: T) {
    let mut state = self.state();
    state.check_live("on_next");
    state.values.push(item);
    drop(state);
    self.inner.signalled.notify_all();
  }

  fn on_error(&mut self, error: FlowError) {
    let mut state = self.state();
    state.check_live("on_error");
    state.errors.push(error);
    drop(state);
    self.inner.signalled.notify_all();
  }

  fn on_complete(&mut self) {
    let mut state = self.state();
    state.check_live("on_complete");
    state.completions += 1;
    drop(state);
    self.inner.signalled.notify_all();
  }
}

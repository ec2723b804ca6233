//! RetryWhen operator implementation
//!
//! Resubscribes to the source after each error, for as long as the
//! publisher derived from the errors keeps emitting. A completion of the
//! source passes through.

use super::{
  redo::{Outcome, RedoMode, RedoWhen},
  trigger::Trigger,
};
use crate::{error::FlowError, publisher::Publisher};

/// Redoes on error; completion passes through.
#[derive(Debug, Default, Clone, Copy)]
pub struct Retry;

impl RedoMode for Retry {
  type Signal = FlowError;

  fn on_complete(&self) -> Outcome<FlowError> { Outcome::Complete }

  fn on_error(&self, error: FlowError) -> Outcome<FlowError> { Outcome::Again(error) }
}

pub type RetryWhen<S> = RedoWhen<S, Retry>;

impl<S> RetryWhen<S> {
  pub fn new<F, W, U>(source: S, handler: F) -> Self
  where
    F: Fn(Trigger<FlowError>) -> W + Send + Sync + 'static,
    W: Publisher<U>,
    U: Send + 'static,
  {
    RedoWhen::with_mode(source, handler, Retry)
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::prelude::*;

  // Fails `failures` times, then emits `1` and completes.
  fn flaky(failures: usize) -> (PublisherRef<i32>, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let c_attempts = attempts.clone();
    let source = flowable::defer(move || {
      if c_attempts.fetch_add(1, Ordering::SeqCst) < failures {
        flowable::fail(FlowError::illegal_state("flaky")).into_shared()
      } else {
        flowable::just(1).into_shared()
      }
    });
    (source.into_shared(), attempts)
  }

  #[test]
  fn retries_until_success() {
    let (source, attempts) = flaky(2);
    source
      .retry_when(|errors| errors)
      .test(UNBOUNDED)
      .assert_result(&[1]);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn items_before_error_are_kept() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let c_attempts = attempts.clone();
    let processor = PublishProcessor::<i32>::new();
    let c_processor = processor.clone();
    let ts = flowable::defer(move || {
      c_attempts.fetch_add(1, Ordering::SeqCst);
      c_processor.clone()
    })
    .retry_when(|errors| errors)
    .test(UNBOUNDED);

    processor.on_next(1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    ts.assert_values(&[1]).assert_not_terminated();
  }

  #[test]
  fn handler_completion_completes() {
    let (source, attempts) = flaky(usize::MAX);
    source
      .retry_when(|errors| {
        let count = Arc::new(AtomicUsize::new(0));
        errors.take_while(move |_: &FlowError| count.fetch_add(1, Ordering::SeqCst) < 2)
      })
      .test(UNBOUNDED)
      .assert_result(&[]);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn handler_error_fails_without_subscribing() {
    let (source, attempts) = flaky(0);
    source
      .retry_when(|_| flowable::fail::<()>(FlowError::illegal_state("give up")))
      .test(UNBOUNDED)
      .assert_failure(FlowError::is_illegal_state, &[]);
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn completion_passes_through() {
    flowable::just(5)
      .retry_when(|errors| errors)
      .test(1)
      .assert_result(&[5]);
  }
}

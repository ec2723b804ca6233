//! Error taxonomy of the demand protocol and the executors.
//!
//! Every variant is cheap to clone: a processor broadcasts the same error to
//! all of its current subscribers, and records it for late subscribers.

use std::{borrow::Cow, error::Error, sync::Arc};

use thiserror::Error;

/// Errors delivered through `Subscriber::on_error` or reported by executors.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum FlowError {
  /// `Subscription::request` was called with a non-positive amount.
  ///
  /// Signalled to the offending subscriber as its terminal error, never
  /// returned to the caller of `request`.
  #[error("non-positive demand requested: {0}")]
  InvalidDemand(u64),

  /// A protocol violation, e.g. a subscriber bound was exceeded.
  #[error("illegal state: {0}")]
  IllegalState(Cow<'static, str>),

  /// A failure produced by the source, propagated verbatim.
  #[error(transparent)]
  Upstream(Arc<dyn Error + Send + Sync>),

  /// A scheduled action panicked while running.
  #[error("scheduled action failed: {0}")]
  SchedulingFailure(String),
}

impl FlowError {
  /// Wraps a source failure.
  pub fn upstream<E>(err: E) -> Self
  where
    E: Error + Send + Sync + 'static,
  {
    FlowError::Upstream(Arc::new(err))
  }

  pub fn illegal_state(msg: impl Into<Cow<'static, str>>) -> Self {
    FlowError::IllegalState(msg.into())
  }

  /// Returns a short stable label (snake_case) for use in logs.
  ///
  /// ```
  /// use rxstreams::FlowError;
  ///
  /// assert_eq!(FlowError::InvalidDemand(0).as_label(), "invalid_demand");
  /// ```
  pub fn as_label(&self) -> &'static str {
    match self {
      FlowError::InvalidDemand(_) => "invalid_demand",
      FlowError::IllegalState(_) => "illegal_state",
      FlowError::Upstream(_) => "upstream_failure",
      FlowError::SchedulingFailure(_) => "scheduling_failure",
    }
  }

  pub fn is_invalid_demand(&self) -> bool { matches!(self, FlowError::InvalidDemand(_)) }

  pub fn is_illegal_state(&self) -> bool { matches!(self, FlowError::IllegalState(_)) }

  pub fn is_upstream(&self) -> bool { matches!(self, FlowError::Upstream(_)) }
}

#[cfg(test)]
mod test {
  use super::*;

  #[derive(Debug, Error)]
  #[error("disk on fire")]
  struct DiskOnFire;

  #[test]
  fn upstream_is_transparent() {
    let err = FlowError::upstream(DiskOnFire);
    assert_eq!(err.to_string(), "disk on fire");
    assert_eq!(err.as_label(), "upstream_failure");
    assert!(err.is_upstream());
  }

  #[test]
  fn clone_shares_source() {
    let err = FlowError::upstream(DiskOnFire);
    let copy = err.clone();
    match (&err, &copy) {
      (FlowError::Upstream(a), FlowError::Upstream(b)) => assert!(Arc::ptr_eq(a, b)),
      _ => unreachable!(),
    }
  }

  #[test]
  fn labels() {
    assert_eq!(FlowError::illegal_state("bound").as_label(), "illegal_state");
    assert_eq!(
      FlowError::SchedulingFailure("boom".into()).to_string(),
      "scheduled action failed: boom"
    );
    assert_eq!(FlowError::InvalidDemand(0).to_string(), "non-positive demand requested: 0");
  }
}

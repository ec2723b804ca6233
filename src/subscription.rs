//! Subscription and disposal handles.
//!
//! A [`Subscription`] is what a `Publisher` hands its `Subscriber` on
//! subscribe: it grants demand and cancels the link. A [`Disposable`] is the
//! handle returned by the executors for scheduled work.

use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

mod arbiter;
pub use arbiter::SubscriptionArbiter;

/// Per-subscriber handle for granting demand and cancelling.
///
/// Implementations must tolerate calls from any thread at any time,
/// including from inside the subscriber's own callbacks.
pub trait Subscription: Send + Sync {
  /// Adds `n` to the outstanding demand.
  ///
  /// `n == 0` is a protocol violation, signalled to the subscriber as
  /// `FlowError::InvalidDemand` rather than returned to the caller.
  fn request(&self, n: u64);

  /// Stops the flow of signals. Idempotent.
  fn cancel(&self);
}

/// Shared subscription handle.
pub type SubscriptionRef = Arc<dyn Subscription>;

impl Debug for dyn Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("dyn Subscription").finish_non_exhaustive()
  }
}

/// Subscription that ignores requests and cancellation.
///
/// Handed to subscribers that receive a terminal signal right away.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySubscription;

impl EmptySubscription {
  pub fn shared() -> SubscriptionRef { Arc::new(EmptySubscription) }
}

impl Subscription for EmptySubscription {
  #[inline]
  fn request(&self, _n: u64) {}
  #[inline]
  fn cancel(&self) {}
}

impl<S: Subscription + ?Sized> Subscription for Arc<S> {
  #[inline]
  fn request(&self, n: u64) { (**self).request(n) }
  #[inline]
  fn cancel(&self) { (**self).cancel() }
}

// ============================================================================
// Disposable
// ============================================================================

/// Handle to a unit of scheduled work (or a whole worker).
pub trait Disposable: Send + Sync {
  /// Cancels the work if it has not finished yet. Idempotent.
  fn dispose(&self);

  fn is_disposed(&self) -> bool;
}

/// Shared disposal handle.
pub type DisposableRef = Arc<dyn Disposable>;

impl Debug for dyn Disposable {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("dyn Disposable")
      .field("is_disposed", &self.is_disposed())
      .finish()
  }
}

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
  #[inline]
  fn dispose(&self) { (**self).dispose() }
  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

/// A handle that is already disposed.
///
/// Returned when work is offered to a worker that no longer accepts any.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disposed;

impl Disposed {
  pub fn shared() -> DisposableRef { Arc::new(Disposed) }
}

impl Disposable for Disposed {
  #[inline]
  fn dispose(&self) {}
  #[inline]
  fn is_disposed(&self) -> bool { true }
}

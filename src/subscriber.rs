//! The consuming side of the demand protocol.
//!
//! A subscriber receives `on_subscribe` first, then zero or more `on_next`,
//! then at most one of `on_complete` / `on_error`. It only ever receives
//! items it asked for through the [`Subscription`](crate::subscription::Subscription)
//! handed to `on_subscribe`.

use crate::{error::FlowError, subscription::SubscriptionRef};

mod serialized;
pub use serialized::SerializedSubscriber;

/// Consumer of a backpressured item sequence.
///
/// Calling `request` or `cancel` on the subscription from inside any of
/// these callbacks is allowed. Publishers in this crate queue the signals
/// such reentrant calls produce and deliver them after the current callback
/// returns, so the call stack stays bounded however much demand is granted
/// from within `on_subscribe` or `on_next`.
pub trait Subscriber<T>: Send {
  fn on_subscribe(&mut self, subscription: SubscriptionRef);

  fn on_next(&mut self, item: T);

  fn on_error(&mut self, error: FlowError);

  fn on_complete(&mut self);
}

/// Type-erased subscriber, the unit every publisher accepts.
pub type BoxedSubscriber<T> = Box<dyn Subscriber<T>>;

impl<T, S> Subscriber<T> for Box<S>
where
  S: Subscriber<T> + ?Sized,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { (**self).on_subscribe(subscription) }

  #[inline]
  fn on_next(&mut self, item: T) { (**self).on_next(item) }

  #[inline]
  fn on_error(&mut self, error: FlowError) { (**self).on_error(error) }

  #[inline]
  fn on_complete(&mut self) { (**self).on_complete() }
}
